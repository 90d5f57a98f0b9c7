//! Presenter arena and the visible stack.

use std::sync::Arc;

use toast_model::{Notification, NotificationId};

use super::{Presenter, PresenterId, PresenterState, PresenterView};
use crate::error::{PipelineError, Result};

struct Occupant {
    presenter: Presenter,
    busy: bool,
}

struct Slot {
    generation: u32,
    occupant: Option<Occupant>,
}

/// Presenters keyed by [`PresenterId`]. Grows with demand; idle presenters
/// are only destroyed by [`PresenterPool::destroy_idle`].
#[derive(Default)]
pub struct PresenterPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Visible presenters, top of the stack first.
    visible: Vec<PresenterId>,
}

impl PresenterPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes an idle presenter (or creates one) and binds it.
    pub fn acquire(&mut self, notification: Arc<Notification>) -> Result<PresenterId> {
        let id = self.idle_slot().unwrap_or_else(|| self.allocate());
        let Some(occupant) = self.occupant_mut(id) else {
            return Err(PipelineError::UnknownPresenter(id));
        };
        occupant.presenter.bind(notification)?;
        occupant.busy = true;
        Ok(id)
    }

    fn idle_slot(&self) -> Option<PresenterId> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            let occupant = slot.occupant.as_ref()?;
            (!occupant.busy && occupant.presenter.state().is_idle())
                .then(|| PresenterId::new(index as u32, slot.generation))
        })
    }

    fn allocate(&mut self) -> PresenterId {
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                PresenterId::new(index, slot.generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    occupant: None,
                });
                PresenterId::new((self.slots.len() - 1) as u32, 0)
            }
        };
        self.slots[id.index()].occupant = Some(Occupant {
            presenter: Presenter::new(id),
            busy: false,
        });
        tracing::debug!(presenter = %id, "Presenter created");
        id
    }

    fn occupant(&self, id: PresenterId) -> Option<&Occupant> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.occupant.as_ref()
    }

    fn occupant_mut(&mut self, id: PresenterId) -> Option<&mut Occupant> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.occupant.as_mut()
    }

    pub fn get(&self, id: PresenterId) -> Option<&Presenter> {
        self.occupant(id).map(|o| &o.presenter)
    }

    pub fn get_mut(&mut self, id: PresenterId) -> Option<&mut Presenter> {
        self.occupant_mut(id).map(|o| &mut o.presenter)
    }

    /// Places `id` at `index` in the visible stack (clamped to the end).
    pub fn insert_visible(&mut self, id: PresenterId, index: usize) {
        if self.visible.contains(&id) {
            return;
        }
        let index = index.min(self.visible.len());
        self.visible.insert(index, id);
    }

    pub fn remove_visible(&mut self, id: PresenterId) -> Option<usize> {
        let index = self.visible.iter().position(|v| *v == id)?;
        self.visible.remove(index);
        Some(index)
    }

    pub fn visible(&self) -> &[PresenterId] {
        &self.visible
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn find_by_notification(&self, notification: NotificationId) -> Option<PresenterId> {
        self.visible.iter().copied().find(|id| {
            self.get(*id)
                .and_then(Presenter::notification)
                .is_some_and(|n| n.id() == notification)
        })
    }

    /// Any busy presenter bound to `notification`, visible or not.
    pub fn bound_to(&self, notification: NotificationId) -> Option<PresenterId> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            let occupant = slot.occupant.as_ref()?;
            let bound = occupant.busy
                && occupant
                    .presenter
                    .notification()
                    .is_some_and(|n| n.id() == notification);
            bound.then(|| PresenterId::new(index as u32, slot.generation))
        })
    }

    /// Visible presenter geometry, top of the stack first.
    pub fn views(&self) -> Vec<PresenterView> {
        self.visible
            .iter()
            .filter_map(|id| self.get(*id))
            .map(Presenter::view)
            .collect()
    }

    /// Returns a reset presenter to the idle set.
    pub fn release(&mut self, id: PresenterId) {
        if let Some(occupant) = self.occupant_mut(id) {
            occupant.busy = false;
        }
    }

    /// Destroys every idle presenter. Returns how many were destroyed.
    pub fn destroy_idle(&mut self) -> usize {
        let mut destroyed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(occupant) = slot.occupant.as_mut() else {
                continue;
            };
            if occupant.busy || !occupant.presenter.state().is_idle() {
                continue;
            }
            if let Err(e) = occupant.presenter.transition(PresenterState::Destroy) {
                tracing::error!(error = %e, "Failed to destroy idle presenter");
                continue;
            }
            slot.occupant = None;
            self.free.push(index as u32);
            destroyed += 1;
        }
        destroyed
    }

    pub fn idle_count(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|slot| slot.occupant.as_ref())
            .filter(|o| !o.busy)
            .count()
    }

    pub fn total(&self) -> usize {
        self.slots.iter().filter(|slot| slot.occupant.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toast_model::NotificationKind;

    fn note() -> Arc<Notification> {
        Notification::builder(NotificationKind::Info, "pooled").build()
    }

    #[test]
    fn acquire_binds_and_marks_busy() {
        let mut pool = PresenterPool::new();
        let n = note();
        let id = pool.acquire(Arc::clone(&n)).unwrap();

        let presenter = pool.get(id).expect("presenter");
        assert_eq!(presenter.state(), PresenterState::Prepare);
        assert_eq!(presenter.notification().map(|b| b.id()), Some(n.id()));
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.total(), 1);
    }

    #[test]
    fn reset_presenter_is_reused() {
        let mut pool = PresenterPool::new();
        let first = pool.acquire(note()).unwrap();
        let presenter = pool.get_mut(first).expect("presenter");
        presenter.transition(PresenterState::Reset).unwrap();
        presenter.take_notification();
        pool.release(first);

        let second = pool.acquire(note()).unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.total(), 1);
    }

    #[test]
    fn destroyed_slot_gets_new_generation() {
        let mut pool = PresenterPool::new();
        let first = pool.acquire(note()).unwrap();
        pool.get_mut(first)
            .expect("presenter")
            .transition(PresenterState::Reset)
            .unwrap();
        pool.release(first);

        assert_eq!(pool.destroy_idle(), 1);
        assert!(pool.get(first).is_none());
        assert_eq!(pool.total(), 0);

        let second = pool.acquire(note()).unwrap();
        assert_ne!(first, second);
        assert_eq!(second.index(), first.index());
    }

    #[test]
    fn busy_presenters_survive_cleanup() {
        let mut pool = PresenterPool::new();
        pool.acquire(note()).unwrap();
        assert_eq!(pool.destroy_idle(), 0);
        assert_eq!(pool.total(), 1);
    }

    #[test]
    fn visible_stack_tracks_order() {
        let mut pool = PresenterPool::new();
        let a = note();
        let b = note();
        let pa = pool.acquire(Arc::clone(&a)).unwrap();
        let pb = pool.acquire(Arc::clone(&b)).unwrap();

        pool.insert_visible(pa, 0);
        pool.insert_visible(pb, 0);
        assert_eq!(pool.visible(), &[pb, pa]);
        assert_eq!(pool.find_by_notification(a.id()), Some(pa));
        assert_eq!(pool.bound_to(b.id()), Some(pb));

        assert_eq!(pool.remove_visible(pb), Some(0));
        assert_eq!(pool.remove_visible(pb), None);
        assert_eq!(pool.views().len(), 1);
    }
}
