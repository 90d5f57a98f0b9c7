//! Archive aggregator: the at-most-one live archive group.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use toast_model::{
    GroupMembers, ListChange, Notification, NotificationId, NotificationState, TransitionError,
};

use crate::cache::ElementCache;
use crate::error::{PipelineError, Result};

pub const GROUP_TITLE: &str = "Archived notifications";

type Slot = Arc<Mutex<Option<Arc<Notification>>>>;

#[derive(Debug, Default)]
pub struct ArchiveAggregator {
    live: Slot,
}

fn lock(slot: &Mutex<Option<Arc<Notification>>>) -> MutexGuard<'_, Option<Arc<Notification>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn members(group: &Notification) -> Result<&GroupMembers> {
    group.members().ok_or(PipelineError::NoArchive)
}

impl ArchiveAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live group, if any.
    pub fn group(&self) -> Option<Arc<Notification>> {
        lock(&self.live).clone()
    }

    /// True while the live group is on screen.
    pub fn is_shown(&self) -> bool {
        self.group().is_some_and(|g| g.state().is_displayed())
    }

    pub fn len(&self) -> usize {
        self.group()
            .and_then(|g| g.members().map(GroupMembers::len))
            .unwrap_or(0)
    }

    /// Returns the live group, creating one when there is none or the
    /// current one is on its way out.
    fn ensure_group(&self) -> Arc<Notification> {
        let mut slot = lock(&self.live);
        if let Some(group) = slot.as_ref() {
            if !matches!(
                group.state(),
                NotificationState::Closing | NotificationState::Destroy
            ) {
                return Arc::clone(group);
            }
        }

        let group = Notification::group(GROUP_TITLE);
        let group_id = group.id();
        let watched = Arc::downgrade(&self.live);
        group.on_state_change(move |_, change| {
            if change.to != NotificationState::Destroy {
                return;
            }
            let Some(live) = watched.upgrade() else {
                return;
            };
            let mut slot = lock(&live);
            if slot.as_ref().is_some_and(|g| g.id() == group_id) {
                *slot = None;
                tracing::debug!(group = %group_id, "Archive group released");
            }
        });
        if let Some(members) = group.members() {
            members.subscribe(move |change| match change {
                ListChange::Inserted { index, items } => {
                    tracing::trace!(group = %group_id, index, count = items.len(), "Archive members added");
                }
                ListChange::Removed { index, item } => {
                    tracing::trace!(group = %group_id, index, id = %item.id(), "Archive member removed");
                }
                ListChange::Cleared { items } => {
                    tracing::trace!(group = %group_id, count = items.len(), "Archive members cleared");
                }
            });
        }
        tracing::info!(group = %group_id, "Archive group created");
        *slot = Some(Arc::clone(&group));
        group
    }

    /// Archives notifications that were never displayed. Either every
    /// notification is archived or, on a precondition failure, none is.
    pub fn archive_batch(
        &self,
        batch: Vec<Arc<Notification>>,
        cache: &mut ElementCache,
    ) -> Result<()> {
        if let Some(n) = batch
            .iter()
            .find(|n| n.state() != NotificationState::AbleShow)
        {
            return Err(TransitionError {
                id: n.id(),
                from: n.state(),
                to: NotificationState::Archiving,
            }
            .into());
        }

        for n in &batch {
            n.transition(NotificationState::Archiving)?;
            cache.archive(n)?;
        }

        let group = self.ensure_group();
        let count = batch.len();
        members(&group)?.append(batch.clone());
        for n in &batch {
            n.transition(NotificationState::Archive)?;
        }
        tracing::debug!(group = %group.id(), count, "Archived overflow batch");
        Ok(())
    }

    /// Archives a notification that just left the screen.
    pub fn archive_displayed(
        &self,
        notification: &Arc<Notification>,
        cache: &mut ElementCache,
    ) -> Result<()> {
        let tier = cache.archive(notification)?;
        let group = self.ensure_group();
        members(&group)?.push(Arc::clone(notification));
        notification.transition(NotificationState::Archive)?;
        tracing::debug!(id = %notification.id(), group = %group.id(), %tier, "Archived displayed notification");
        Ok(())
    }

    pub fn member(&self, id: NotificationId) -> Result<Arc<Notification>> {
        let group = self.group().ok_or(PipelineError::NoArchive)?;
        members(&group)?
            .get(id)
            .ok_or(PipelineError::NotInArchive(id))
    }

    /// Removes `id` from the live group, if it is a member.
    pub fn remove_member(&self, id: NotificationId) -> Option<Arc<Notification>> {
        let group = self.group()?;
        group.members()?.remove(id)
    }

    /// Detaches the live group so the caller can destroy it.
    pub fn take(&self) -> Option<Arc<Notification>> {
        lock(&self.live).take()
    }
}
