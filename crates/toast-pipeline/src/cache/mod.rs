//! Render-element cache.
//!
//! Owns the mapping from notification to render element. An element lives in
//! exactly one place at a time:
//!
//! - the strong map, owned by the stage loop and never shared;
//! - the tiered map, behind a mutex shared with the reclamation watcher,
//!   holding elements demoted to `Weak` or `Soft`;
//! - nowhere, once it has been torn down or reclaimed.
//!
//! Reclamation is simulated: tiered entries expire after a per-tier TTL,
//! soft entries are bounded by an LRU, and [`Reclaimer`] injects the signal
//! explicitly. The watcher only unlinks reclaimed entries; the elements are
//! handed back and dropped on the stage loop.

mod watcher;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use toast_model::{ArchiveContext, Notification, NotificationId, NotificationState, ReferenceTier};

use crate::config::{PipelineConfig, ReclaimPolicy};
use crate::element::{FactoryRegistry, RenderElement};
use crate::error::{ElementError, PipelineError, Result};

pub(crate) use watcher::ReclaimSignal;

/// Where the cache currently holds a notification's element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Strong,
    Tiered(ReferenceTier),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheCounts {
    pub strong: usize,
    pub weak: usize,
    pub soft: usize,
}

struct StrongEntry {
    notification: Arc<Notification>,
    element: Box<dyn RenderElement>,
}

struct TieredEntry {
    notification: Arc<Notification>,
    element: Box<dyn RenderElement>,
    tier: ReferenceTier,
    epoch: u64,
}

impl TieredEntry {
    /// Drops the element without teardown and reports the reclamation.
    fn recycle(self) {
        let Self {
            notification,
            element,
            tier,
            ..
        } = self;
        drop(element);
        tracing::debug!(id = %notification.id(), %tier, "Render element reclaimed");
        notification.hooks().element_recycled(&notification);
    }
}

struct TieredMap {
    entries: HashMap<NotificationId, TieredEntry>,
    soft_lru: LruCache<NotificationId, ()>,
}

impl TieredMap {
    fn new(soft_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(soft_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: HashMap::new(),
            soft_lru: LruCache::new(capacity),
        }
    }

    /// Removes `id`, optionally only if it still carries `epoch`.
    fn take(&mut self, id: NotificationId, epoch: Option<u64>) -> Option<TieredEntry> {
        let current = self.entries.get(&id)?;
        if epoch.is_some_and(|e| e != current.epoch) {
            return None;
        }
        self.soft_lru.pop(&id);
        self.entries.remove(&id)
    }

    /// Registers a soft entry, returning the entry pushed out of the LRU.
    fn admit_soft(&mut self, id: NotificationId) -> Option<TieredEntry> {
        match self.soft_lru.push(id, ()) {
            Some((evicted, ())) if evicted != id => self.entries.remove(&evicted),
            _ => None,
        }
    }

    fn drain(&mut self) -> Vec<TieredEntry> {
        self.soft_lru.clear();
        self.entries.drain().map(|(_, entry)| entry).collect()
    }
}

fn lock(tiered: &Mutex<TieredMap>) -> MutexGuard<'_, TieredMap> {
    tiered.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Takes an element back out of the tiered map.
fn recover(tiered: &Mutex<TieredMap>, id: NotificationId) -> Option<Box<dyn RenderElement>> {
    lock(tiered).take(id, None).map(|entry| entry.element)
}

type ReclaimedTx = mpsc::UnboundedSender<TieredEntry>;

fn reclaim(tiered: &Mutex<TieredMap>, bin: &ReclaimedTx, id: NotificationId, epoch: Option<u64>) -> bool {
    let entry = lock(tiered).take(id, epoch);
    match entry {
        Some(entry) => {
            let _ = bin.send(entry);
            true
        }
        None => false,
    }
}

fn reclaim_all(tiered: &Mutex<TieredMap>, bin: &ReclaimedTx) -> usize {
    let entries = lock(tiered).drain();
    let count = entries.len();
    for entry in entries {
        let _ = bin.send(entry);
    }
    count
}

fn teardown(notification: &Notification, element: &mut dyn RenderElement) {
    element.on_destroyed();
    notification.hooks().element_destroyed(notification);
    tracing::debug!(id = %notification.id(), "Render element destroyed");
}

/// Injects reclamation signals, standing in for memory pressure.
#[derive(Debug, Clone)]
pub struct Reclaimer {
    tx: mpsc::UnboundedSender<ReclaimSignal>,
}

impl Reclaimer {
    /// Reclaims the tiered element of `id`, if any.
    pub fn collect(&self, id: NotificationId) {
        let _ = self.tx.send(ReclaimSignal::Collect { id });
    }

    /// Reclaims every tiered element.
    pub fn collect_all(&self) {
        let _ = self.tx.send(ReclaimSignal::CollectAll);
    }
}

pub struct ElementCache {
    strong: HashMap<NotificationId, StrongEntry>,
    tiered: Arc<Mutex<TieredMap>>,
    factories: FactoryRegistry,
    default_tier: ReferenceTier,
    policy: ReclaimPolicy,
    next_epoch: u64,
    signals: mpsc::UnboundedSender<ReclaimSignal>,
    /// Handed to the watcher when the first element is demoted.
    pending_rx: Option<mpsc::UnboundedReceiver<ReclaimSignal>>,
    reclaimed_tx: ReclaimedTx,
    reclaimed_rx: mpsc::UnboundedReceiver<TieredEntry>,
    cancel: CancellationToken,
}

impl ElementCache {
    pub fn new(factories: FactoryRegistry, config: &PipelineConfig, cancel: CancellationToken) -> Self {
        let (signals, rx) = mpsc::unbounded_channel();
        let (reclaimed_tx, reclaimed_rx) = mpsc::unbounded_channel();
        Self {
            strong: HashMap::new(),
            tiered: Arc::new(Mutex::new(TieredMap::new(config.reclaim.soft_capacity))),
            factories,
            default_tier: config.default_reference_tier,
            policy: config.reclaim.clone(),
            next_epoch: 0,
            signals,
            pending_rx: Some(rx),
            reclaimed_tx,
            reclaimed_rx,
            cancel,
        }
    }

    pub fn reclaimer(&self) -> Reclaimer {
        Reclaimer {
            tx: self.signals.clone(),
        }
    }

    /// Returns the element for `notification`, recovering it from the tiered
    /// map or creating it through the factory registry.
    pub fn get(
        &mut self,
        notification: &Arc<Notification>,
    ) -> std::result::Result<&mut dyn RenderElement, ElementError> {
        let id = notification.id();
        let entry = match self.strong.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(slot) => {
                let element = match recover(&self.tiered, id) {
                    Some(element) => {
                        tracing::debug!(%id, "Render element recovered");
                        element
                    }
                    None => {
                        let element = self.factories.create(notification)?;
                        tracing::debug!(%id, kind = %notification.kind(), "Render element created");
                        element
                    }
                };
                slot.insert(StrongEntry {
                    notification: Arc::clone(notification),
                    element,
                })
            }
        };
        Ok(entry.element.as_mut())
    }

    /// Strong lookup that never creates or recovers.
    pub fn try_get(&mut self, id: NotificationId) -> Option<&mut dyn RenderElement> {
        self.strong.get_mut(&id).map(|entry| entry.element.as_mut())
    }

    pub fn entry_kind(&self, id: NotificationId) -> Option<EntryKind> {
        if self.strong.contains_key(&id) {
            return Some(EntryKind::Strong);
        }
        lock(&self.tiered)
            .entries
            .get(&id)
            .map(|entry| EntryKind::Tiered(entry.tier))
    }

    /// Applies the retention tier of a notification moving to the archive.
    pub fn archive(&mut self, notification: &Arc<Notification>) -> Result<ReferenceTier> {
        if notification.state() != NotificationState::Archiving {
            return Err(PipelineError::NotArchiving(notification.id()));
        }
        Ok(self.release(notification))
    }

    /// Applies the retention tier of a notification that was closed.
    pub fn retire(&mut self, notification: &Arc<Notification>) -> Result<ReferenceTier> {
        if notification.state() != NotificationState::Closing {
            return Err(PipelineError::NotClosing(notification.id()));
        }
        Ok(self.release(notification))
    }

    fn release(&mut self, notification: &Arc<Notification>) -> ReferenceTier {
        let id = notification.id();
        let proposed = notification.preferred_tier(self.default_tier);
        let has_element = self.entry_kind(id).is_some();
        let mut tier = notification.select_tier(ArchiveContext {
            has_element,
            proposed,
        });
        if let Some(entry) = self.strong.get_mut(&id) {
            if let Some(chosen) = entry.element.on_archive(tier) {
                tier = chosen;
            }
        }

        if tier.is_tiered() {
            self.demote(id, tier);
        } else if tier == ReferenceTier::Destroy {
            self.forget(notification);
        }
        tracing::debug!(%id, %tier, has_element, "Reference tier applied");
        tier
    }

    /// Moves a strong element to the tiered map. Without a strong element
    /// there is nothing to keep, so nothing happens.
    fn demote(&mut self, id: NotificationId, tier: ReferenceTier) {
        let Some(StrongEntry {
            notification,
            element,
        }) = self.strong.remove(&id)
        else {
            return;
        };

        self.next_epoch += 1;
        let epoch = self.next_epoch;
        let evicted = {
            let mut map = lock(&self.tiered);
            map.entries.insert(
                id,
                TieredEntry {
                    notification,
                    element,
                    tier,
                    epoch,
                },
            );
            if tier == ReferenceTier::Soft {
                map.admit_soft(id)
            } else {
                None
            }
        };
        if let Some(entry) = evicted {
            entry.recycle();
        }

        self.ensure_watcher();
        let _ = self.signals.send(ReclaimSignal::Track { id, epoch, tier });
    }

    fn ensure_watcher(&mut self) {
        let Some(rx) = self.pending_rx.take() else {
            return;
        };
        tokio::spawn(watcher::run(
            Arc::clone(&self.tiered),
            rx,
            self.reclaimed_tx.clone(),
            self.policy.clone(),
            self.cancel.clone(),
        ));
        tracing::info!("Reclamation watcher started");
    }

    /// Removes any entry for `notification`, tearing the element down.
    /// Returns whether an element was found.
    pub fn forget(&mut self, notification: &Notification) -> bool {
        let id = notification.id();
        if let Some(mut entry) = self.strong.remove(&id) {
            teardown(notification, entry.element.as_mut());
            return true;
        }
        let tiered = lock(&self.tiered).take(id, None);
        match tiered {
            Some(mut entry) => {
                teardown(notification, entry.element.as_mut());
                true
            }
            None => false,
        }
    }

    /// Waits for the watcher to hand back reclaimed elements, then drops
    /// them and runs the recycled hooks. Returns how many were recycled.
    pub(crate) async fn recycle_reclaimed(&mut self) -> usize {
        match self.reclaimed_rx.recv().await {
            Some(entry) => {
                entry.recycle();
                1 + self.drain_reclaimed()
            }
            None => 0,
        }
    }

    /// Recycles whatever the watcher has handed back so far.
    pub(crate) fn drain_reclaimed(&mut self) -> usize {
        let mut count = 0;
        while let Ok(entry) = self.reclaimed_rx.try_recv() {
            entry.recycle();
            count += 1;
        }
        count
    }

    pub fn counts(&self) -> CacheCounts {
        let map = lock(&self.tiered);
        let soft = map
            .entries
            .values()
            .filter(|entry| entry.tier == ReferenceTier::Soft)
            .count();
        CacheCounts {
            strong: self.strong.len(),
            weak: map.entries.len() - soft,
            soft,
        }
    }

    /// Stops the watcher and tears down everything still cached. Returns the
    /// number of entries that were not destroyed beforehand.
    pub fn shutdown(&mut self) -> usize {
        self.cancel.cancel();
        self.drain_reclaimed();

        let mut leaked = 0;
        for (_, mut entry) in self.strong.drain() {
            teardown(&entry.notification, entry.element.as_mut());
            leaked += 1;
        }
        let tiered = lock(&self.tiered).drain();
        for mut entry in tiered {
            teardown(&entry.notification, entry.element.as_mut());
            leaked += 1;
        }

        if leaked > 0 {
            tracing::warn!(count = leaked, "Render elements not cleanly destroyed before shutdown");
        }
        leaked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use proptest::prelude::*;
    use toast_model::NotificationKind;

    use crate::geometry::Size;

    #[derive(Default)]
    struct Counters {
        created: AtomicUsize,
        destroyed: AtomicUsize,
        recycled: AtomicUsize,
    }

    struct Tracked {
        counters: Arc<Counters>,
    }

    impl RenderElement for Tracked {
        fn size(&self) -> Size {
            Size::new(100.0, 40.0)
        }

        fn on_destroyed(&mut self) {
            self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn cache_with(config: PipelineConfig) -> (ElementCache, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let sink = Arc::clone(&counters);
        let mut factories = FactoryRegistry::new();
        factories.register_all(Arc::new(
            move |_: &Notification| -> std::result::Result<Box<dyn RenderElement>, ElementError> {
                sink.created.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(Tracked {
                    counters: Arc::clone(&sink),
                }))
            },
        ));
        (
            ElementCache::new(factories, &config, CancellationToken::new()),
            counters,
        )
    }

    fn notification(tier: ReferenceTier, counters: &Arc<Counters>) -> Arc<Notification> {
        let recycled = Arc::clone(counters);
        Notification::builder(NotificationKind::Info, "cached")
            .reference_tier(tier)
            .on_element_recycled(move |_| {
                recycled.recycled.fetch_add(1, Ordering::SeqCst);
            })
            .build()
    }

    fn archiving(n: &Arc<Notification>) {
        n.transition(NotificationState::Archiving).unwrap();
    }

    /// No id sits in both maps, and the soft LRU tracks exactly the soft
    /// entries of the tiered map.
    fn assert_exclusive(cache: &ElementCache) {
        let map = lock(&cache.tiered);
        for id in cache.strong.keys() {
            assert!(!map.entries.contains_key(id), "{id} is both strong and tiered");
        }
        let soft: Vec<_> = map
            .entries
            .iter()
            .filter(|(_, entry)| entry.tier == ReferenceTier::Soft)
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(map.soft_lru.len(), soft.len());
        for id in soft {
            assert!(map.soft_lru.contains(&id), "{id} missing from the soft LRU");
        }
    }

    #[test]
    fn get_creates_once() {
        let (mut cache, counters) = cache_with(PipelineConfig::default());
        let n = notification(ReferenceTier::Destroy, &counters);

        cache.get(&n).unwrap();
        cache.get(&n).unwrap();

        assert_exclusive(&cache);
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(cache.entry_kind(n.id()), Some(EntryKind::Strong));
    }

    #[test]
    fn missing_factory_fails_get() {
        let mut cache = ElementCache::new(
            FactoryRegistry::new(),
            &PipelineConfig::default(),
            CancellationToken::new(),
        );
        let n = Notification::builder(NotificationKind::Fail, "x").build();
        assert_eq!(
            cache.get(&n).err(),
            Some(ElementError::NoFactory(NotificationKind::Fail))
        );
        assert_eq!(cache.entry_kind(n.id()), None);
    }

    #[test]
    fn archive_requires_archiving_state() {
        let (mut cache, counters) = cache_with(PipelineConfig::default());
        let n = notification(ReferenceTier::Destroy, &counters);
        assert_eq!(
            cache.archive(&n),
            Err(PipelineError::NotArchiving(n.id()))
        );
        assert_eq!(cache.retire(&n), Err(PipelineError::NotClosing(n.id())));
    }

    #[test]
    fn destroy_tier_tears_down_once() {
        let (mut cache, counters) = cache_with(PipelineConfig::default());
        let n = notification(ReferenceTier::Destroy, &counters);
        cache.get(&n).unwrap();
        archiving(&n);

        assert_eq!(cache.archive(&n), Ok(ReferenceTier::Destroy));
        assert_exclusive(&cache);
        assert!(!cache.forget(&n));
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(cache.counts(), CacheCounts::default());
    }

    #[test]
    fn strong_tier_keeps_element() {
        let (mut cache, counters) = cache_with(PipelineConfig::default());
        let n = notification(ReferenceTier::Strong, &counters);
        cache.get(&n).unwrap();
        archiving(&n);

        assert_eq!(cache.archive(&n), Ok(ReferenceTier::Strong));
        assert_eq!(cache.entry_kind(n.id()), Some(EntryKind::Strong));
        assert_exclusive(&cache);
    }

    #[test]
    fn archive_before_display_is_lazy() {
        let (mut cache, counters) = cache_with(PipelineConfig::default());
        let n = notification(ReferenceTier::Weak, &counters);
        archiving(&n);

        assert_eq!(cache.archive(&n), Ok(ReferenceTier::Weak));
        assert_eq!(cache.entry_kind(n.id()), None);
        assert_eq!(counters.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn element_hook_overrides_tier() {
        struct Sticky;
        impl RenderElement for Sticky {
            fn size(&self) -> Size {
                Size::default()
            }
            fn on_archive(&mut self, _proposed: ReferenceTier) -> Option<ReferenceTier> {
                Some(ReferenceTier::Strong)
            }
        }

        let mut factories = FactoryRegistry::new();
        factories.register(
            NotificationKind::Info,
            Arc::new(|_: &Notification| -> std::result::Result<Box<dyn RenderElement>, ElementError> {
                Ok(Box::new(Sticky))
            }),
        );
        let mut cache = ElementCache::new(
            factories,
            &PipelineConfig::default(),
            CancellationToken::new(),
        );
        let n = Notification::builder(NotificationKind::Info, "sticky").build();
        cache.get(&n).unwrap();
        archiving(&n);

        assert_eq!(cache.archive(&n), Ok(ReferenceTier::Strong));
    }

    #[tokio::test(start_paused = true)]
    async fn weak_entry_is_reclaimed_after_ttl() {
        let (mut cache, counters) = cache_with(PipelineConfig::default());
        let n = notification(ReferenceTier::Weak, &counters);
        cache.get(&n).unwrap();
        archiving(&n);
        cache.archive(&n).unwrap();

        assert_eq!(
            cache.entry_kind(n.id()),
            Some(EntryKind::Tiered(ReferenceTier::Weak))
        );
        assert_eq!(cache.counts().weak, 1);
        assert_exclusive(&cache);

        tokio::time::sleep(Duration::from_millis(2_001)).await;

        assert_eq!(cache.entry_kind(n.id()), None);
        // Unlinked by the watcher, dropped only once the owner drains.
        assert_eq!(counters.recycled.load(Ordering::SeqCst), 0);
        assert_eq!(cache.drain_reclaimed(), 1);
        assert_eq!(counters.recycled.load(Ordering::SeqCst), 1);
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recovered_element_ignores_stale_signal() {
        let (mut cache, counters) = cache_with(PipelineConfig::default());
        let n = notification(ReferenceTier::Weak, &counters);
        cache.get(&n).unwrap();
        archiving(&n);
        cache.archive(&n).unwrap();

        // Re-displayed before the TTL: the element comes back without a new create.
        cache.get(&n).unwrap();
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(cache.entry_kind(n.id()), Some(EntryKind::Strong));
        assert_exclusive(&cache);

        tokio::time::sleep(Duration::from_millis(2_001)).await;
        assert_eq!(cache.entry_kind(n.id()), Some(EntryKind::Strong));
        assert_eq!(cache.drain_reclaimed(), 0);
        assert_eq!(counters.recycled.load(Ordering::SeqCst), 0);
        assert_exclusive(&cache);
    }

    #[tokio::test(start_paused = true)]
    async fn soft_capacity_evicts_least_recent() {
        let config = PipelineConfig {
            reclaim: ReclaimPolicy {
                soft_capacity: 2,
                ..ReclaimPolicy::default()
            },
            ..PipelineConfig::default()
        };
        let (mut cache, counters) = cache_with(config);
        let batch: Vec<_> = (0..3)
            .map(|_| notification(ReferenceTier::Soft, &counters))
            .collect();
        for n in &batch {
            cache.get(n).unwrap();
            archiving(n);
            cache.archive(n).unwrap();
            assert_exclusive(&cache);
        }

        assert_eq!(cache.entry_kind(batch[0].id()), None);
        assert_eq!(cache.counts().soft, 2);
        assert_eq!(counters.recycled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reclaimer_collects_on_demand() {
        let (mut cache, counters) = cache_with(PipelineConfig::default());
        let n = notification(ReferenceTier::Soft, &counters);
        cache.get(&n).unwrap();
        archiving(&n);
        cache.archive(&n).unwrap();

        let reclaimer = cache.reclaimer();
        reclaimer.collect(n.id());
        reclaimer.collect(n.id());
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(cache.counts(), CacheCounts::default());
        assert_eq!(cache.recycle_reclaimed().await, 1);
        assert_eq!(counters.recycled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_tears_down_leftovers() {
        let (mut cache, counters) = cache_with(PipelineConfig::default());
        let kept = notification(ReferenceTier::Weak, &counters);
        let parked = notification(ReferenceTier::Weak, &counters);
        cache.get(&kept).unwrap();
        cache.get(&parked).unwrap();
        archiving(&parked);
        cache.archive(&parked).unwrap();

        assert_eq!(cache.shutdown(), 2);
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 2);
        assert_eq!(cache.counts(), CacheCounts::default());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Get(usize),
        Archive(usize),
        Forget(usize),
        Collect(usize),
        CollectAll,
        Wait(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0..POOL).prop_map(Op::Get),
            3 => (0..POOL).prop_map(Op::Archive),
            1 => (0..POOL).prop_map(Op::Forget),
            1 => (0..POOL).prop_map(Op::Collect),
            1 => Just(Op::CollectAll),
            1 => (1u64..3_000).prop_map(Op::Wait),
        ]
    }

    const POOL: usize = 5;

    fn tier_for(index: usize) -> ReferenceTier {
        match index % 4 {
            0 => ReferenceTier::Strong,
            1 => ReferenceTier::Weak,
            2 => ReferenceTier::Soft,
            _ => ReferenceTier::Destroy,
        }
    }

    /// Applies `ops` and checks after each step that elements live in at most
    /// one map and that every created element is accounted for.
    async fn run_ops(ops: Vec<Op>) {
        let config = PipelineConfig {
            reclaim: ReclaimPolicy {
                soft_capacity: 2,
                ..ReclaimPolicy::default()
            },
            ..PipelineConfig::default()
        };
        let (mut cache, counters) = cache_with(config);
        let reclaimer = cache.reclaimer();
        let pool: Vec<_> = (0..POOL)
            .map(|i| notification(tier_for(i), &counters))
            .collect();

        for op in ops {
            match op {
                Op::Get(i) => {
                    cache.get(&pool[i]).unwrap();
                }
                Op::Archive(i) => {
                    let n = &pool[i];
                    n.transition(NotificationState::Archiving).unwrap();
                    cache.archive(n).unwrap();
                    n.transition(NotificationState::Archive).unwrap();
                    n.reset().unwrap();
                }
                Op::Forget(i) => {
                    cache.forget(&pool[i]);
                }
                Op::Collect(i) => reclaimer.collect(pool[i].id()),
                Op::CollectAll => reclaimer.collect_all(),
                Op::Wait(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            }
            // Give the watcher a turn, then hand back what it unlinked.
            tokio::task::yield_now().await;
            cache.drain_reclaimed();

            assert_exclusive(&cache);
            let counts = cache.counts();
            let live = counters.created.load(Ordering::SeqCst)
                - counters.destroyed.load(Ordering::SeqCst)
                - counters.recycled.load(Ordering::SeqCst);
            assert_eq!(live, counts.strong + counts.weak + counts.soft);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn element_lives_in_one_place(ops in proptest::collection::vec(op(), 1..40)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            runtime.block_on(run_ops(ops));
        }
    }
}
