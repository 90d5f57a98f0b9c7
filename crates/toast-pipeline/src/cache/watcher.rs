//! Reclamation watcher.
//!
//! Waits on the reclamation channel and on the earliest tier deadline, and
//! unlinks tiered entries whose time is up. Unlinked entries go back to the
//! cache owner through the reclaimed channel; the watcher never drops a
//! render element itself.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use toast_model::{NotificationId, ReferenceTier};

use super::{ReclaimedTx, TieredMap, reclaim, reclaim_all};
use crate::config::ReclaimPolicy;
use crate::timers::wait_until;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReclaimSignal {
    /// An element was demoted; schedule its expiry.
    Track {
        id: NotificationId,
        epoch: u64,
        tier: ReferenceTier,
    },
    Collect {
        id: NotificationId,
    },
    CollectAll,
}

pub(super) async fn run(
    tiered: Arc<Mutex<TieredMap>>,
    mut signals: mpsc::UnboundedReceiver<ReclaimSignal>,
    bin: ReclaimedTx,
    policy: ReclaimPolicy,
    cancel: CancellationToken,
) {
    let mut deadlines: BinaryHeap<Reverse<(Instant, u64, NotificationId)>> = BinaryHeap::new();

    loop {
        let next = deadlines.peek().map(|Reverse((at, _, _))| *at);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            signal = signals.recv() => match signal {
                Some(ReclaimSignal::Track { id, epoch, tier }) => {
                    let ttl = match tier {
                        ReferenceTier::Soft => policy.soft_ttl(),
                        _ => policy.weak_ttl(),
                    };
                    deadlines.push(Reverse((Instant::now() + ttl, epoch, id)));
                }
                Some(ReclaimSignal::Collect { id }) => {
                    reclaim(&tiered, &bin, id, None);
                }
                Some(ReclaimSignal::CollectAll) => {
                    let count = reclaim_all(&tiered, &bin);
                    tracing::debug!(count, "Reclaimed all tiered elements");
                }
                None => break,
            },
            () = wait_until(next) => {
                let now = Instant::now();
                while let Some(Reverse((at, epoch, id))) = deadlines.peek().copied() {
                    if at > now {
                        break;
                    }
                    deadlines.pop();
                    // Entries recovered or re-demoted since carry another epoch.
                    reclaim(&tiered, &bin, id, Some(epoch));
                }
            }
        }
    }

    tracing::info!("Reclamation watcher stopped");
}
