//! Deadline queue for the stage loop.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio::time::Instant;

use crate::presenter::PresenterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    ReleaseTick,
    EnterDone(PresenterId),
    HoldDone(PresenterId),
    ExitDone(PresenterId),
}

/// A scheduled event. `seq` identifies the animation (or release run) that
/// armed it; handlers drop events whose sequence is stale.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timer {
    pub at: Instant,
    pub seq: u64,
    pub kind: TimerKind,
    order: u64,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    // Reversed so the max-heap yields the earliest deadline, FIFO among equals.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.order.cmp(&self.order))
    }
}

#[derive(Debug, Default)]
pub(crate) struct Timers {
    heap: BinaryHeap<Timer>,
    next_order: u64,
}

impl Timers {
    pub fn schedule(&mut self, at: Instant, seq: u64, kind: TimerKind) {
        let order = self.next_order;
        self.next_order += 1;
        self.heap.push(Timer {
            at,
            seq,
            kind,
            order,
        });
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|timer| timer.at)
    }

    /// Pops the earliest timer if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<Timer> {
        if self.heap.peek().is_some_and(|timer| timer.at <= now) {
            self.heap.pop()
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Sleeps until `deadline`, or forever when there is none.
pub(crate) async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
