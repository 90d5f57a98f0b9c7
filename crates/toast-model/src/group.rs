//! Membership of an archive group.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::kind::NotificationKind;
use crate::notification::{Notification, NotificationId};
use crate::observable::{ListChange, ObservableList};

/// Ordered archive contents. Insertion order is preserved.
#[derive(Default)]
pub struct GroupMembers {
    list: ObservableList<Arc<Notification>>,
}

impl GroupMembers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a batch as a single change.
    pub fn append(&self, batch: Vec<Arc<Notification>>) {
        self.list.extend(batch);
    }

    pub fn push(&self, notification: Arc<Notification>) {
        self.list.push(notification);
    }

    pub fn remove(&self, id: NotificationId) -> Option<Arc<Notification>> {
        self.list.remove_where(|n| n.id() == id)
    }

    pub fn contains(&self, id: NotificationId) -> bool {
        self.list.position(|n| n.id() == id).is_some()
    }

    pub fn get(&self, id: NotificationId) -> Option<Arc<Notification>> {
        self.list.find(|n| n.id() == id)
    }

    pub fn snapshot(&self) -> Vec<Arc<Notification>> {
        self.list.snapshot()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Member count per kind, in kind order. Kinds with no members are omitted.
    pub fn kind_counts(&self) -> BTreeMap<NotificationKind, usize> {
        let mut counts = BTreeMap::new();
        for member in self.list.snapshot() {
            *counts.entry(member.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Removes every member, returning them in insertion order.
    pub fn drain(&self) -> Vec<Arc<Notification>> {
        self.list.clear()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&ListChange<Arc<Notification>>) + Send + Sync + 'static,
    ) {
        self.list.subscribe(listener);
    }
}

impl std::fmt::Debug for GroupMembers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupMembers")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn make(kind: NotificationKind, title: &str) -> Arc<Notification> {
        Notification::builder(kind, title).build()
    }

    #[test]
    fn append_preserves_order() {
        let members = GroupMembers::new();
        let a = make(NotificationKind::Info, "a");
        let b = make(NotificationKind::Warn, "b");
        let c = make(NotificationKind::Info, "c");
        members.append(vec![a.clone(), b.clone()]);
        members.push(c.clone());

        let ids: Vec<_> = members.snapshot().iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec![a.id(), b.id(), c.id()]);
        assert!(members.contains(b.id()));
        assert_eq!(members.get(c.id()).map(|n| n.id()), Some(c.id()));
    }

    #[test]
    fn kind_counts_follow_membership() {
        let members = GroupMembers::new();
        let warn = make(NotificationKind::Warn, "w");
        members.append(vec![
            make(NotificationKind::Info, "1"),
            warn.clone(),
            make(NotificationKind::Info, "2"),
        ]);

        let counts = members.kind_counts();
        assert_eq!(counts.get(&NotificationKind::Info), Some(&2));
        assert_eq!(counts.get(&NotificationKind::Warn), Some(&1));
        assert_eq!(counts.get(&NotificationKind::Fail), None);

        members.remove(warn.id());
        assert_eq!(members.kind_counts().get(&NotificationKind::Warn), None);
    }

    #[test]
    fn subscribers_see_batch_insert_as_one_change() {
        let members = GroupMembers::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        members.subscribe(move |change| {
            let label = match change {
                ListChange::Inserted { index, items } => format!("+{index}x{}", items.len()),
                ListChange::Removed { index, .. } => format!("-{index}"),
                ListChange::Cleared { items } => format!("clear{}", items.len()),
            };
            sink.lock().expect("lock").push(label);
        });

        let first = make(NotificationKind::Success, "s");
        members.append(vec![first.clone(), make(NotificationKind::Fail, "f")]);
        members.remove(first.id());
        assert_eq!(members.drain().len(), 1);

        assert_eq!(*seen.lock().expect("lock"), vec!["+0x2", "-0", "clear1"]);
    }
}
