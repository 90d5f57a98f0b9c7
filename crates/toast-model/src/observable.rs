//! Ordered container that reports index-stable changes to subscribers.
//!
//! Listeners run after the internal lock is released, so a listener may read
//! the list it observes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A change applied to an [`ObservableList`].
#[derive(Debug, Clone, PartialEq)]
pub enum ListChange<T> {
    /// `items` now occupy `index..index + items.len()`.
    Inserted { index: usize, items: Vec<T> },
    Removed { index: usize, item: T },
    Cleared { items: Vec<T> },
}

type Listener<T> = Arc<dyn Fn(&ListChange<T>) + Send + Sync>;

pub struct ObservableList<T> {
    items: Mutex<Vec<T>>,
    listeners: Mutex<Vec<Listener<T>>>,
}

impl<T: Clone> ObservableList<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&ListChange<T>) + Send + Sync + 'static) {
        lock(&self.listeners).push(Arc::new(listener));
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }

    /// Clones the current contents.
    pub fn snapshot(&self) -> Vec<T> {
        lock(&self.items).clone()
    }

    /// Appends every item as one change.
    pub fn extend(&self, batch: Vec<T>) {
        if batch.is_empty() {
            return;
        }
        let index = {
            let mut items = lock(&self.items);
            let index = items.len();
            items.extend(batch.iter().cloned());
            index
        };
        self.emit(&ListChange::Inserted {
            index,
            items: batch,
        });
    }

    pub fn push(&self, item: T) {
        self.extend(vec![item]);
    }

    /// Removes the first item matching `pred`.
    pub fn remove_where(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        let removed = {
            let mut items = lock(&self.items);
            items
                .iter()
                .position(&pred)
                .map(|index| (index, items.remove(index)))
        };
        let (index, item) = removed?;
        self.emit(&ListChange::Removed {
            index,
            item: item.clone(),
        });
        Some(item)
    }

    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        lock(&self.items).iter().find(|item| pred(*item)).cloned()
    }

    pub fn position(&self, pred: impl Fn(&T) -> bool) -> Option<usize> {
        lock(&self.items).iter().position(pred)
    }

    /// Empties the list, returning what it held.
    pub fn clear(&self) -> Vec<T> {
        let items = std::mem::take(&mut *lock(&self.items));
        if !items.is_empty() {
            self.emit(&ListChange::Cleared {
                items: items.clone(),
            });
        }
        items
    }

    fn emit(&self, change: &ListChange<T>) {
        let listeners = lock(&self.listeners).clone();
        for listener in listeners {
            listener(change);
        }
    }
}

impl<T: Clone> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(list: &ObservableList<u32>) -> Arc<Mutex<Vec<ListChange<u32>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        list.subscribe(move |change| sink.lock().expect("lock").push(change.clone()));
        seen
    }

    #[test]
    fn extend_reports_insert_index() {
        let list = ObservableList::new();
        let seen = recording(&list);

        list.extend(vec![1, 2]);
        list.push(3);

        assert_eq!(list.snapshot(), vec![1, 2, 3]);
        let seen = seen.lock().expect("lock");
        assert_eq!(
            *seen,
            vec![
                ListChange::Inserted {
                    index: 0,
                    items: vec![1, 2]
                },
                ListChange::Inserted {
                    index: 2,
                    items: vec![3]
                },
            ]
        );
    }

    #[test]
    fn remove_where_reports_position() {
        let list = ObservableList::new();
        list.extend(vec![10, 20, 30]);
        let seen = recording(&list);

        assert_eq!(list.remove_where(|v| *v == 20), Some(20));
        assert_eq!(list.remove_where(|v| *v == 99), None);

        assert_eq!(list.snapshot(), vec![10, 30]);
        assert_eq!(
            *seen.lock().expect("lock"),
            vec![ListChange::Removed { index: 1, item: 20 }]
        );
    }

    #[test]
    fn listener_may_read_the_list() {
        let list = Arc::new(ObservableList::new());
        let observed = Arc::new(Mutex::new(0usize));
        let reader = Arc::clone(&list);
        let out = Arc::clone(&observed);
        list.subscribe(move |_| *out.lock().expect("lock") = reader.len());

        list.extend(vec![1, 2, 3]);
        assert_eq!(*observed.lock().expect("lock"), 3);
    }

    #[test]
    fn empty_operations_emit_nothing() {
        let list = ObservableList::<u32>::new();
        let seen = recording(&list);
        list.extend(Vec::new());
        assert!(list.clear().is_empty());
        assert!(seen.lock().expect("lock").is_empty());
    }
}
