//! Ordered collections with structural change events.
//!
//! [`ObservableCollection<T>`] is the list type shared between models, view
//! models and synchronizers. Every structural mutation is reported through
//! [`ObservableCollection::changed`] as a single [`CollectionChange`]: range
//! operations produce one event, not one per element.
//!
//! Like the list models in the model/view layer, the item lock is released
//! before the change is emitted, so handlers may read or mutate the collection
//! they are observing. A handler that must not mutate the collection while
//! other handlers are still receiving the same change can
//! [`defer`](ObservableCollection::defer) the mutation instead.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::logging::targets;
use crate::signal::{ConnectionGuard, ConnectionId, Signal};

/// A structural change to an [`ObservableCollection`].
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionChange<T> {
    /// `items` were inserted starting at `index`.
    Inserted { index: usize, items: Vec<T> },
    /// `items` were removed; they used to start at `index`.
    Removed { index: usize, items: Vec<T> },
    /// The range starting at `index` was overwritten.
    Replaced {
        index: usize,
        old: Vec<T>,
        new: Vec<T>,
    },
    /// The whole contents changed.
    Reset { old: Vec<T>, new: Vec<T> },
}

impl<T> CollectionChange<T> {
    /// Short name of the change kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Inserted { .. } => "inserted",
            Self::Removed { .. } => "removed",
            Self::Replaced { .. } => "replaced",
            Self::Reset { .. } => "reset",
        }
    }
}

/// Identity comparison for collection elements.
///
/// Shared elements are compared by address, so two distinct but equal models
/// are still different elements.
pub trait ItemIdentity {
    /// Whether `self` and `other` are the same element.
    fn same_item(&self, other: &Self) -> bool;
}

impl<T: ?Sized> ItemIdentity for Arc<T> {
    fn same_item(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(self), Arc::as_ptr(other))
    }
}

/// An ordered collection that reports structural changes.
///
/// # Panics
///
/// Index-based operations follow `Vec` semantics and panic when the index is
/// out of bounds.
///
/// # Example
///
/// ```
/// use bindery_core::{CollectionChange, ObservableCollection};
///
/// let names = ObservableCollection::from_vec(vec!["a".to_string()]);
/// names.changed().connect(|change| {
///     if let CollectionChange::Inserted { index, items } = change {
///         println!("{} item(s) at {index}", items.len());
///     }
/// });
/// names.push("b".to_string());
/// assert_eq!(names.len(), 2);
/// ```
pub struct ObservableCollection<T> {
    items: RwLock<Vec<T>>,
    changed: Arc<Signal<CollectionChange<T>>>,
    delivering: AtomicUsize,
    follow_ups: Mutex<Vec<FollowUp<T>>>,
}

type FollowUp<T> = Box<dyn FnOnce(&ObservableCollection<T>) + Send>;

impl<T: Clone + Send + Sync + 'static> Default for ObservableCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableCollection<T> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create a collection holding `items`.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            changed: Arc::new(Signal::new()),
            delivering: AtomicUsize::new(0),
            follow_ups: Mutex::new(Vec::new()),
        }
    }

    /// The change signal.
    pub fn changed(&self) -> &Arc<Signal<CollectionChange<T>>> {
        &self.changed
    }

    /// Connect a change handler.
    pub fn connect<F>(&self, handler: F) -> ConnectionId
    where
        F: Fn(&CollectionChange<T>) + Send + Sync + 'static,
    {
        self.changed.connect(handler)
    }

    /// Connect a change handler that is disconnected when the guard drops.
    pub fn connect_scoped<F>(&self, handler: F) -> ConnectionGuard<CollectionChange<T>>
    where
        F: Fn(&CollectionChange<T>) + Send + Sync + 'static,
    {
        self.changed.connect_scoped(handler)
    }

    /// Stop or resume emitting change events.
    ///
    /// Mutations still apply while events are ignored.
    pub fn set_ignore_events(&self, ignore: bool) {
        self.changed.set_blocked(ignore);
    }

    /// Whether change events are currently ignored.
    pub fn ignores_events(&self) -> bool {
        self.changed.is_blocked()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Clone of the element at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    /// Snapshot of the current contents.
    pub fn items(&self) -> Vec<T> {
        self.items.read().clone()
    }

    /// Access the contents through a closure without cloning.
    ///
    /// The closure must not mutate this collection.
    pub fn with_items<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[T]) -> R,
    {
        f(&self.items.read())
    }

    /// Index of the first element matching `predicate`.
    pub fn position<P>(&self, predicate: P) -> Option<usize>
    where
        P: FnMut(&T) -> bool,
    {
        self.items.read().iter().position(predicate)
    }

    /// Append one element.
    pub fn push(&self, item: T) {
        self.extend(std::iter::once(item));
    }

    /// Append elements, emitting a single insert.
    pub fn extend<I: IntoIterator<Item = T>>(&self, items: I) {
        let items: Vec<T> = items.into_iter().collect();
        let index = self.len();
        self.insert_range(index, items);
    }

    /// Insert one element at `index`.
    pub fn insert(&self, index: usize, item: T) {
        self.insert_range(index, vec![item]);
    }

    /// Insert elements at `index`, emitting a single insert.
    pub fn insert_range(&self, index: usize, items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        {
            let mut current = self.items.write();
            assert!(index <= current.len(), "insert index {index} out of bounds");
            current.splice(index..index, items.iter().cloned());
        }
        self.emit(CollectionChange::Inserted { index, items });
    }

    /// Remove and return the element at `index`.
    pub fn remove_at(&self, index: usize) -> T {
        let mut removed = self.remove_range(index, 1);
        removed.remove(0)
    }

    /// Remove `count` elements starting at `index`, emitting a single removal.
    pub fn remove_range(&self, index: usize, count: usize) -> Vec<T> {
        if count == 0 {
            return Vec::new();
        }
        let removed: Vec<T> = self.items.write().drain(index..index + count).collect();
        self.emit(CollectionChange::Removed {
            index,
            items: removed.clone(),
        });
        removed
    }

    /// Remove the first element matching `predicate`.
    pub fn remove_first<P>(&self, predicate: P) -> Option<T>
    where
        P: FnMut(&T) -> bool,
    {
        let index = self.position(predicate)?;
        Some(self.remove_at(index))
    }

    /// Overwrite the element at `index`, returning the previous one.
    pub fn set(&self, index: usize, item: T) -> T {
        let mut old = self.replace_range(index, vec![item]);
        old.remove(0)
    }

    /// Overwrite `items.len()` elements starting at `index`.
    pub fn replace_range(&self, index: usize, items: Vec<T>) -> Vec<T> {
        if items.is_empty() {
            return Vec::new();
        }
        let old: Vec<T> = {
            let mut current = self.items.write();
            current
                .splice(index..index + items.len(), items.iter().cloned())
                .collect()
        };
        self.emit(CollectionChange::Replaced {
            index,
            old: old.clone(),
            new: items,
        });
        old
    }

    /// Replace the whole contents, emitting a single reset.
    pub fn reset(&self, items: Vec<T>) -> Vec<T> {
        let old = std::mem::replace(&mut *self.items.write(), items.clone());
        self.emit(CollectionChange::Reset {
            old: old.clone(),
            new: items,
        });
        old
    }

    /// Remove every element, emitting a single reset.
    pub fn clear(&self) -> Vec<T> {
        self.reset(Vec::new())
    }

    fn emit(&self, change: CollectionChange<T>) {
        tracing::trace!(
            target: targets::COLLECTION,
            kind = change.kind(),
            len = self.len(),
            "collection changed"
        );
        self.delivering.fetch_add(1, Ordering::SeqCst);
        self.changed.emit(change);
        if self.delivering.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.run_follow_ups();
        }
    }

    /// Run `follow_up` once the change being delivered has reached every
    /// handler, including changes emitted while delivering it.
    ///
    /// Outside of a delivery `follow_up` runs immediately.
    pub fn defer<F>(&self, follow_up: F)
    where
        F: FnOnce(&Self) + Send + 'static,
    {
        if self.delivering.load(Ordering::SeqCst) == 0 {
            follow_up(self);
        } else {
            self.follow_ups.lock().push(Box::new(follow_up));
        }
    }

    fn run_follow_ups(&self) {
        loop {
            let pending = std::mem::take(&mut *self.follow_ups.lock());
            if pending.is_empty() {
                break;
            }
            for follow_up in pending {
                follow_up(self);
            }
        }
    }
}

impl<T: Clone + Send + Sync + ItemIdentity + 'static> ObservableCollection<T> {
    /// Whether `item` is an element of this collection.
    pub fn contains(&self, item: &T) -> bool {
        self.items.read().iter().any(|x| x.same_item(item))
    }

    /// Index of `item`.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.position(|x| x.same_item(item))
    }

    /// Remove `item`, returning whether it was present.
    pub fn remove(&self, item: &T) -> bool {
        self.remove_first(|x| x.same_item(item)).is_some()
    }
}

impl<T: Clone + Send + Sync + 'static> FromIterator<T> for ObservableCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCollection")
            .field("items", &*self.items.read())
            .finish()
    }
}

static_assertions::assert_impl_all!(ObservableCollection<Arc<String>>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder<T: Clone + Send + Sync + 'static>(
        collection: &ObservableCollection<T>,
    ) -> Arc<Mutex<Vec<CollectionChange<T>>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        collection.connect(move |change| events_clone.lock().push(change.clone()));
        events
    }

    #[test]
    fn test_push_and_insert() {
        let list = ObservableCollection::from_vec(vec![1, 3]);
        let events = recorder(&list);

        list.insert(1, 2);
        list.push(4);

        assert_eq!(list.items(), vec![1, 2, 3, 4]);
        assert_eq!(
            *events.lock(),
            vec![
                CollectionChange::Inserted { index: 1, items: vec![2] },
                CollectionChange::Inserted { index: 3, items: vec![4] },
            ]
        );
    }

    #[test]
    fn test_range_operations_emit_once() {
        let list = ObservableCollection::new();
        let events = recorder(&list);

        list.extend(0..5);
        list.remove_range(1, 3);
        list.replace_range(0, vec![10, 11]);

        assert_eq!(list.items(), vec![10, 11]);
        let events = events.lock();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            CollectionChange::Removed { index: 1, items: vec![1, 2, 3] }
        );
        assert_eq!(
            events[2],
            CollectionChange::Replaced { index: 0, old: vec![0, 4], new: vec![10, 11] }
        );
    }

    #[test]
    fn test_empty_ranges_are_silent() {
        let list = ObservableCollection::<i32>::new();
        let events = recorder(&list);

        list.extend(Vec::new());
        list.insert_range(0, Vec::new());
        assert!(list.remove_range(0, 0).is_empty());

        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_reset_and_clear() {
        let list = ObservableCollection::from_vec(vec!['a', 'b']);
        let events = recorder(&list);

        list.reset(vec!['c']);
        list.clear();

        assert!(list.is_empty());
        assert_eq!(
            *events.lock(),
            vec![
                CollectionChange::Reset { old: vec!['a', 'b'], new: vec!['c'] },
                CollectionChange::Reset { old: vec!['c'], new: vec![] },
            ]
        );
    }

    #[test]
    fn test_remove_by_identity() {
        let a = Arc::new("same".to_string());
        let b = Arc::new("same".to_string());
        let list = ObservableCollection::from_vec(vec![a.clone(), b.clone()]);

        assert!(list.remove(&b));
        assert!(!list.contains(&b));
        assert!(list.contains(&a));
        assert!(!list.remove(&b));
        assert_eq!(list.index_of(&a), Some(0));
    }

    #[test]
    fn test_ignore_events() {
        let list = ObservableCollection::new();
        let events = recorder(&list);

        list.set_ignore_events(true);
        list.push(1);
        list.set_ignore_events(false);
        list.push(2);

        assert_eq!(list.len(), 2);
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_handler_may_mutate_collection() {
        let list = Arc::new(ObservableCollection::<i32>::new());
        let weak = Arc::downgrade(&list);
        list.connect(move |change| {
            if let (CollectionChange::Inserted { items, .. }, Some(list)) = (change, weak.upgrade())
            {
                if items == &vec![1] {
                    list.push(2);
                }
            }
        });

        list.push(1);
        assert_eq!(list.items(), vec![1, 2]);
    }

    #[test]
    fn test_deferred_mutation_runs_after_delivery() {
        let list = Arc::new(ObservableCollection::from_vec(vec![1]));
        let weak = Arc::downgrade(&list);
        list.connect(move |change| {
            if let (CollectionChange::Inserted { .. }, Some(list)) = (change, weak.upgrade()) {
                list.defer(|list| {
                    list.remove_at(0);
                });
            }
        });
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let kinds_clone = kinds.clone();
        list.connect(move |change| kinds_clone.lock().push(change.kind()));

        list.push(2);

        assert_eq!(*kinds.lock(), vec!["inserted", "removed"]);
        assert_eq!(list.items(), vec![2]);

        list.defer(|list| list.push(3));
        assert_eq!(list.items(), vec![2, 3]);
    }

    #[test]
    #[should_panic]
    fn test_insert_out_of_bounds_panics() {
        let list = ObservableCollection::from_vec(vec![1]);
        list.insert(3, 2);
    }
}
