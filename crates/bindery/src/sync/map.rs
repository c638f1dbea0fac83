//! Key to view model index shared by the synchronizers.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use bindery_core::ItemIdentity;

/// View models indexed by the key of their model.
///
/// A key may hold several view models: the same model listed twice under
/// identity keys, or distinct models whose content keys collide. Entries
/// under one key keep insertion order.
pub(crate) struct ViewModelMap<Key, V: ?Sized> {
    entries: HashMap<Key, Vec<Arc<V>>>,
    len: usize,
}

impl<Key, V> ViewModelMap<Key, V>
where
    Key: Eq + Hash + Clone + Debug,
    V: ?Sized,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            len: 0,
        }
    }

    /// Total number of view models held.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.len = 0;
    }

    /// Add `view_model` under `key`. Returns `true` when the key already
    /// held other view models.
    pub(crate) fn insert(&mut self, key: Key, view_model: Arc<V>) -> bool {
        let slot = self.entries.entry(key).or_default();
        let shared = !slot.is_empty();
        slot.push(view_model);
        self.len += 1;
        shared
    }

    /// The first view model under `key`.
    pub(crate) fn first(&self, key: &Key) -> Option<Arc<V>> {
        self.entries.get(key).and_then(|slot| slot.first().cloned())
    }

    /// Every view model under `key`.
    pub(crate) fn all(&self, key: &Key) -> Vec<Arc<V>> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// The first view model under `key` matching `predicate`.
    pub(crate) fn find_in<P>(&self, key: &Key, predicate: P) -> Option<Arc<V>>
    where
        P: Fn(&Arc<V>) -> bool,
    {
        self.entries
            .get(key)
            .and_then(|slot| slot.iter().find(|vm| predicate(vm)).cloned())
    }

    /// Remove the first view model under `key` matching `predicate`.
    pub(crate) fn take_in<P>(&mut self, key: &Key, predicate: P) -> Option<Arc<V>>
    where
        P: Fn(&Arc<V>) -> bool,
    {
        let slot = self.entries.get_mut(key)?;
        let position = slot.iter().position(|vm| predicate(vm))?;
        let view_model = slot.remove(position);
        if slot.is_empty() {
            self.entries.remove(key);
        }
        self.len -= 1;
        Some(view_model)
    }

    /// Remove the first view model under any key matching `predicate`,
    /// returning it with the key it was stored under.
    pub(crate) fn take_any<P>(&mut self, predicate: P) -> Option<(Key, Arc<V>)>
    where
        P: Fn(&Arc<V>) -> bool,
    {
        let key = self
            .entries
            .iter()
            .find(|(_, slot)| slot.iter().any(&predicate))
            .map(|(key, _)| key.clone())?;
        let view_model = self.take_in(&key, predicate)?;
        Some((key, view_model))
    }
}

impl<Key, V> ViewModelMap<Key, V>
where
    Key: Eq + Hash + Clone + Debug,
    V: ?Sized,
    Arc<V>: ItemIdentity,
{
    /// Whether `view_model` itself is stored under `key`.
    pub(crate) fn holds(&self, key: &Key, view_model: &Arc<V>) -> bool {
        self.entries
            .get(key)
            .is_some_and(|slot| slot.iter().any(|vm| vm.same_item(view_model)))
    }

    /// Remove `view_model` wherever it is stored.
    pub(crate) fn remove_view_model(&mut self, view_model: &Arc<V>) -> Option<Key> {
        self.take_any(|vm| vm.same_item(view_model)).map(|(key, _)| key)
    }
}
