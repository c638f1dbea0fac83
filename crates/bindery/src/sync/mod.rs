//! Model/view model collection synchronization.
//!
//! A [`CollectionSynchronizer`] keeps an ordered collection of models and an
//! ordered collection of view models mutually consistent:
//!
//! - both collections have the same length after every change
//! - `view_models[i].model()` is `model[i]`
//! - the key-to-view-model map holds exactly one entry per model element
//!
//! Changes flow both ways. Inserting a model creates its view model at the
//! same index; inserting a view model inserts its model. An `editing` flag
//! drops the echo of a change the synchronizer is itself applying, so a
//! single model insert produces a single view model insert.
//!
//! A view model inserted without a model has nothing to contribute to the
//! model collection. It is dropped from the view model collection once the
//! change that brought it in has been delivered.
//!
//! # Variants
//!
//! - [`LimitedCollectionSynchronizer`] - exposes a filtered, sorted and
//!   size-limited view of the view models
//! - [`RekeyableCollectionSynchronizer`] - tolerates model keys that change
//!   after insertion

mod factory;
mod key;
mod limited;
mod map;
mod rekey;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use bindery_core::logging::{span_names, targets};
use bindery_core::{
    BinderyError, ChangeNotifier, CollectionChange, CollectionLink, ConnectionGuard, Disposable,
    DisposableScope, ItemIdentity, LifecycleError, Model, ObservableCollection, PerfSpan, Result,
    bindery_warn,
};

use crate::view_model::ViewModel;
use map::ViewModelMap;

pub use factory::ViewModelFactory;
pub use key::{ContentKey, IdentityKey, KeyPolicy, Keyed};
pub use limited::{Limitation, LimitedCollectionSynchronizer, Timestamped};
pub use rekey::RekeyableCollectionSynchronizer;

/// Re-entrancy guard over a shared flag.
///
/// `try_begin` fails when the flag is already set; `hold` always sets it and
/// restores the previous state on drop.
pub(crate) struct EditGuard<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl<'a> EditGuard<'a> {
    pub(crate) fn try_begin(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self {
                flag,
                previous: false,
            })
        }
    }

    pub(crate) fn hold(flag: &'a AtomicBool) -> Self {
        let previous = flag.swap(true, Ordering::SeqCst);
        Self { flag, previous }
    }
}

impl Drop for EditGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::SeqCst);
    }
}

/// Remove every element of `items` from `collection`, one event per
/// contiguous run.
pub(crate) fn remove_items<T>(collection: &ObservableCollection<T>, items: &[T])
where
    T: Clone + Send + Sync + ItemIdentity + 'static,
{
    let mut indices: Vec<usize> = collection.with_items(|current| {
        items
            .iter()
            .filter_map(|item| current.iter().position(|x| x.same_item(item)))
            .collect()
    });
    indices.sort_unstable();
    indices.dedup();

    let mut runs: Vec<(usize, usize)> = Vec::new();
    for index in indices {
        match runs.last_mut() {
            Some((start, len)) if *start + *len == index => *len += 1,
            _ => runs.push((index, 1)),
        }
    }
    for (start, len) in runs.into_iter().rev() {
        collection.remove_range(start, len);
    }
}

type ModelCollection<M> = ObservableCollection<Arc<M>>;
type ViewModelCollection<V> = ObservableCollection<Arc<V>>;

pub(crate) struct SyncInner<M: ?Sized, V: ?Sized, K: KeyPolicy<M>> {
    model: RwLock<Arc<ModelCollection<M>>>,
    view_models: Arc<ViewModelCollection<V>>,
    map: Mutex<ViewModelMap<K::Key, V>>,
    factory: ViewModelFactory<V>,
    editing: AtomicBool,
    model_link: Mutex<Option<ConnectionGuard<CollectionChange<Arc<M>>>>>,
    selection: Arc<ViewModelCollection<V>>,
    notifier: ChangeNotifier,
    scope: DisposableScope,
}

/// Keeps a model collection and a view model collection consistent.
///
/// The synchronizer is a cheap handle; clones share the same state.
///
/// # Example
///
/// ```
/// use bindery::ViewModelBase;
/// use bindery::sync::{CollectionSynchronizer, ViewModelFactory};
/// use bindery_core::{ChangeNotifier, Model, Notify, ObservableCollection};
/// use std::sync::Arc;
///
/// struct Clip {
///     notifier: ChangeNotifier,
/// }
///
/// impl Notify for Clip {
///     fn notifier(&self) -> &ChangeNotifier {
///         &self.notifier
///     }
/// }
///
/// impl Model for Clip {}
///
/// let clips = Arc::new(ObservableCollection::new());
/// let sync = CollectionSynchronizer::new(ViewModelFactory::new(|| Arc::new(ViewModelBase::<Clip>::new())));
/// sync.set_model(clips.clone()).unwrap();
///
/// clips.push(Arc::new(Clip { notifier: ChangeNotifier::new() }));
/// assert_eq!(sync.view_models().len(), 1);
/// ```
pub struct CollectionSynchronizer<M: ?Sized, V: ?Sized, K: KeyPolicy<M> = IdentityKey> {
    inner: Arc<SyncInner<M, V, K>>,
}

impl<M: ?Sized, V: ?Sized, K: KeyPolicy<M>> Clone for CollectionSynchronizer<M, V, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M, V> CollectionSynchronizer<M, V, IdentityKey>
where
    M: ?Sized + Model,
    V: ?Sized + ViewModel<Model = M>,
{
    /// Create a synchronizer over an empty model collection, keying models
    /// by identity.
    pub fn new(factory: ViewModelFactory<V>) -> Self {
        Self::with_key_policy(factory)
    }
}

impl<M, V, K> CollectionSynchronizer<M, V, K>
where
    M: ?Sized + Model,
    V: ?Sized + ViewModel<Model = M>,
    K: KeyPolicy<M>,
{
    /// Create a synchronizer over an empty model collection, keying models
    /// with `K`.
    pub fn with_key_policy(factory: ViewModelFactory<V>) -> Self {
        let inner = Arc::new(SyncInner {
            model: RwLock::new(Arc::new(ObservableCollection::new())),
            view_models: Arc::new(ObservableCollection::new()),
            map: Mutex::new(ViewModelMap::new()),
            factory,
            editing: AtomicBool::new(false),
            model_link: Mutex::new(None),
            selection: Arc::new(ObservableCollection::new()),
            notifier: ChangeNotifier::new(),
            scope: DisposableScope::new(),
        });

        let weak = Arc::downgrade(&inner);
        let view_model_link = inner.view_models.connect_scoped(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.on_view_models_changed(change);
            }
        });
        inner.scope.keep(view_model_link);

        let weak_notifier = inner.notifier.downgrade();
        let selection_link = inner.selection.connect_scoped(move |_| {
            if let Some(notifier) = weak_notifier.upgrade() {
                notifier.raise("Selection");
            }
        });
        inner.scope.keep(selection_link);

        let collection_link: CollectionLink =
            inner.notifier.observe_collection("ViewModels", &inner.view_models);
        inner.scope.keep(collection_link);

        let model = inner.model.read().clone();
        inner.subscribe_model(&model);

        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<SyncInner<M, V, K>> {
        &self.inner
    }

    /// The current model collection.
    pub fn model(&self) -> Arc<ModelCollection<M>> {
        self.inner.model.read().clone()
    }

    /// Point the synchronizer at another model collection.
    ///
    /// The view models are rebuilt and published with a single reset.
    pub fn set_model(&self, model: Arc<ModelCollection<M>>) -> Result<()> {
        self.ensure_alive()?;
        self.inner.set_model(model);
        Ok(())
    }

    /// The view model collection. The same instance for the synchronizer's
    /// whole lifetime.
    pub fn view_models(&self) -> &Arc<ViewModelCollection<V>> {
        &self.inner.view_models
    }

    /// The synchronizer's own notifier.
    ///
    /// Raises `Selection` when the selection changes and
    /// `Collection_ViewModels` on structural view model changes, and forwards
    /// view model notifications.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }

    pub fn factory(&self) -> &ViewModelFactory<V> {
        &self.inner.factory
    }

    /// The view model created for `model`.
    ///
    /// When `model` is listed more than once, the view model of its first
    /// remaining occurrence.
    pub fn view_model_for(&self, model: &Arc<M>) -> Option<Arc<V>> {
        self.inner
            .map
            .lock()
            .find_in(&K::key(model), |vm| wraps(vm, model))
    }

    /// The first view model stored under `key`.
    pub fn view_model_for_key(&self, key: &K::Key) -> Option<Arc<V>> {
        self.inner.map.lock().first(key)
    }

    /// Every view model stored under `key`, in insertion order.
    ///
    /// Holds more than one element when models share a key.
    pub fn view_models_for_key(&self, key: &K::Key) -> Vec<Arc<V>> {
        self.inner.map.lock().all(key)
    }

    /// Number of map entries, one per model element.
    pub fn mapped_count(&self) -> usize {
        self.inner.map.lock().len()
    }

    /// The selected view models.
    pub fn selection(&self) -> &Arc<ViewModelCollection<V>> {
        &self.inner.selection
    }

    /// Select a single view model.
    ///
    /// With an empty selection the view model is added, with exactly one
    /// selected element it replaces it, otherwise the selection is reset to
    /// it. `None` leaves the selection untouched.
    pub fn select_view_model(&self, view_model: Option<&Arc<V>>) -> Result<()> {
        self.ensure_alive()?;
        let Some(view_model) = view_model else {
            return Ok(());
        };
        let selection = &self.inner.selection;
        match selection.len() {
            0 => selection.push(view_model.clone()),
            1 => {
                selection.set(0, view_model.clone());
            }
            _ => {
                selection.reset(vec![view_model.clone()]);
            }
        }
        Ok(())
    }

    /// Replace the whole selection.
    pub fn replace_selection(&self, view_models: Vec<Arc<V>>) -> Result<()> {
        self.ensure_alive()?;
        self.inner.selection.reset(view_models);
        Ok(())
    }

    pub fn clear_selection(&self) {
        if !self.inner.selection.is_empty() {
            self.inner.selection.clear();
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.inner.scope.is_disposed() {
            return Err(LifecycleError::Disposed {
                component: "CollectionSynchronizer",
            }
            .into());
        }
        Ok(())
    }

    /// Tear down: disconnect from both collections, silence the view model
    /// collection and clear the map and selection. Idempotent.
    pub fn dispose(&self) {
        let inner = &self.inner;
        if inner.scope.is_disposed() {
            return;
        }
        inner.model_link.lock().take();
        inner.scope.dispose();
        inner.view_models.set_ignore_events(true);
        inner.selection.set_ignore_events(true);
        inner.selection.clear();
        inner.map.lock().clear();
        inner.notifier.dispose();
        tracing::debug!(target: targets::SYNC, "collection synchronizer disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.scope.is_disposed()
    }
}

impl<M, V, K> CollectionSynchronizer<M, V, K>
where
    M: ?Sized + Model + PartialEq,
    V: ?Sized + ViewModel<Model = M>,
    K: KeyPolicy<M>,
{
    /// Select the view model whose model equals `model`.
    ///
    /// Models are compared by value. `None` is a no-op; a model without a
    /// matching view model is an error.
    pub fn select(&self, model: Option<&M>) -> Result<()> {
        let Some(model) = model else {
            return Ok(());
        };
        let found = self.inner.view_models.with_items(|view_models| {
            view_models
                .iter()
                .find(|vm| vm.model().is_some_and(|m| *m == *model))
                .cloned()
        });
        match found {
            Some(view_model) => self.select_view_model(Some(&view_model)),
            None => Err(BinderyError::item_not_found(format!(
                "model of type {}",
                model.type_name()
            ))),
        }
    }
}

impl<M, V, K> Disposable for CollectionSynchronizer<M, V, K>
where
    M: ?Sized + Model,
    V: ?Sized + ViewModel<Model = M>,
    K: KeyPolicy<M>,
{
    fn dispose(&self) {
        CollectionSynchronizer::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        CollectionSynchronizer::is_disposed(self)
    }
}

impl<M, V, K> fmt::Debug for CollectionSynchronizer<M, V, K>
where
    M: ?Sized + Model,
    V: ?Sized + ViewModel<Model = M>,
    K: KeyPolicy<M>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionSynchronizer")
            .field("models", &self.inner.model.read().len())
            .field("view_models", &self.inner.view_models.len())
            .field("mapped", &self.inner.map.lock().len())
            .field("disposed", &self.inner.scope.is_disposed())
            .finish()
    }
}

/// Whether `view_model` currently wraps `model`.
fn wraps<M, V>(view_model: &Arc<V>, model: &Arc<M>) -> bool
where
    M: ?Sized + Model,
    V: ?Sized + ViewModel<Model = M>,
{
    view_model.model().is_some_and(|m| m.same_item(model))
}

impl<M, V, K> SyncInner<M, V, K>
where
    M: ?Sized + Model,
    V: ?Sized + ViewModel<Model = M>,
    K: KeyPolicy<M>,
{
    fn subscribe_model(self: &Arc<Self>, model: &Arc<ModelCollection<M>>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let link = model.connect_scoped(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.on_model_changed(change);
            }
        });
        *self.model_link.lock() = Some(link);
    }

    fn set_model(self: &Arc<Self>, model: Arc<ModelCollection<M>>) {
        self.model_link.lock().take();
        *self.model.write() = model.clone();
        {
            let _editing = EditGuard::hold(&self.editing);
            self.rebuild();
        }
        self.subscribe_model(&model);
    }

    /// Recreate every view model from the current model contents.
    #[tracing::instrument(skip_all, target = "bindery::sync", level = "debug")]
    fn rebuild(&self) {
        let _perf = PerfSpan::new(span_names::REBUILD);
        let models = self.model.read().items();
        let view_models: Vec<Arc<V>> = models.iter().map(|m| self.factory.create(m)).collect();
        {
            let mut map = self.map.lock();
            map.clear();
            for (model, view_model) in models.iter().zip(&view_models) {
                Self::record(&mut map, model, view_model.clone());
            }
        }
        tracing::debug!(target: targets::SYNC, count = view_models.len(), "view models rebuilt");
        self.view_models.reset(view_models);
        self.prune_selection();
    }

    fn on_model_changed(&self, change: &CollectionChange<Arc<M>>) {
        let Some(_editing) = EditGuard::try_begin(&self.editing) else {
            return;
        };
        match change {
            CollectionChange::Inserted { index, items } => {
                let view_models: Vec<Arc<V>> = items.iter().map(|m| self.factory.create(m)).collect();
                {
                    let mut map = self.map.lock();
                    for (model, view_model) in items.iter().zip(&view_models) {
                        Self::record(&mut map, model, view_model.clone());
                    }
                }
                self.view_models.insert_range(*index, view_models);
            }
            CollectionChange::Removed { items, .. } => {
                let removed: Vec<Arc<V>> =
                    items.iter().filter_map(|m| self.take_view_model(m)).collect();
                remove_items(&*self.view_models, &removed);
                self.prune_selection();
            }
            CollectionChange::Replaced { .. } | CollectionChange::Reset { .. } => self.rebuild(),
        }
    }

    fn on_view_models_changed(self: &Arc<Self>, change: &CollectionChange<Arc<V>>) {
        let Some(_editing) = EditGuard::try_begin(&self.editing) else {
            return;
        };
        let model = self.model.read().clone();
        match change {
            CollectionChange::Inserted { index, items } => {
                let (paired, orphans) = self.pair_with_models(items);
                {
                    let mut map = self.map.lock();
                    for (model, view_model) in &paired {
                        Self::record(&mut map, model, view_model.clone());
                    }
                }
                model.insert_range(*index, paired.into_iter().map(|(m, _)| m).collect());
                self.drop_orphans(orphans);
            }
            CollectionChange::Removed { index, items } => {
                {
                    let mut map = self.map.lock();
                    for view_model in items {
                        map.remove_view_model(view_model);
                    }
                }
                if *index + items.len() <= model.len() {
                    model.remove_range(*index, items.len());
                } else {
                    let models: Vec<Arc<M>> = items.iter().filter_map(|vm| vm.model()).collect();
                    remove_items(&*model, &models);
                }
                self.prune_selection();
            }
            CollectionChange::Replaced { index, new, .. } => {
                let (paired, orphans) = self.pair_with_models(new);
                let models: Vec<Arc<M>> = paired.into_iter().map(|(m, _)| m).collect();
                if orphans.is_empty() {
                    model.replace_range(*index, models);
                } else {
                    model.remove_range(*index, new.len().min(model.len().saturating_sub(*index)));
                    model.insert_range((*index).min(model.len()), models);
                }
                self.remap();
                self.prune_selection();
                self.drop_orphans(orphans);
            }
            CollectionChange::Reset { new, .. } => {
                let (paired, orphans) = self.pair_with_models(new);
                model.reset(paired.into_iter().map(|(m, _)| m).collect());
                self.remap();
                self.prune_selection();
                self.drop_orphans(orphans);
            }
        }
    }

    /// Split `view_models` into those wrapping a model, paired with it, and
    /// those without one.
    fn pair_with_models(&self, view_models: &[Arc<V>]) -> (Vec<(Arc<M>, Arc<V>)>, Vec<Arc<V>>) {
        let mut paired = Vec::with_capacity(view_models.len());
        let mut orphans = Vec::new();
        for view_model in view_models {
            match view_model.model() {
                Some(model) => paired.push((model, view_model.clone())),
                None => orphans.push(view_model.clone()),
            }
        }
        (paired, orphans)
    }

    /// Take view models without a model back out of the view model
    /// collection once the current change has been delivered.
    fn drop_orphans(self: &Arc<Self>, orphans: Vec<Arc<V>>) {
        if orphans.is_empty() {
            return;
        }
        bindery_warn!(count = orphans.len(), "view models without a model dropped");
        let weak = Arc::downgrade(self);
        self.view_models.defer(move |view_models| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let _editing = EditGuard::hold(&inner.editing);
            remove_items(view_models, &orphans);
            inner.prune_selection();
        });
    }

    /// Add `view_model` to `map` under the key of `model`, warning when the
    /// key already belongs to a different model.
    fn record(map: &mut ViewModelMap<K::Key, V>, model: &Arc<M>, view_model: Arc<V>) {
        let key = K::key(model);
        if map
            .find_in(&key, |vm| vm.model().is_some_and(|m| !m.same_item(model)))
            .is_some()
        {
            bindery_warn!(key = ?key, "distinct models share a key");
        }
        map.insert(key, view_model);
    }

    /// Remove and return the map entry for `model`.
    ///
    /// Falls back to a scan by model identity when the model's key changed
    /// since it was inserted.
    fn take_view_model(&self, model: &Arc<M>) -> Option<Arc<V>> {
        let mut map = self.map.lock();
        map.take_in(&K::key(model), |vm| wraps(vm, model))
            .or_else(|| map.take_any(|vm| wraps(vm, model)).map(|(_, vm)| vm))
    }

    /// Rebuild the map from the current view models.
    fn remap(&self) {
        let view_models = self.view_models.items();
        let mut map = self.map.lock();
        map.clear();
        for view_model in view_models {
            if let Some(model) = view_model.model() {
                Self::record(&mut map, &model, view_model);
            }
        }
    }

    fn prune_selection(&self) {
        let stale: Vec<Arc<V>> = self.selection.with_items(|selected| {
            selected
                .iter()
                .filter(|vm| !self.view_models.contains(vm))
                .cloned()
                .collect()
        });
        if !stale.is_empty() {
            remove_items(&*self.selection, &stale);
        }
    }

    /// Move the map entry of `view_model` under its model's current key.
    ///
    /// Returns `true` when the entry was stale. An entry moved onto a key
    /// held by another model's view model is kept next to it.
    pub(crate) fn rekey(&self, view_model: &Arc<V>) -> bool {
        let Some(model) = view_model.model() else {
            return false;
        };
        let key = K::key(&model);
        let mut map = self.map.lock();
        if map.holds(&key, view_model) {
            return false;
        }
        let Some(stale) = map.remove_view_model(view_model) else {
            return false;
        };
        tracing::trace!(target: targets::SYNC, from = ?stale, to = ?key, "view model rekeyed");
        Self::record(&mut map, &model, view_model.clone());
        true
    }
}
