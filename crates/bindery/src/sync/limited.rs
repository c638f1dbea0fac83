//! Size-limited view over a synchronized collection.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use bindery_core::logging::{span_names, targets};
use bindery_core::{
    ChangeNotifier, ChildLink, CollectionChange, Disposable, DisposableScope, ItemIdentity, Model,
    Notify, ObservableCollection, PerfSpan, Property, Result,
};

use super::{CollectionSynchronizer, EditGuard, ViewModelFactory, remove_items};
use crate::config::LimitationConfig;
use crate::view_model::ViewModel;

/// Models with a creation date, used to order a limited collection.
pub trait Timestamped {
    fn creation_date(&self) -> DateTime<Utc>;
}

/// A count limitation: when enabled, at most `maximum` non-exempt elements
/// are shown.
pub struct Limitation {
    notifier: ChangeNotifier,
    enabled: Property<bool>,
    maximum: Property<usize>,
}

impl Limitation {
    /// An enabled limitation.
    pub fn new(maximum: usize) -> Self {
        Self {
            notifier: ChangeNotifier::new(),
            enabled: Property::new("Enabled", true),
            maximum: Property::new("Maximum", maximum),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.set(&self.notifier, enabled)
    }

    pub fn maximum(&self) -> usize {
        self.maximum.get()
    }

    pub fn set_maximum(&self, maximum: usize) -> bool {
        self.maximum.set(&self.notifier, maximum)
    }
}

impl Notify for Limitation {
    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl fmt::Debug for Limitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Limitation")
            .field("enabled", &self.is_enabled())
            .field("maximum", &self.maximum())
            .finish()
    }
}

struct LimitedInner<M: ?Sized, V: ?Sized> {
    base: CollectionSynchronizer<M, V>,
    output: Arc<ObservableCollection<Arc<V>>>,
    limitation: RwLock<Option<Arc<Limitation>>>,
    limitation_link: Mutex<Option<ChildLink>>,
    exempt: RwLock<Vec<Arc<V>>>,
    sort_descending: AtomicBool,
    notifying: AtomicBool,
    scope: DisposableScope,
}

/// A [`CollectionSynchronizer`] exposing a filtered, sorted and size-limited
/// view of its view models.
///
/// With no limitation, or a disabled one, [`view_models`](Self::view_models)
/// holds the base view models in base order. With an enabled limitation it
/// holds, sorted by model creation date, every exempt view model plus the
/// first `maximum` non-exempt ones.
pub struct LimitedCollectionSynchronizer<M: ?Sized, V: ?Sized> {
    inner: Arc<LimitedInner<M, V>>,
}

impl<M, V> LimitedCollectionSynchronizer<M, V>
where
    M: ?Sized + Model + Timestamped,
    V: ?Sized + ViewModel<Model = M>,
{
    /// A synchronizer without limitation, sorting newest first once one is set.
    pub fn new(factory: ViewModelFactory<V>) -> Self {
        let inner = Arc::new(LimitedInner {
            base: CollectionSynchronizer::new(factory),
            output: Arc::new(ObservableCollection::new()),
            limitation: RwLock::new(None),
            limitation_link: Mutex::new(None),
            exempt: RwLock::new(Vec::new()),
            sort_descending: AtomicBool::new(true),
            notifying: AtomicBool::new(false),
            scope: DisposableScope::new(),
        });

        let weak: Weak<LimitedInner<M, V>> = Arc::downgrade(&inner);
        let base_link = inner.base.view_models().connect_scoped(move |change| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !matches!(change, CollectionChange::Inserted { .. }) {
                inner.prune_exemptions();
            }
            if !inner.notifying.load(Ordering::SeqCst) {
                inner.apply_limitation();
            }
        });
        inner.scope.keep(base_link);

        let weak = Arc::downgrade(&inner);
        let output_link = inner.output.connect_scoped(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.on_output_changed(change);
            }
        });
        inner.scope.keep(output_link);

        inner.apply_limitation();
        Self { inner }
    }

    /// A synchronizer configured from `config`.
    pub fn from_config(factory: ViewModelFactory<V>, config: &LimitationConfig) -> Self {
        let sync = Self::new(factory);
        sync.inner
            .sort_descending
            .store(config.sort_descending_by_creation, Ordering::SeqCst);
        sync.set_limitation(Some(Arc::new(config.into_limitation())));
        sync
    }

    /// The unfiltered synchronizer.
    pub fn base(&self) -> &CollectionSynchronizer<M, V> {
        &self.inner.base
    }

    pub fn model(&self) -> Arc<ObservableCollection<Arc<M>>> {
        self.inner.base.model()
    }

    pub fn set_model(&self, model: Arc<ObservableCollection<Arc<M>>>) -> Result<()> {
        self.inner.base.set_model(model)
    }

    /// The limited view models.
    pub fn view_models(&self) -> &Arc<ObservableCollection<Arc<V>>> {
        &self.inner.output
    }

    pub fn limitation(&self) -> Option<Arc<Limitation>> {
        self.inner.limitation.read().clone()
    }

    /// Replace the limitation. `None` shows the unfiltered base.
    pub fn set_limitation(&self, limitation: Option<Arc<Limitation>>) {
        let link = limitation.as_ref().map(|limitation| {
            let weak = Arc::downgrade(&self.inner);
            limitation.notifier().connect_scoped(move |event| {
                let relevant = event.affects("Enabled") || event.affects("Maximum");
                if let Some(inner) = weak.upgrade().filter(|_| relevant) {
                    inner.apply_limitation();
                }
            })
        });
        let old_link = std::mem::replace(&mut *self.inner.limitation_link.lock(), link);
        drop(old_link);
        *self.inner.limitation.write() = limitation;
        self.inner.apply_limitation();
    }

    /// Always show `view_model`, whatever the limitation.
    pub fn exempt(&self, view_model: Arc<V>) {
        {
            let mut exempt = self.inner.exempt.write();
            if exempt.iter().any(|vm| vm.same_item(&view_model)) {
                return;
            }
            exempt.push(view_model);
        }
        self.inner.apply_limitation();
    }

    pub fn remove_exemption(&self, view_model: &Arc<V>) -> bool {
        let removed = {
            let mut exempt = self.inner.exempt.write();
            let before = exempt.len();
            exempt.retain(|vm| !vm.same_item(view_model));
            exempt.len() != before
        };
        if removed {
            self.inner.apply_limitation();
        }
        removed
    }

    pub fn exempt_view_models(&self) -> Vec<Arc<V>> {
        self.inner.exempt.read().clone()
    }

    pub fn sort_descending(&self) -> bool {
        self.inner.sort_descending.load(Ordering::SeqCst)
    }

    /// Sort newest first (`true`) or oldest first.
    pub fn set_sort_descending(&self, descending: bool) {
        if self.inner.sort_descending.swap(descending, Ordering::SeqCst) != descending {
            self.inner.apply_limitation();
        }
    }

    /// Recompute the limited view models.
    pub fn apply_limitation(&self) {
        self.inner.apply_limitation();
    }

    /// Dispose the base synchronizer and silence the limited collection.
    /// Idempotent.
    pub fn dispose(&self) {
        let inner = &self.inner;
        if !inner.scope.dispose() {
            return;
        }
        inner.limitation_link.lock().take();
        inner.limitation.write().take();
        inner.exempt.write().clear();
        inner.output.set_ignore_events(true);
        inner.output.clear();
        inner.base.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.scope.is_disposed()
    }
}

impl<M, V> Disposable for LimitedCollectionSynchronizer<M, V>
where
    M: ?Sized + Model + Timestamped,
    V: ?Sized + ViewModel<Model = M>,
{
    fn dispose(&self) {
        LimitedCollectionSynchronizer::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        LimitedCollectionSynchronizer::is_disposed(self)
    }
}

impl<M, V> fmt::Debug for LimitedCollectionSynchronizer<M, V>
where
    M: ?Sized + Model + Timestamped,
    V: ?Sized + ViewModel<Model = M>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitedCollectionSynchronizer")
            .field("base", &self.inner.base)
            .field("shown", &self.inner.output.len())
            .field("limitation", &*self.inner.limitation.read())
            .finish()
    }
}

impl<M, V> LimitedInner<M, V>
where
    M: ?Sized + Model + Timestamped,
    V: ?Sized + ViewModel<Model = M>,
{
    fn creation_date(view_model: &Arc<V>) -> DateTime<Utc> {
        view_model
            .model()
            .map_or(DateTime::<Utc>::MIN_UTC, |model| model.creation_date())
    }

    fn is_limiting(&self) -> bool {
        self.limitation
            .read()
            .as_ref()
            .is_some_and(|limitation| limitation.is_enabled())
    }

    fn desired(&self) -> Vec<Arc<V>> {
        let mut view_models = self.inner_items();
        let limitation = self.limitation.read().clone();
        let Some(limitation) = limitation.filter(|l| l.is_enabled()) else {
            return view_models;
        };

        let descending = self.sort_descending.load(Ordering::SeqCst);
        view_models.sort_by(|a, b| {
            let order = Self::creation_date(a).cmp(&Self::creation_date(b));
            if descending { order.reverse() } else { order }
        });

        let maximum = limitation.maximum();
        let exempt = self.exempt.read();
        let mut taken = 0;
        view_models.retain(|vm| {
            if exempt.iter().any(|e| e.same_item(vm)) {
                true
            } else if taken < maximum {
                taken += 1;
                true
            } else {
                false
            }
        });
        view_models
    }

    /// Forget exemptions of view models no longer in the base.
    fn prune_exemptions(&self) {
        let base = self.base.view_models();
        self.exempt.write().retain(|vm| base.contains(vm));
    }

    fn inner_items(&self) -> Vec<Arc<V>> {
        self.base.view_models().items()
    }

    #[tracing::instrument(skip_all, target = "bindery::sync", level = "trace")]
    fn apply_limitation(&self) {
        if self.scope.is_disposed() {
            return;
        }
        let _perf = PerfSpan::new(span_names::LIMITATION);
        let _notifying = EditGuard::hold(&self.notifying);

        let desired = self.desired();
        let current = self.output.items();
        let same_len = desired.len() == current.len();
        if same_len && desired.iter().zip(&current).all(|(a, b)| a.same_item(b)) {
            return;
        }
        if same_len && desired.iter().all(|vm| current.iter().any(|c| c.same_item(vm))) {
            tracing::trace!(target: targets::SYNC, count = desired.len(), "limited view reordered");
            self.output.replace_range(0, desired);
        } else {
            tracing::trace!(target: targets::SYNC, count = desired.len(), "limited view reset");
            self.output.reset(desired);
        }
    }

    fn on_output_changed(&self, change: &CollectionChange<Arc<V>>) {
        let Some(_notifying) = EditGuard::try_begin(&self.notifying) else {
            return;
        };
        let base = self.base.view_models();
        match change {
            CollectionChange::Inserted { index, items } => {
                if self.is_limiting() {
                    base.extend(items.iter().cloned());
                } else {
                    base.insert_range((*index).min(base.len()), items.clone());
                }
            }
            CollectionChange::Removed { items, .. } => {
                self.exempt
                    .write()
                    .retain(|vm| !items.iter().any(|removed| removed.same_item(vm)));
                remove_items(&**base, items);
            }
            CollectionChange::Replaced { .. } | CollectionChange::Reset { .. } => {
                base.reset(self.output.items());
            }
        }
        self.apply_limitation();
    }
}
