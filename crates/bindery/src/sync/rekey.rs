//! Synchronization for models whose key can change.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use bindery_core::logging::targets;
use bindery_core::{
    ChildLink, CollectionChange, ConnectionGuard, Disposable, Model, Notify, ObservableCollection,
    Result,
};

use super::{CollectionSynchronizer, ContentKey, Keyed, ViewModelFactory};
use crate::view_model::ViewModel;

type Links = Arc<Mutex<HashMap<usize, ChildLink>>>;

fn address<V: ?Sized>(view_model: &Arc<V>) -> usize {
    Arc::as_ptr(view_model).cast::<()>().addr()
}

/// A [`CollectionSynchronizer`] keyed by [`Keyed::key`] that follows key
/// changes.
///
/// Every view model is watched; when one of them notifies and its model's
/// current key is missing from the map, the stale entry is moved under the
/// new key. The view model collection itself does not change.
pub struct RekeyableCollectionSynchronizer<M: ?Sized + Keyed, V: ?Sized> {
    base: CollectionSynchronizer<M, V, ContentKey>,
    links: Links,
    structure: Mutex<Option<ConnectionGuard<CollectionChange<Arc<V>>>>>,
}

impl<M, V> RekeyableCollectionSynchronizer<M, V>
where
    M: ?Sized + Model + Keyed,
    V: ?Sized + ViewModel<Model = M>,
{
    pub fn new(factory: ViewModelFactory<V>) -> Self {
        let base: CollectionSynchronizer<M, V, ContentKey> =
            CollectionSynchronizer::with_key_policy(factory);
        let links: Links = Arc::new(Mutex::new(HashMap::new()));

        let weak_inner = Arc::downgrade(base.inner());
        let watch = {
            let links = links.clone();
            move |view_model: &Arc<V>| {
                let weak_vm = Arc::downgrade(view_model);
                let weak_inner = weak_inner.clone();
                let link = view_model.notifier().connect_scoped(move |_| {
                    let (Some(inner), Some(view_model)) = (weak_inner.upgrade(), weak_vm.upgrade())
                    else {
                        return;
                    };
                    inner.rekey(&view_model);
                });
                links.lock().insert(address(view_model), link);
            }
        };

        for view_model in base.view_models().items() {
            watch(&view_model);
        }

        let structure_links = links.clone();
        let structure = base.view_models().connect_scoped(move |change| match change {
            CollectionChange::Inserted { items, .. } => items.iter().for_each(&watch),
            CollectionChange::Removed { items, .. } => {
                let mut links = structure_links.lock();
                for view_model in items {
                    links.remove(&address(view_model));
                }
            }
            CollectionChange::Replaced { old, new, .. } | CollectionChange::Reset { old, new } => {
                {
                    let mut links = structure_links.lock();
                    for view_model in old {
                        links.remove(&address(view_model));
                    }
                }
                new.iter().for_each(&watch);
            }
        });

        Self {
            base,
            links,
            structure: Mutex::new(Some(structure)),
        }
    }

    /// The underlying synchronizer.
    pub fn base(&self) -> &CollectionSynchronizer<M, V, ContentKey> {
        &self.base
    }

    pub fn set_model(&self, model: Arc<ObservableCollection<Arc<M>>>) -> Result<()> {
        self.base.set_model(model)
    }

    pub fn view_models(&self) -> &Arc<ObservableCollection<Arc<V>>> {
        self.base.view_models()
    }

    pub fn view_model_for_key(&self, key: &M::Key) -> Option<Arc<V>> {
        self.base.view_model_for_key(key)
    }

    pub fn view_models_for_key(&self, key: &M::Key) -> Vec<Arc<V>> {
        self.base.view_models_for_key(key)
    }

    /// Number of watched view models.
    pub fn watched_count(&self) -> usize {
        self.links.lock().len()
    }

    /// Release every view model subscription and dispose the base. Idempotent.
    pub fn dispose(&self) {
        let structure = self.structure.lock().take();
        if structure.is_none() {
            return;
        }
        drop(structure);
        self.links.lock().clear();
        self.base.dispose();
        tracing::debug!(target: targets::SYNC, "rekeyable synchronizer disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.base.is_disposed()
    }
}

impl<M, V> Disposable for RekeyableCollectionSynchronizer<M, V>
where
    M: ?Sized + Model + Keyed,
    V: ?Sized + ViewModel<Model = M>,
{
    fn dispose(&self) {
        RekeyableCollectionSynchronizer::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        RekeyableCollectionSynchronizer::is_disposed(self)
    }
}

impl<M, V> fmt::Debug for RekeyableCollectionSynchronizer<M, V>
where
    M: ?Sized + Model + Keyed,
    V: ?Sized + ViewModel<Model = M>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RekeyableCollectionSynchronizer")
            .field("base", &self.base)
            .field("watched", &self.links.lock().len())
            .finish()
    }
}
