//! Map keys for model-to-view-model lookup.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// How a synchronizer keys its model-to-view-model map.
pub trait KeyPolicy<M: ?Sized>: Send + Sync + 'static {
    type Key: Eq + Hash + Clone + Debug + Send + Sync + 'static;

    fn key(model: &Arc<M>) -> Self::Key;
}

/// Keys models by the address of their shared allocation.
///
/// Two equal but distinct models get different view models.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityKey;

impl<M: ?Sized> KeyPolicy<M> for IdentityKey {
    type Key = usize;

    fn key(model: &Arc<M>) -> usize {
        Arc::as_ptr(model).cast::<()>().addr()
    }
}

/// Models that carry their own lookup key.
///
/// The key may depend on mutable state; use a
/// [`RekeyableCollectionSynchronizer`](super::RekeyableCollectionSynchronizer)
/// when it can change after the model was added.
pub trait Keyed {
    type Key: Eq + Hash + Clone + Debug + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

/// Keys models by [`Keyed::key`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentKey;

impl<M: ?Sized + Keyed> KeyPolicy<M> for ContentKey {
    type Key = M::Key;

    fn key(model: &Arc<M>) -> M::Key {
        model.as_ref().key()
    }
}
