//! Deterministic two-phase teardown.
//!
//! Stateful components register release actions on a [`DisposableScope`].
//! Disposing the scope runs the managed actions (subscriptions, owned
//! children) and then the unmanaged ones, each in registration order, each
//! exactly once. Disposing again does nothing.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::logging::targets;

type Action = Box<dyn FnOnce() + Send>;

/// Components with an idempotent `dispose`.
pub trait Disposable {
    /// Release everything the component holds. Calling it again is a no-op.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

/// A set of release actions run once, in two phases.
///
/// # Example
///
/// ```
/// use bindery_core::DisposableScope;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let released = Arc::new(AtomicUsize::new(0));
/// let scope = DisposableScope::new();
/// let counter = released.clone();
/// scope.on_dispose(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// assert!(scope.dispose());
/// assert!(!scope.dispose());
/// assert_eq!(released.load(Ordering::SeqCst), 1);
/// ```
pub struct DisposableScope {
    disposed: AtomicBool,
    managed: Mutex<Vec<Action>>,
    unmanaged: Mutex<Vec<Action>>,
}

impl Default for DisposableScope {
    fn default() -> Self {
        Self::new()
    }
}

impl DisposableScope {
    pub fn new() -> Self {
        Self {
            disposed: AtomicBool::new(false),
            managed: Mutex::new(Vec::new()),
            unmanaged: Mutex::new(Vec::new()),
        }
    }

    /// Register an action for the managed phase.
    ///
    /// If the scope is already disposed, the action runs immediately.
    pub fn on_dispose<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(&self.managed, Box::new(action));
    }

    /// Register an action for the unmanaged phase, which runs after every
    /// managed action.
    pub fn on_release<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(&self.unmanaged, Box::new(action));
    }

    /// Hold `value` until the scope is disposed, then drop it.
    pub fn keep<T: Send + 'static>(&self, value: T) {
        self.on_dispose(move || drop(value));
    }

    /// Run every registered action. Returns `true` only for the first call.
    pub fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::SeqCst) {
            tracing::trace!(target: targets::DISPOSE, "already disposed");
            return false;
        }
        let managed = std::mem::take(&mut *self.managed.lock());
        let unmanaged = std::mem::take(&mut *self.unmanaged.lock());
        tracing::debug!(
            target: targets::DISPOSE,
            managed = managed.len(),
            unmanaged = unmanaged.len(),
            "disposing scope"
        );
        for action in managed.into_iter().chain(unmanaged) {
            action();
        }
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn push(&self, phase: &Mutex<Vec<Action>>, action: Action) {
        if self.is_disposed() {
            action();
        } else {
            phase.lock().push(action);
        }
    }
}

impl Disposable for DisposableScope {
    fn dispose(&self) {
        DisposableScope::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        DisposableScope::is_disposed(self)
    }
}

impl fmt::Debug for DisposableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableScope")
            .field("disposed", &self.is_disposed())
            .field("managed", &self.managed.lock().len())
            .field("unmanaged", &self.unmanaged.lock().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(DisposableScope: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_phases_run_in_order() {
        let scope = DisposableScope::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (phase, name) in [(0, "release"), (1, "sub-a"), (1, "sub-b")] {
            let log = log.clone();
            if phase == 0 {
                scope.on_release(move || log.lock().push(name));
            } else {
                scope.on_dispose(move || log.lock().push(name));
            }
        }

        assert!(scope.dispose());
        assert_eq!(*log.lock(), vec!["sub-a", "sub-b", "release"]);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let scope = DisposableScope::new();
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        scope.on_dispose(move || *count_clone.lock() += 1);

        assert!(scope.dispose());
        assert!(!scope.dispose());
        assert!(scope.is_disposed());
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_late_registration_runs_immediately() {
        let scope = DisposableScope::new();
        scope.dispose();

        let ran = Arc::new(Mutex::new(false));
        let ran_clone = ran.clone();
        scope.on_dispose(move || *ran_clone.lock() = true);
        assert!(*ran.lock());
    }

    #[test]
    fn test_keep_drops_on_dispose() {
        let scope = DisposableScope::new();
        let value = Arc::new(());
        scope.keep(value.clone());
        assert_eq!(Arc::strong_count(&value), 2);
        scope.dispose();
        assert_eq!(Arc::strong_count(&value), 1);
    }
}
