//! Bindings between views and view models.
//!
//! A [`Binding`] ties the activation of some view-side behavior to the view
//! model currently assigned to it. The concrete behavior lives in a
//! [`BindingHooks`] implementation; `Binding` enforces the lifecycle:
//!
//! ```text
//! Unbound -> ViewBound -> (ViewModelBound <-> ViewModelUnbound) -> Disposed
//! ```
//!
//! - the first view model assignment calls `bind_view` once, then
//!   `bind_view_model`
//! - every later assignment calls `unbind_view_model` with the old view model
//!   and `bind_view_model` with the new one, including transitions to `None`
//! - `dispose` unbinds the view model and the view exactly once; later calls
//!   and later assignments are ignored
//!
//! A [`BindingContext`] owns several bindings, updates them in registration
//! order and disposes them together.
//!
//! # Key Types
//!
//! - [`PropertyBinding`] - Keeps one view value in sync with one view model property
//! - [`CommandBinding`] - Connects a view trigger to a view model command
//! - [`Accessor`] - Explicit getter/setter pair naming a property
//! - [`Converter`] - Value conversion between view model and view types

mod command;
pub mod converter;
mod property;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use bindery_core::Disposable;
use bindery_core::logging::targets;

pub use command::{CommandBinding, CommandSync};
pub use converter::{Converter, DisplayParseConverter, FnConverter, IdentityConverter};
pub use property::{Accessor, BindingMode, PropertyBinding, PropertySync, ViewSink};

/// The view-specific half of a binding.
///
/// `Binding` calls these in lifecycle order; implementations never need to
/// track whether the view was already bound.
pub trait BindingHooks<V: ?Sized>: Send + Sync + 'static {
    /// Attach to the view. Called once, on the first view model assignment.
    fn bind_view(&self) {}

    /// Detach from the view. Called once, on dispose.
    fn unbind_view(&self) {}

    /// Start reacting to `view_model`.
    fn bind_view_model(&self, view_model: Option<&Arc<V>>);

    /// Stop reacting to `view_model`.
    fn unbind_view_model(&self, view_model: Option<&Arc<V>>);
}

/// Object-safe view of a binding, as stored by [`BindingContext`].
pub trait Bind<V: ?Sized>: Send + Sync {
    /// Assign the view model. Ignored after dispose.
    fn set_view_model(&self, view_model: Option<Arc<V>>);

    fn view_model(&self) -> Option<Arc<V>>;

    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

struct BindingState<V: ?Sized> {
    view_model: Option<Arc<V>>,
    bound: bool,
    disposed: bool,
}

/// Lifecycle wrapper around a set of [`BindingHooks`].
///
/// The state lock is never held while hooks run, so hooks may read the
/// binding's view model.
pub struct Binding<V: ?Sized, H> {
    hooks: H,
    state: Mutex<BindingState<V>>,
}

impl<V, H> Binding<V, H>
where
    V: ?Sized + Send + Sync + 'static,
    H: BindingHooks<V>,
{
    pub fn new(hooks: H) -> Self {
        Self {
            hooks,
            state: Mutex::new(BindingState {
                view_model: None,
                bound: false,
                disposed: false,
            }),
        }
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// The currently assigned view model.
    pub fn view_model(&self) -> Option<Arc<V>> {
        self.state.lock().view_model.clone()
    }

    /// Whether the view side has been attached.
    pub fn is_view_bound(&self) -> bool {
        self.state.lock().bound
    }

    /// Assign a view model, rebinding as needed.
    pub fn set_view_model(&self, view_model: Option<Arc<V>>) {
        let (old, first) = {
            let mut state = self.state.lock();
            if state.disposed {
                tracing::warn!(target: targets::BINDING, "view model assigned to a disposed binding");
                return;
            }
            let first = !state.bound;
            state.bound = true;
            (std::mem::replace(&mut state.view_model, view_model.clone()), first)
        };

        if first {
            self.hooks.bind_view();
        } else {
            self.hooks.unbind_view_model(old.as_ref());
        }
        self.hooks.bind_view_model(view_model.as_ref());
    }

    /// Unbind everything. Calling it again is a no-op.
    pub fn dispose(&self) {
        let (old, bound) = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (state.view_model.take(), state.bound)
        };

        if bound {
            self.hooks.unbind_view_model(old.as_ref());
            self.hooks.unbind_view();
        }
        tracing::trace!(target: targets::BINDING, "binding disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

impl<V, H> Bind<V> for Binding<V, H>
where
    V: ?Sized + Send + Sync + 'static,
    H: BindingHooks<V>,
{
    fn set_view_model(&self, view_model: Option<Arc<V>>) {
        Binding::set_view_model(self, view_model);
    }

    fn view_model(&self) -> Option<Arc<V>> {
        Binding::view_model(self)
    }

    fn dispose(&self) {
        Binding::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        Binding::is_disposed(self)
    }
}

impl<V, H> Disposable for Binding<V, H>
where
    V: ?Sized + Send + Sync + 'static,
    H: BindingHooks<V>,
{
    fn dispose(&self) {
        Binding::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        Binding::is_disposed(self)
    }
}

impl<V: ?Sized, H> fmt::Debug for Binding<V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Binding")
            .field("has_view_model", &state.view_model.is_some())
            .field("bound", &state.bound)
            .field("disposed", &state.disposed)
            .finish()
    }
}

/// An ordered set of bindings sharing one view model.
///
/// # Example
///
/// ```
/// use bindery::binding::{Accessor, BindingContext, PropertyBinding, ViewSink};
/// use bindery_core::{ChangeNotifier, Notify, Property};
/// use std::sync::Arc;
///
/// struct Vm {
///     notifier: ChangeNotifier,
///     title: Property<String>,
/// }
///
/// impl Notify for Vm {
///     fn notifier(&self) -> &ChangeNotifier {
///         &self.notifier
///     }
/// }
///
/// let ctx = BindingContext::<Vm>::new();
/// ctx.add(PropertyBinding::one_way(
///     Accessor::read_only("Title", |vm: &Vm| vm.title.get()),
///     ViewSink::callback(|title| println!("title: {title}")),
/// ));
///
/// ctx.update_view_model(Some(Arc::new(Vm {
///     notifier: ChangeNotifier::new(),
///     title: Property::new("Title", "Match".into()),
/// })));
/// ctx.dispose();
/// ```
pub struct BindingContext<V: ?Sized> {
    bindings: Mutex<Vec<Arc<dyn Bind<V>>>>,
    disposed: AtomicBool,
}

impl<V: ?Sized + Send + Sync + 'static> Default for BindingContext<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: ?Sized + Send + Sync + 'static> BindingContext<V> {
    pub fn new() -> Self {
        Self {
            bindings: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Register a binding, returning a shared handle to it.
    ///
    /// Bindings added after dispose are disposed immediately.
    pub fn add<B: Bind<V> + 'static>(&self, binding: B) -> Arc<B> {
        let binding = Arc::new(binding);
        if self.is_disposed() {
            tracing::warn!(target: targets::BINDING, "binding added to a disposed context");
            binding.dispose();
        } else {
            self.bindings.lock().push(binding.clone());
        }
        binding
    }

    /// Assign `view_model` to every binding, in registration order.
    pub fn update_view_model(&self, view_model: Option<Arc<V>>) {
        let bindings = self.bindings.lock().clone();
        tracing::trace!(
            target: targets::BINDING,
            count = bindings.len(),
            has_view_model = view_model.is_some(),
            "updating binding context"
        );
        for binding in bindings {
            binding.set_view_model(view_model.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.lock().is_empty()
    }

    /// Dispose every binding in registration order and clear the set.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let bindings = std::mem::take(&mut *self.bindings.lock());
        for binding in bindings {
            binding.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl<V: ?Sized + Send + Sync + 'static> Disposable for BindingContext<V> {
    fn dispose(&self) {
        BindingContext::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        BindingContext::is_disposed(self)
    }
}

static_assertions::assert_impl_all!(BindingContext<dyn Send + Sync>: Send, Sync);
