//! Command bindings.
//!
//! A [`CommandBinding`] connects a view trigger (a button, a menu entry) to a
//! command selected from the view model. While a view model is bound, the
//! view's sensitivity follows the command's `can_execute`; once the view model
//! is removed, activating the view does nothing and executability changes are
//! no longer reported.

use std::sync::Arc;

use parking_lot::Mutex;

use bindery_core::ConnectionGuard;
use bindery_core::logging::targets;

use super::{Binding, BindingHooks};
use crate::command::Command;

type CommandSelector<V> = Arc<dyn Fn(&V) -> Arc<Command> + Send + Sync>;

struct BoundCommand {
    command: Arc<Command>,
    _subscription: ConnectionGuard<()>,
}

/// The hooks of a [`CommandBinding`].
pub struct CommandSync<V: ?Sized> {
    select: CommandSelector<V>,
    set_sensitive: Arc<dyn Fn(bool) + Send + Sync>,
    current: Mutex<Option<BoundCommand>>,
}

impl<V: ?Sized + Send + Sync + 'static> BindingHooks<V> for CommandSync<V> {
    fn bind_view_model(&self, view_model: Option<&Arc<V>>) {
        let Some(view_model) = view_model else {
            return;
        };
        let command = (self.select)(view_model);

        let weak = Arc::downgrade(&command);
        let set_sensitive = self.set_sensitive.clone();
        let subscription = command.can_execute_changed().connect_scoped(move |_| {
            if let Some(command) = weak.upgrade() {
                set_sensitive(command.can_execute());
            }
        });
        (self.set_sensitive)(command.can_execute());

        *self.current.lock() = Some(BoundCommand {
            command,
            _subscription: subscription,
        });
    }

    fn unbind_view_model(&self, _view_model: Option<&Arc<V>>) {
        let current = self.current.lock().take();
        drop(current);
    }
}

/// A binding between a view trigger and a view model command.
///
/// # Example
///
/// ```
/// use bindery::Command;
/// use bindery::binding::CommandBinding;
/// use std::sync::Arc;
///
/// struct Vm {
///     save: Arc<Command>,
/// }
///
/// let binding = CommandBinding::for_command(|vm: &Vm| vm.save.clone(), |sensitive| {
///     println!("save button sensitive: {sensitive}");
/// });
/// binding.set_view_model(Some(Arc::new(Vm { save: Arc::new(Command::new(|| {})) })));
/// assert!(binding.activate());
/// ```
pub type CommandBinding<V> = Binding<V, CommandSync<V>>;

impl<V: ?Sized + Send + Sync + 'static> Binding<V, CommandSync<V>> {
    /// Bind the command chosen by `select` to a view whose sensitivity is set
    /// through `set_sensitive`.
    pub fn for_command<S, F>(select: S, set_sensitive: F) -> Self
    where
        S: Fn(&V) -> Arc<Command> + Send + Sync + 'static,
        F: Fn(bool) + Send + Sync + 'static,
    {
        Binding::new(CommandSync {
            select: Arc::new(select),
            set_sensitive: Arc::new(set_sensitive),
            current: Mutex::new(None),
        })
    }

    /// Trigger the bound command, as the view does when it is activated.
    ///
    /// Returns whether the command ran.
    pub fn activate(&self) -> bool {
        let command = self
            .hooks()
            .current
            .lock()
            .as_ref()
            .map(|bound| bound.command.clone());
        match command {
            Some(command) => command.execute(),
            None => {
                tracing::trace!(target: targets::BINDING, "activated without a view model");
                false
            }
        }
    }
}
