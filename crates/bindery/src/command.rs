//! Commands exposed by view models.
//!
//! A [`Command`] is an action a view can trigger, together with whether it
//! can currently run. Executability comes either from a predicate supplied at
//! construction or from the [`Command::set_executable`] flag, never both.
//! Views follow changes through [`Command::can_execute_changed`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use bindery_core::logging::targets;
use bindery_core::{LifecycleError, Signal};

type Action = Box<dyn Fn() + Send + Sync>;
type Predicate = Box<dyn Fn() -> bool + Send + Sync>;

/// An executable action with change-notified executability.
///
/// # Example
///
/// ```
/// use bindery::Command;
///
/// let save = Command::new(|| println!("saving"));
/// assert!(save.can_execute());
/// assert!(save.execute());
///
/// save.set_executable(false).unwrap();
/// assert!(!save.execute());
/// ```
pub struct Command {
    action: Action,
    can_execute: Option<Predicate>,
    executable: AtomicBool,
    executing: AtomicBool,
    can_execute_changed: Arc<Signal<()>>,
    text: RwLock<Option<String>>,
    tooltip: RwLock<Option<String>>,
}

impl Command {
    /// A command that is executable until told otherwise.
    pub fn new<F>(action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(Box::new(action), None)
    }

    /// A command whose executability is decided by `can_execute`.
    ///
    /// Call [`Command::emit_can_execute_changed`] when the predicate's inputs
    /// change.
    pub fn with_predicate<F, P>(action: F, can_execute: P) -> Self
    where
        F: Fn() + Send + Sync + 'static,
        P: Fn() -> bool + Send + Sync + 'static,
    {
        Self::build(Box::new(action), Some(Box::new(can_execute)))
    }

    fn build(action: Action, can_execute: Option<Predicate>) -> Self {
        Self {
            action,
            can_execute,
            executable: AtomicBool::new(true),
            executing: AtomicBool::new(false),
            can_execute_changed: Arc::new(Signal::new()),
            text: RwLock::new(None),
            tooltip: RwLock::new(None),
        }
    }

    /// Set the label shown by views.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        *self.text.write() = Some(text.into());
        self
    }

    /// Set the tooltip shown by views.
    pub fn with_tooltip(self, tooltip: impl Into<String>) -> Self {
        *self.tooltip.write() = Some(tooltip.into());
        self
    }

    pub fn text(&self) -> Option<String> {
        self.text.read().clone()
    }

    pub fn tooltip(&self) -> Option<String> {
        self.tooltip.read().clone()
    }

    pub fn can_execute(&self) -> bool {
        match &self.can_execute {
            Some(predicate) => predicate(),
            None => self.executable.load(Ordering::SeqCst),
        }
    }

    /// Enable or disable a command created without a predicate.
    ///
    /// Emits `can_execute_changed` when the flag changes.
    pub fn set_executable(&self, executable: bool) -> Result<(), LifecycleError> {
        if self.can_execute.is_some() {
            return Err(LifecycleError::PredicateOwned);
        }
        if self.executable.swap(executable, Ordering::SeqCst) != executable {
            self.emit_can_execute_changed();
        }
        Ok(())
    }

    /// Signal emitted when `can_execute` may return a different value.
    pub fn can_execute_changed(&self) -> &Arc<Signal<()>> {
        &self.can_execute_changed
    }

    pub fn emit_can_execute_changed(&self) {
        self.can_execute_changed.emit(());
    }

    /// Run the action if the command can execute.
    ///
    /// Returns whether the action ran. A command triggered again from inside
    /// its own action is skipped.
    pub fn execute(&self) -> bool {
        if !self.can_execute() {
            tracing::debug!(target: targets::COMMAND, text = ?self.text(), "command not executable");
            return false;
        }
        if self.executing.swap(true, Ordering::SeqCst) {
            tracing::trace!(target: targets::COMMAND, "command already executing, skipped");
            return false;
        }
        (self.action)();
        self.executing.store(false, Ordering::SeqCst);
        true
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("text", &self.text())
            .field("has_predicate", &self.can_execute.is_some())
            .field("can_execute", &self.can_execute())
            .finish()
    }
}

static_assertions::assert_impl_all!(Command: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_execute_runs_action() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let cmd = Command::new(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(cmd.execute());
        assert!(cmd.execute());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_executable_flag_emits_on_change() {
        let cmd = Command::new(|| {});
        let emitted = Arc::new(AtomicUsize::new(0));
        let emitted_clone = emitted.clone();
        cmd.can_execute_changed().connect(move |_| {
            emitted_clone.fetch_add(1, Ordering::SeqCst);
        });

        cmd.set_executable(false).unwrap();
        cmd.set_executable(false).unwrap();
        assert!(!cmd.execute());
        cmd.set_executable(true).unwrap();

        assert_eq!(emitted.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_predicate_owns_executability() {
        let allowed = Arc::new(AtomicBool::new(false));
        let allowed_clone = allowed.clone();
        let cmd = Command::with_predicate(|| {}, move || allowed_clone.load(Ordering::SeqCst));

        assert!(!cmd.execute());
        allowed.store(true, Ordering::SeqCst);
        assert!(cmd.execute());
        assert_eq!(cmd.set_executable(true), Err(LifecycleError::PredicateOwned));
    }

    #[test]
    fn test_reentrant_execute_is_skipped() {
        let slot: Arc<Mutex<Option<Arc<Command>>>> = Arc::new(Mutex::new(None));
        let inner_results = Arc::new(Mutex::new(Vec::new()));

        let slot_clone = slot.clone();
        let results_clone = inner_results.clone();
        let cmd = Arc::new(Command::new(move || {
            let cmd = slot_clone.lock().clone();
            if let Some(cmd) = cmd {
                results_clone.lock().push(cmd.execute());
            }
        }));
        *slot.lock() = Some(cmd.clone());

        assert!(cmd.execute());
        assert_eq!(*inner_results.lock(), vec![false]);
        slot.lock().take();
    }

    #[test]
    fn test_metadata() {
        let cmd = Command::new(|| {}).with_text("Save").with_tooltip("Save the project");
        assert_eq!(cmd.text().as_deref(), Some("Save"));
        assert_eq!(cmd.tooltip().as_deref(), Some("Save the project"));
    }
}
