//! Logging facilities for Bindery.
//!
//! Bindery uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("bindery=debug,bindery_core=info")
//!         .init();
//! }
//! ```
//!
//! The constants in [`targets`] can be used in filter directives to select
//! a single subsystem.

/// Span names used throughout Bindery for tracing.
///
/// These constants can be used to filter traces for specific subsystems.
pub mod span_names {
    /// Signal emission span.
    pub const SIGNAL: &str = "bindery::signal";
    /// Collection rebuild span.
    pub const REBUILD: &str = "bindery::rebuild";
    /// Limitation pass span.
    pub const LIMITATION: &str = "bindery::limitation";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "bindery_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "bindery_core::signal";
    /// Change notification target.
    pub const NOTIFIER: &str = "bindery_core::notifier";
    /// Observable collection target.
    pub const COLLECTION: &str = "bindery_core::collection";
    /// Disposal target.
    pub const DISPOSE: &str = "bindery_core::dispose";
    /// Binding layer target.
    pub const BINDING: &str = "bindery::binding";
    /// View model target.
    pub const VIEW_MODEL: &str = "bindery::view_model";
    /// Collection synchronizer target.
    pub const SYNC: &str = "bindery::sync";
    /// Component locator target.
    pub const LOCATOR: &str = "bindery::locator";
    /// Command target.
    pub const COMMAND: &str = "bindery::command";
    /// Configuration target.
    pub const CONFIG: &str = "bindery::config";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Used to time rebuilds and limitation passes.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::debug_span!(target: "bindery::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// Macros for common tracing patterns.
///
/// These are thin wrappers around the `tracing` macros that log under the
/// calling module's path.
#[macro_export]
macro_rules! bindery_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: module_path!(), $($arg)*)
    };
}

#[macro_export]
macro_rules! bindery_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: module_path!(), $($arg)*)
    };
}

#[macro_export]
macro_rules! bindery_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: module_path!(), $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    struct TargetLog(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for TargetLog {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.0.lock().push(event.metadata().target().to_owned());
        }
    }

    #[test]
    fn test_perf_span() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let _span = PerfSpan::new("test_operation");
        crate::bindery_debug!(operation = "test_operation", "inside perf span");
    }

    #[test]
    fn test_targets_are_namespaced() {
        assert!(targets::SIGNAL.starts_with(targets::CORE));
        assert!(targets::SYNC.starts_with("bindery::"));
    }

    #[test]
    fn test_macros_log_under_caller_module() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(TargetLog(seen.clone()));
        tracing::subscriber::with_default(subscriber, || {
            crate::bindery_warn!(item = 3, "dropped");
        });
        assert_eq!(*seen.lock(), vec![module_path!().to_owned()]);
    }
}
