//! Observable properties.
//!
//! A [`Property<T>`] is the field box used by every model and view model
//! property. Setting it compares the new value with the current one, assigns,
//! marks the owning [`ChangeNotifier`] as changed and raises the property's
//! name on it.
//!
//! # Example
//!
//! ```
//! use bindery_core::{ChangeNotifier, Notify, Property};
//!
//! struct Player {
//!     notifier: ChangeNotifier,
//!     name: Property<String>,
//! }
//!
//! impl Notify for Player {
//!     fn notifier(&self) -> &ChangeNotifier {
//!         &self.notifier
//!     }
//! }
//!
//! impl Player {
//!     fn set_name(&self, name: &str) -> bool {
//!         self.name.set(&self.notifier, name.to_string())
//!     }
//! }
//!
//! let player = Player {
//!     notifier: ChangeNotifier::new(),
//!     name: Property::new("Name", String::new()),
//! };
//! assert!(player.set_name("Messi"));
//! assert!(!player.set_name("Messi"));
//! assert!(player.notifier.is_changed());
//! ```

use std::fmt;

use parking_lot::RwLock;

use crate::notifier::ChangeNotifier;

/// A reactive property that raises its name on its owner when it changes.
///
/// # Thread Safety
///
/// `Property<T>` uses interior mutability with `RwLock` and is `Send + Sync`
/// when `T` is. The lock is released before the owner is notified, so
/// subscribers may read the property.
pub struct Property<T> {
    name: &'static str,
    value: RwLock<T>,
    check_equality: bool,
}

impl<T: Clone> Property<T> {
    /// Create a property that only notifies when the value actually changes.
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            value: RwLock::new(value),
            check_equality: true,
        }
    }

    /// Create a property that notifies on every set, even with an equal value.
    pub fn unchecked(name: &'static str, value: T) -> Self {
        Self {
            name,
            value: RwLock::new(value),
            check_equality: false,
        }
    }

    /// The name raised on the owner.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the current value.
    ///
    /// This clones the value. For large types, consider using `with()` instead.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Set the value without change notification.
    ///
    /// Used during construction, before anyone can observe the owner.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if a notification was raised.
    pub fn set(&self, owner: &ChangeNotifier, value: T) -> bool {
        self.replace(owner, value).is_some()
    }

    /// Set the value, returning the previous one if a notification was raised.
    pub fn replace(&self, owner: &ChangeNotifier, value: T) -> Option<T> {
        let old = {
            let mut current = self.value.write();
            if self.check_equality && *current == value {
                return None;
            }
            std::mem::replace(&mut *current, value)
        };
        owner.raise(self.name);
        Some(old)
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value", &self.get())
            .finish()
    }
}

static_assertions::assert_impl_all!(Property<String>: Send, Sync);
