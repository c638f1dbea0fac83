//! Named component registries.
//!
//! A [`ComponentRegistry`] maps names to constructors of one capability (a
//! trait object type). Several components may be registered under the same
//! name; resolution picks by priority and builds a new instance on every
//! call.
//!
//! Registrations usually come from a metadata scan at startup, which produces
//! [`ComponentType`] descriptors listing the capabilities a type provides.
//! [`ComponentRegistry::register`] rejects descriptors lacking the
//! registry's capability. Code that knows the type statically can use
//! [`ComponentRegistry::register_with`] instead.
//!
//! # Example
//!
//! ```
//! use bindery::locator::{ComponentRegistry, ComponentType};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct Plain;
//! impl Greeter for Plain {
//!     fn greet(&self) -> String {
//!         "hello".into()
//!     }
//! }
//!
//! struct Fancy;
//! impl Greeter for Fancy {
//!     fn greet(&self) -> String {
//!         "greetings".into()
//!     }
//! }
//!
//! let registry = ComponentRegistry::<dyn Greeter>::new();
//! registry
//!     .register("greeter", &ComponentType::of::<Plain>().provides::<dyn Greeter>(|| Box::new(Plain)), 0)
//!     .unwrap();
//! registry
//!     .register("greeter", &ComponentType::of::<Fancy>().provides::<dyn Greeter>(|| Box::new(Fancy)), 10)
//!     .unwrap();
//!
//! assert_eq!(registry.resolve("greeter").unwrap().greet(), "greetings");
//! assert_eq!(registry.resolve_all("greeter").len(), 2);
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use bindery_core::RegistryError;
use bindery_core::logging::targets;

use crate::config::RegistryConfig;

type Constructor<T> = Arc<dyn Fn() -> Box<T> + Send + Sync>;

/// Describes a component type and the capabilities it can be built as.
pub struct ComponentType {
    type_id: TypeId,
    type_name: &'static str,
    capabilities: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ComponentType {
    /// A descriptor for `C` with no capabilities yet.
    pub fn of<C: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
            capabilities: HashMap::new(),
        }
    }

    /// Declare that the component can be built as a `T`.
    pub fn provides<T: ?Sized + 'static>(
        mut self,
        construct: impl Fn() -> Box<T> + Send + Sync + 'static,
    ) -> Self {
        let construct: Constructor<T> = Arc::new(construct);
        self.capabilities.insert(TypeId::of::<T>(), Box::new(construct));
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn provides_capability<T: ?Sized + 'static>(&self) -> bool {
        self.capabilities.contains_key(&TypeId::of::<T>())
    }

    fn constructor<T: ?Sized + 'static>(&self) -> Option<Constructor<T>> {
        self.capabilities
            .get(&TypeId::of::<T>())?
            .downcast_ref::<Constructor<T>>()
            .cloned()
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("type_name", &self.type_name)
            .field("capabilities", &self.capabilities.len())
            .finish()
    }
}

struct Registration<T: ?Sized> {
    name: String,
    type_name: &'static str,
    priority: i32,
    construct: Constructor<T>,
}

/// A name to constructor registry for components of capability `T`.
pub struct ComponentRegistry<T: ?Sized> {
    registrations: RwLock<Vec<Registration<T>>>,
    default_priority: i32,
}

impl<T: ?Sized + 'static> Default for ComponentRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + 'static> ComponentRegistry<T> {
    pub fn new() -> Self {
        Self::with_default_priority(0)
    }

    /// A registry whose [`register_default`](Self::register_default) uses
    /// `priority`.
    pub fn with_default_priority(priority: i32) -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            default_priority: priority,
        }
    }

    pub fn default_priority(&self) -> i32 {
        self.default_priority
    }

    /// Register `component` under `name`.
    ///
    /// Fails when the descriptor does not provide `T`.
    pub fn register(
        &self,
        name: impl Into<String>,
        component: &ComponentType,
        priority: i32,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let Some(construct) = component.constructor::<T>() else {
            tracing::warn!(
                target: targets::LOCATOR,
                name = %name,
                component = component.type_name,
                "registration rejected"
            );
            return Err(RegistryError::TypeMismatch {
                name,
                type_name: component.type_name,
                capability: type_name::<T>(),
            });
        };
        self.push(name, component.type_name, priority, construct);
        Ok(())
    }

    /// Register `component` with the registry's default priority.
    pub fn register_default(
        &self,
        name: impl Into<String>,
        component: &ComponentType,
    ) -> Result<(), RegistryError> {
        self.register(name, component, self.default_priority)
    }

    /// Register a constructor directly.
    pub fn register_with<F>(&self, name: impl Into<String>, priority: i32, construct: F)
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        self.push(name.into(), type_name::<F>(), priority, Arc::new(construct));
    }

    fn push(&self, name: String, type_name: &'static str, priority: i32, construct: Constructor<T>) {
        tracing::debug!(target: targets::LOCATOR, name = %name, component = type_name, priority, "registered");
        self.registrations.write().push(Registration {
            name,
            type_name,
            priority,
            construct,
        });
    }

    /// A new instance of the highest-priority registration for `name`.
    ///
    /// Among equal priorities the earliest registration wins.
    pub fn resolve(&self, name: &str) -> Option<Box<T>> {
        let construct = {
            let registrations = self.registrations.read();
            let mut best: Option<&Registration<T>> = None;
            for registration in registrations.iter().filter(|r| r.name == name) {
                if best.is_none_or(|b| registration.priority > b.priority) {
                    best = Some(registration);
                }
            }
            best.map(|r| r.construct.clone())
        };
        if construct.is_none() {
            tracing::trace!(target: targets::LOCATOR, name, "nothing registered");
        }
        construct.map(|construct| construct())
    }

    /// A new instance of every registration for `name`, by ascending
    /// priority.
    pub fn resolve_all(&self, name: &str) -> Vec<Box<T>> {
        let mut matches: Vec<(i32, Constructor<T>)> = self
            .registrations
            .read()
            .iter()
            .filter(|r| r.name == name)
            .map(|r| (r.priority, r.construct.clone()))
            .collect();
        matches.sort_by_key(|(priority, _)| *priority);
        matches.into_iter().map(|(_, construct)| construct()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registrations.read().iter().any(|r| r.name == name)
    }

    /// Number of registrations, all names included.
    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }
}

impl<T: ?Sized> fmt::Debug for ComponentRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<_> = self
            .registrations
            .read()
            .iter()
            .map(|r| (r.name.clone(), r.type_name, r.priority))
            .collect();
        f.debug_struct("ComponentRegistry")
            .field("capability", &type_name::<T>())
            .field("registrations", &entries)
            .finish()
    }
}

/// A component that displays a view model.
pub trait View: Send + Sync {
    /// Attach a view model, or detach with `None`.
    fn set_view_model(&self, view_model: Option<Arc<dyn Any + Send + Sync>>);
}

/// A component that drives view models in response to events.
pub trait Controller: Send + Sync {
    fn set_view_model(&self, view_model: Option<Arc<dyn Any + Send + Sync>>);

    fn start(&self) {}

    fn stop(&self) {}
}

pub type ViewLocator = ComponentRegistry<dyn View>;
pub type ControllerLocator = ComponentRegistry<dyn Controller>;

/// The application's registries, created once at startup and passed to
/// whoever needs to resolve components.
#[derive(Debug, Default)]
pub struct Locators {
    pub views: ViewLocator,
    pub controllers: ControllerLocator,
}

impl Locators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registries using the configured default priority.
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            views: ComponentRegistry::with_default_priority(config.default_priority),
            controllers: ComponentRegistry::with_default_priority(config.default_priority),
        }
    }
}

static_assertions::assert_impl_all!(ComponentRegistry<dyn View>: Send, Sync);
static_assertions::assert_impl_all!(Locators: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    trait Named: Send + Sync {
        fn name(&self) -> &'static str;
    }

    struct A;
    struct B;
    struct C;

    impl Named for A {
        fn name(&self) -> &'static str {
            "a"
        }
    }
    impl Named for B {
        fn name(&self) -> &'static str {
            "b"
        }
    }
    impl Named for C {
        fn name(&self) -> &'static str {
            "c"
        }
    }

    fn names(items: &[Box<dyn Named>]) -> Vec<&'static str> {
        items.iter().map(|i| i.name()).collect()
    }

    #[test]
    fn test_priority_and_ties() {
        let registry = ComponentRegistry::<dyn Named>::new();
        registry.register_with("x", 1, || Box::new(A));
        registry.register_with("x", 5, || Box::new(B));
        registry.register_with("x", 5, || Box::new(C));
        registry.register_with("y", 100, || Box::new(C));

        assert_eq!(registry.resolve("x").map(|c| c.name()), Some("b"));
        assert_eq!(names(&registry.resolve_all("x")), vec!["a", "b", "c"]);
        assert!(registry.resolve("z").is_none());
        assert!(registry.resolve_all("z").is_empty());
    }

    #[test]
    fn test_new_instance_per_resolution() {
        let registry = ComponentRegistry::<dyn Named>::new();
        let built = Arc::new(Mutex::new(0));
        let built_clone = built.clone();
        registry.register_with("x", 0, move || {
            *built_clone.lock() += 1;
            Box::new(A)
        });

        registry.resolve("x");
        registry.resolve("x");
        assert_eq!(*built.lock(), 2);
    }

    #[test]
    fn test_type_mismatch() {
        trait Other: Send + Sync {}
        impl Other for A {}

        let registry = ComponentRegistry::<dyn Named>::new();
        let component = ComponentType::of::<A>().provides::<dyn Other>(|| Box::new(A));
        let err = registry.register("x", &component, 0).unwrap_err();
        assert!(matches!(err, RegistryError::TypeMismatch { ref name, .. } if name == "x"));
        assert!(registry.is_empty());

        let component = component.provides::<dyn Named>(|| Box::new(A));
        registry.register_default("x", &component).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_locators_from_config() {
        let locators = Locators::from_config(&RegistryConfig { default_priority: 7 });
        assert_eq!(locators.views.default_priority(), 7);
        assert_eq!(locators.controllers.default_priority(), 7);
    }
}
