//! Error types for Bindery.

/// A specialized Result type for Bindery operations.
pub type Result<T> = std::result::Result<T, BinderyError>;

/// The main error type for Bindery operations.
#[derive(Debug, thiserror::Error)]
pub enum BinderyError {
    /// A binding was configured in a way that can never work.
    #[error("Binding configuration error: {0}")]
    Binding(#[from] BindingError),

    /// A component registration was rejected.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A component was used out of its documented call order.
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// A lookup found no matching element.
    #[error("No element matches {what}")]
    ItemNotFound { what: String },
}

impl BinderyError {
    /// Create an item-not-found error.
    pub fn item_not_found(what: impl Into<String>) -> Self {
        Self::ItemNotFound { what: what.into() }
    }
}

/// Structurally invalid bindings, reported at construction time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    /// A two-way binding targets a member that has no setter.
    #[error("Property '{property}' is read-only and cannot be bound two-way")]
    ReadOnlyTarget { property: String },

    /// The converter cannot convert in a direction the binding needs.
    #[error("Converter for '{property}' cannot convert {direction}")]
    UnsupportedConversion {
        property: String,
        direction: ConversionDirection,
    },
}

/// Direction of a value conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionDirection {
    /// ViewModel value to View value.
    Forward,
    /// View value back to ViewModel value.
    Backward,
}

impl std::fmt::Display for ConversionDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
        }
    }
}

/// Component registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The registered type does not provide the registry's capability.
    #[error("Type '{type_name}' registered as '{name}' does not implement {capability}")]
    TypeMismatch {
        name: String,
        type_name: &'static str,
        capability: &'static str,
    },
}

/// Call-order violations that are not idempotent-safe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// An operation needs a model that has never been assigned.
    #[error("{operation} requires a model, but none has been set")]
    ModelNotSet { operation: &'static str },

    /// The component has already been disposed.
    #[error("{component} has been disposed")]
    Disposed { component: &'static str },

    /// The command's executability is driven by a predicate.
    #[error("Executable cannot be set on a command created with a can-execute predicate")]
    PredicateOwned,
}
