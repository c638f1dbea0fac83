//! Prelude module for Bindery.
//!
//! ```ignore
//! use bindery::prelude::*;
//! ```

// ============================================================================
// Core Primitives
// ============================================================================

pub use bindery_core::{
    ChangeNotifier, CollectionChange, Disposable, DisposableScope, Model, Notify,
    ObservableCollection, Property, PropertyChanged, Signal,
};

// ============================================================================
// Bindings
// ============================================================================

pub use crate::binding::{
    Accessor, Bind, Binding, BindingContext, BindingMode, CommandBinding, Converter,
    PropertyBinding, ViewSink,
};
pub use crate::command::Command;

// ============================================================================
// View Models and Synchronization
// ============================================================================

pub use crate::nested::HierarchicalViewModel;
pub use crate::sync::{
    CollectionSynchronizer, LimitedCollectionSynchronizer, RekeyableCollectionSynchronizer,
    ViewModelFactory,
};
pub use crate::view_model::{ViewModel, ViewModelBase};

// ============================================================================
// Errors
// ============================================================================

pub use bindery_core::{BinderyError, Result};
