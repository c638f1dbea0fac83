//! Core systems for Bindery.
//!
//! This crate provides the reactive primitives the model/view layer is built
//! from:
//!
//! - **Signal/Slot System**: Type-safe, ordered, synchronous notification
//! - **Change Notification**: [`ChangeNotifier`] with sender identity, dirty
//!   flag, event suppression and child forwarding
//! - **Observable Properties**: [`Property<T>`] field boxes that notify their owner
//! - **Observable Collections**: [`ObservableCollection<T>`] with structural
//!   change events
//! - **Disposal**: [`DisposableScope`] for idempotent two-phase teardown
//!
//! # Example
//!
//! ```
//! use bindery_core::{ChangeNotifier, Model, Notify, ObservableCollection, Property};
//! use std::sync::Arc;
//!
//! struct Team {
//!     notifier: ChangeNotifier,
//!     name: Property<String>,
//! }
//!
//! impl Notify for Team {
//!     fn notifier(&self) -> &ChangeNotifier {
//!         &self.notifier
//!     }
//! }
//!
//! impl Model for Team {}
//!
//! let teams = Arc::new(ObservableCollection::new());
//! let league = ChangeNotifier::new();
//! let _link = league.observe_collection("Teams", &teams);
//!
//! league.connect(|change| println!("league changed: {:?}", change.property()));
//! teams.push(Arc::new(Team {
//!     notifier: ChangeNotifier::new(),
//!     name: Property::new("Name", "Home".into()),
//! }));
//! ```

pub mod collection;
pub mod dispose;
mod error;
pub mod logging;
pub mod notifier;
pub mod property;
pub mod signal;

pub use collection::{CollectionChange, ItemIdentity, ObservableCollection};
pub use dispose::{Disposable, DisposableScope};
pub use error::{
    BinderyError, BindingError, ConversionDirection, LifecycleError, RegistryError, Result,
};
pub use logging::PerfSpan;
pub use notifier::{
    ChangeNotifier, ChildLink, CollectionLink, Model, Notify, NotifierId, PropertyChanged,
    WeakNotifier,
};
pub use property::Property;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
