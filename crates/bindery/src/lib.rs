//! Bindery - model/view model synchronization for Rust.
//!
//! This crate builds the view model layer on top of the primitives in
//! [`bindery_core`]:
//!
//! - **Bindings**: [`binding::Binding`], [`binding::BindingContext`] and
//!   [`binding::PropertyBinding`] connect views to view model properties
//! - **View Models**: [`ViewModel`] and [`ViewModelBase`] wrap a model and
//!   forward its notifications
//! - **Collection Synchronization**: [`sync::CollectionSynchronizer`] keeps a
//!   model collection and a view model collection consistent, with limited and
//!   rekeyable variants
//! - **Hierarchies**: [`nested::HierarchicalViewModel`] exposes child view
//!   models of a model-held collection
//! - **Locators**: [`locator::ComponentRegistry`] resolves views and
//!   controllers by name and priority
//! - **Commands**: [`Command`] actions with executability tracking
//!
//! # Example
//!
//! ```
//! use bindery::prelude::*;
//! use std::sync::Arc;
//!
//! struct Song {
//!     notifier: ChangeNotifier,
//!     title: Property<String>,
//! }
//!
//! impl Notify for Song {
//!     fn notifier(&self) -> &ChangeNotifier {
//!         &self.notifier
//!     }
//! }
//!
//! impl Model for Song {}
//!
//! let songs = Arc::new(ObservableCollection::new());
//! let playlist: CollectionSynchronizer<Song, ViewModelBase<Song>> =
//!     CollectionSynchronizer::new(ViewModelFactory::new(|| Arc::new(ViewModelBase::new())));
//! playlist.set_model(songs.clone()).unwrap();
//!
//! let song = Arc::new(Song { notifier: ChangeNotifier::new(), title: Property::new("Title", "Intro".into()) });
//! songs.push(song.clone());
//!
//! let vm = playlist.view_model_for(&song).unwrap();
//! let title = PropertyBinding::one_way(
//!     Accessor::read_only("Title", |vm: &ViewModelBase<Song>| {
//!         vm.model().map(|s| s.title.get()).unwrap_or_default()
//!     }),
//!     ViewSink::callback(|title: String| println!("title: {title}")),
//! );
//! title.set_view_model(Some(vm));
//! song.title.set(&song.notifier, "Outro".into());
//! ```

pub mod binding;
pub mod command;
pub mod config;
pub mod locator;
pub mod nested;
pub mod prelude;
pub mod sync;
pub mod view_model;

pub use command::Command;
pub use config::{BinderyConfig, ConfigError, LimitationConfig, RegistryConfig};
pub use view_model::{ViewModel, ViewModelBase};

pub use bindery_core::{BinderyError, BindingError, LifecycleError, RegistryError, Result};
