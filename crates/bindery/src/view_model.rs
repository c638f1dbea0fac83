//! View models.
//!
//! A [`ViewModel`] wraps at most one model and exposes view-shaped properties
//! and commands. [`ViewModelBase`] provides the common part: it holds the
//! model, forwards the model's notifications and offers [`ViewModelBase::sync`]
//! to force every binding to refresh.
//!
//! # Sender Correction
//!
//! Notifications raised by the model itself, or by an object declared as one
//! of its children with [`ViewModelBase::declare_child`], are re-raised with
//! the view model as sender. Anything else travelling through the model keeps
//! its original sender.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use bindery_core::logging::targets;
use bindery_core::{
    ChangeNotifier, ChildLink, Disposable, Notify, NotifierId, PropertyChanged,
};

/// A presentation wrapper around one model.
///
/// Implementations must be constructible without a model; synchronizers
/// create them first and assign the model afterwards.
pub trait ViewModel: Notify {
    type Model: ?Sized + Notify;

    /// The wrapped model, if one was assigned.
    fn model(&self) -> Option<Arc<Self::Model>>;

    /// Replace the wrapped model.
    fn set_model(&self, model: Option<Arc<Self::Model>>);

    /// Upcast used to recover the concrete view model type.
    fn as_any(&self) -> &dyn Any;
}

/// Shared state and behavior of view models.
///
/// # Example
///
/// ```
/// use bindery::ViewModelBase;
/// use bindery_core::{ChangeNotifier, Notify, Property};
/// use std::sync::Arc;
///
/// struct Player {
///     notifier: ChangeNotifier,
///     name: Property<String>,
/// }
///
/// impl Notify for Player {
///     fn notifier(&self) -> &ChangeNotifier {
///         &self.notifier
///     }
/// }
///
/// let player = Arc::new(Player { notifier: ChangeNotifier::new(), name: Property::new("Name", "Ann".into()) });
/// let vm = ViewModelBase::<Player>::new();
/// vm.set_model(Some(player.clone()));
///
/// vm.notifier().connect(|change| println!("{:?}", change.property()));
/// player.name.set(&player.notifier, "Bea".into());
/// ```
pub struct ViewModelBase<M: ?Sized> {
    notifier: ChangeNotifier,
    model: RwLock<Option<Arc<M>>>,
    model_link: Mutex<Option<ChildLink>>,
    children: Arc<RwLock<HashSet<NotifierId>>>,
}

impl<M: ?Sized + Notify> Default for ViewModelBase<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ?Sized + Notify> ViewModelBase<M> {
    pub fn new() -> Self {
        Self {
            notifier: ChangeNotifier::new(),
            model: RwLock::new(None),
            model_link: Mutex::new(None),
            children: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Create a view model already wrapping `model`.
    pub fn with_model(model: Arc<M>) -> Self {
        let vm = Self::new();
        vm.set_model(Some(model));
        vm
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn model(&self) -> Option<Arc<M>> {
        self.model.read().clone()
    }

    /// Replace the model, move the forwarding subscription to it and sync.
    pub fn set_model(&self, model: Option<Arc<M>>) {
        let link = model.as_ref().map(|model| self.forward_from(model.notifier()));
        let old_link = std::mem::replace(&mut *self.model_link.lock(), link);
        drop(old_link);
        *self.model.write() = model;
        self.sync();
    }

    /// Force every consumer to refresh by raising "all properties changed".
    pub fn sync(&self) {
        tracing::trace!(target: targets::VIEW_MODEL, id = %self.notifier.id(), "sync");
        self.notifier.notify_all();
    }

    /// Re-raise notifications from `child` with this view model as sender.
    ///
    /// Declare model-owned objects whose changes should look like changes of
    /// the view model itself.
    pub fn declare_child(&self, child: NotifierId) {
        self.children.write().insert(child);
    }

    pub fn remove_child(&self, child: NotifierId) -> bool {
        self.children.write().remove(&child)
    }

    fn forward_from(&self, model: &ChangeNotifier) -> ChildLink {
        let owner = self.notifier.downgrade();
        let model_id = model.id();
        let children = self.children.clone();
        model.connect_scoped(move |event| {
            let Some(owner) = owner.upgrade() else {
                return;
            };
            if event.sender == model_id || children.read().contains(&event.sender) {
                owner.forward(&PropertyChanged {
                    sender: owner.id(),
                    property: event.property.clone(),
                });
            } else {
                owner.forward(event);
            }
        })
    }

    /// Drop the model subscription and silence the notifier. Idempotent.
    pub fn dispose(&self) {
        let link = self.model_link.lock().take();
        drop(link);
        self.notifier.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.notifier.is_disposed()
    }
}

impl<M: ?Sized + Notify> Notify for ViewModelBase<M> {
    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl<M: ?Sized + Notify> ViewModel for ViewModelBase<M> {
    type Model = M;

    fn model(&self) -> Option<Arc<M>> {
        ViewModelBase::model(self)
    }

    fn set_model(&self, model: Option<Arc<M>>) {
        ViewModelBase::set_model(self, model);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<M: ?Sized + Notify> Disposable for ViewModelBase<M> {
    fn dispose(&self) {
        ViewModelBase::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        ViewModelBase::is_disposed(self)
    }
}

impl<M: ?Sized> fmt::Debug for ViewModelBase<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModelBase")
            .field("notifier", &self.notifier)
            .field("has_model", &self.model.read().is_some())
            .field("children", &self.children.read().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(ViewModelBase<ChangeNotifier>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::Property;

    struct Player {
        notifier: ChangeNotifier,
        name: Property<String>,
        team: ChangeNotifier,
        _team_link: ChildLink,
    }

    impl Notify for Player {
        fn notifier(&self) -> &ChangeNotifier {
            &self.notifier
        }
    }

    fn player() -> Arc<Player> {
        let notifier = ChangeNotifier::new();
        let team = ChangeNotifier::new();
        let link = notifier.connect_child(&team);
        Arc::new(Player {
            notifier,
            name: Property::new("Name", String::new()),
            team,
            _team_link: link,
        })
    }

    fn recorder(notifier: &ChangeNotifier) -> Arc<Mutex<Vec<PropertyChanged>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        notifier.connect(move |e| events_clone.lock().push(e.clone()));
        events
    }

    #[test]
    fn test_set_model_syncs() {
        let vm = ViewModelBase::<Player>::new();
        let events = recorder(vm.notifier());

        vm.set_model(Some(player()));

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], PropertyChanged::all(vm.notifier().id()));
        assert!(vm.notifier().is_changed());
    }

    #[test]
    fn test_model_changes_use_view_model_as_sender() {
        let model = player();
        let vm = ViewModelBase::with_model(model.clone());
        let events = recorder(vm.notifier());

        model.name.set(&model.notifier, "Ann".into());

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sender, vm.notifier().id());
        assert_eq!(events[0].property(), Some("Name"));
    }

    #[test]
    fn test_undeclared_child_keeps_sender() {
        let model = player();
        let vm = ViewModelBase::with_model(model.clone());
        let events = recorder(vm.notifier());

        model.team.raise("Color");
        vm.declare_child(model.team.id());
        model.team.raise("Color");

        let senders: Vec<_> = events.lock().iter().map(|e| e.sender).collect();
        assert_eq!(senders, vec![model.team.id(), vm.notifier().id()]);
    }

    #[test]
    fn test_replacing_model_disconnects_old() {
        let first = player();
        let second = player();
        let vm = ViewModelBase::with_model(first.clone());
        vm.set_model(Some(second.clone()));
        let events = recorder(vm.notifier());

        first.name.set(&first.notifier, "old".into());
        assert!(events.lock().is_empty());
        assert_eq!(first.notifier.subscriber_count(), 0);

        vm.set_model(None);
        assert!(vm.model().is_none());
        assert_eq!(second.notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_dispose() {
        let model = player();
        let vm = ViewModelBase::with_model(model.clone());
        vm.dispose();
        vm.dispose();
        assert!(vm.is_disposed());
        assert_eq!(model.notifier.subscriber_count(), 0);
    }
}
