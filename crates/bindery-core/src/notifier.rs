//! Change notification.
//!
//! A [`ChangeNotifier`] is the leaf primitive of Bindery: every model and view
//! model embeds one and exposes it through [`Notify`]. Notifications carry the
//! sender's [`NotifierId`] and an optional property name, where `None` means
//! "assume every property may have changed".
//!
//! # Dirty Flag
//!
//! Raising any notification sets [`ChangeNotifier::is_changed`], even when no
//! subscriber is attached or events are being ignored. The flag stays set
//! until cleared with [`ChangeNotifier::set_changed`].
//!
//! # Forwarding
//!
//! [`ChangeNotifier::connect_child`] re-raises every notification of a child
//! on the parent, keeping the child as sender. A forwarding guard stops a
//! notification from travelling around a parent/child cycle forever.
//! [`ChangeNotifier::observe_collection`] does the same for every element of
//! an [`ObservableCollection`] and additionally raises `Collection_<name>` on
//! structural changes.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::collection::{CollectionChange, ObservableCollection};
use crate::logging::targets;
use crate::signal::{ConnectionGuard, ConnectionId, Signal};

static NEXT_NOTIFIER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a notification sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotifierId(u64);

impl NotifierId {
    fn next() -> Self {
        Self(NEXT_NOTIFIER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NotifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A property change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChanged {
    /// The object whose property changed.
    pub sender: NotifierId,
    /// The property that changed, or `None` for all of them.
    pub property: Option<Cow<'static, str>>,
}

impl PropertyChanged {
    /// A notification for a single property.
    pub fn new(sender: NotifierId, property: impl Into<Cow<'static, str>>) -> Self {
        Self {
            sender,
            property: Some(property.into()),
        }
    }

    /// A notification meaning "every property changed".
    pub fn all(sender: NotifierId) -> Self {
        Self {
            sender,
            property: None,
        }
    }

    /// The property name, if the notification names one.
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    /// Whether this notification may concern `name`.
    ///
    /// Notifications without a property name affect every property.
    pub fn affects(&self, name: &str) -> bool {
        self.property().is_none_or(|p| p == name)
    }

    /// Whether a consumer interested in `name` raised by `expected_sender`
    /// needs to refresh.
    ///
    /// Passing `None` as the expected sender accepts any sender.
    pub fn needs_sync(&self, name: &str, expected_sender: Option<NotifierId>) -> bool {
        self.affects(name) && expected_sender.is_none_or(|s| s == self.sender)
    }
}

struct NotifierInner {
    id: NotifierId,
    changed: AtomicBool,
    ignore_events: AtomicBool,
    forwarding: AtomicBool,
    disposed: AtomicBool,
    signal: Arc<Signal<PropertyChanged>>,
}

/// The change-notification handle embedded in every observable object.
///
/// Cloning produces another handle to the same notifier; clones share the id,
/// the dirty flag and the subscribers.
///
/// # Example
///
/// ```
/// use bindery_core::ChangeNotifier;
///
/// let notifier = ChangeNotifier::new();
/// notifier.connect(|change| println!("{:?} changed", change.property()));
/// notifier.raise("name");
/// assert!(notifier.is_changed());
/// ```
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                id: NotifierId::next(),
                changed: AtomicBool::new(false),
                ignore_events: AtomicBool::new(false),
                forwarding: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                signal: Arc::new(Signal::new()),
            }),
        }
    }

    /// The sender identity used in notifications raised by this notifier.
    pub fn id(&self) -> NotifierId {
        self.inner.id
    }

    /// Whether any notification was raised since the flag was last cleared.
    pub fn is_changed(&self) -> bool {
        self.inner.changed.load(Ordering::SeqCst)
    }

    pub fn set_changed(&self, changed: bool) {
        self.inner.changed.store(changed, Ordering::SeqCst);
    }

    /// Whether notifications are currently suppressed.
    pub fn ignores_events(&self) -> bool {
        self.inner.ignore_events.load(Ordering::SeqCst)
    }

    /// Suppress or resume notifications.
    ///
    /// While suppressed, raising still marks the notifier as changed.
    pub fn set_ignore_events(&self, ignore: bool) {
        self.inner.ignore_events.store(ignore, Ordering::SeqCst);
    }

    /// Raise a change of `property` with this notifier as sender.
    pub fn raise(&self, property: impl Into<Cow<'static, str>>) {
        self.raise_event(PropertyChanged::new(self.id(), property));
    }

    /// Raise the "all properties changed" notification.
    pub fn notify_all(&self) {
        self.raise_event(PropertyChanged::all(self.id()));
    }

    /// Raise an already built notification, whatever its sender.
    pub fn raise_event(&self, event: PropertyChanged) {
        self.set_changed(true);
        if self.is_disposed() {
            tracing::trace!(target: targets::NOTIFIER, id = %self.id(), "disposed, not raising");
            return;
        }
        if self.ignores_events() {
            return;
        }
        self.inner.signal.emit(event);
    }

    /// Re-raise a notification received from another object.
    ///
    /// Notifications arriving while this notifier is already forwarding are
    /// dropped.
    pub fn forward(&self, event: &PropertyChanged) {
        if self.inner.forwarding.swap(true, Ordering::SeqCst) {
            crate::bindery_trace!(id = %self.id(), "forwarding cycle, dropped");
            return;
        }
        self.raise_event(event.clone());
        self.inner.forwarding.store(false, Ordering::SeqCst);
    }

    /// Subscribe to notifications.
    pub fn connect<F>(&self, handler: F) -> ConnectionId
    where
        F: Fn(&PropertyChanged) + Send + Sync + 'static,
    {
        self.inner.signal.connect(handler)
    }

    /// Subscribe until the returned guard is dropped.
    pub fn connect_scoped<F>(&self, handler: F) -> ConnectionGuard<PropertyChanged>
    where
        F: Fn(&PropertyChanged) + Send + Sync + 'static,
    {
        self.inner.signal.connect_scoped(handler)
    }

    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.inner.signal.disconnect(id)
    }

    /// Number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.signal.connection_count()
    }

    /// Stop notifying and drop every subscriber. Idempotent.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            self.inner.signal.disconnect_all();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// A handle that does not keep the notifier alive.
    pub fn downgrade(&self) -> WeakNotifier {
        WeakNotifier {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same notifier.
    pub fn ptr_eq(&self, other: &ChangeNotifier) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Forward every notification of `child` through this notifier.
    ///
    /// Forwarding stops when the returned link is dropped.
    pub fn connect_child(&self, child: &ChangeNotifier) -> ChildLink {
        let parent = self.downgrade();
        child.connect_scoped(move |event| {
            if let Some(parent) = parent.upgrade() {
                parent.forward(event);
            }
        })
    }

    /// Observe a collection of notifying elements.
    ///
    /// Element notifications are forwarded with their original sender, and
    /// each structural change raises `Collection_<name>`. Element
    /// subscriptions follow the collection's contents until the returned link
    /// is dropped.
    pub fn observe_collection<T>(
        &self,
        name: &str,
        collection: &Arc<ObservableCollection<T>>,
    ) -> CollectionLink
    where
        T: Notify + Clone,
    {
        let property: Cow<'static, str> = Cow::Owned(format!("Collection_{name}"));
        let children: Arc<Mutex<Vec<ChildLink>>> = Arc::new(Mutex::new(
            collection
                .items()
                .iter()
                .map(|item| self.connect_child(item.notifier()))
                .collect(),
        ));

        let parent = self.downgrade();
        let links = children.clone();
        let structure = collection.connect_scoped(move |change| {
            let Some(parent) = parent.upgrade() else {
                return;
            };
            {
                let mut links = links.lock();
                match change {
                    CollectionChange::Inserted { index, items } => {
                        let at = (*index).min(links.len());
                        let new_links = items.iter().map(|item| parent.connect_child(item.notifier()));
                        drop(links.splice(at..at, new_links));
                    }
                    CollectionChange::Removed { index, items } => {
                        let end = (*index + items.len()).min(links.len());
                        drop(links.drain((*index).min(end)..end));
                    }
                    CollectionChange::Replaced { index, new, .. } => {
                        let end = (*index + new.len()).min(links.len());
                        let new_links = new.iter().map(|item| parent.connect_child(item.notifier()));
                        drop(links.splice((*index).min(end)..end, new_links));
                    }
                    CollectionChange::Reset { new, .. } => {
                        *links = new
                            .iter()
                            .map(|item| parent.connect_child(item.notifier()))
                            .collect();
                    }
                }
            }
            parent.raise(property.clone());
        });

        CollectionLink {
            _structure: Box::new(structure),
            _children: children,
        }
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("id", &self.id())
            .field("changed", &self.is_changed())
            .field("ignore_events", &self.ignores_events())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A non-owning handle to a [`ChangeNotifier`].
#[derive(Clone)]
pub struct WeakNotifier {
    inner: Weak<NotifierInner>,
}

impl WeakNotifier {
    pub fn upgrade(&self) -> Option<ChangeNotifier> {
        self.inner.upgrade().map(|inner| ChangeNotifier { inner })
    }
}

/// Forwarding from a child notifier; dropping it stops forwarding.
pub type ChildLink = ConnectionGuard<PropertyChanged>;

/// Subscriptions created by [`ChangeNotifier::observe_collection`].
#[must_use = "dropping the link stops observing the collection"]
pub struct CollectionLink {
    _structure: Box<dyn Send + Sync>,
    _children: Arc<Mutex<Vec<ChildLink>>>,
}

impl fmt::Debug for CollectionLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionLink")
            .field("children", &self._children.lock().len())
            .finish()
    }
}

/// Objects that raise change notifications.
pub trait Notify: Send + Sync + 'static {
    fn notifier(&self) -> &ChangeNotifier;

    /// Shorthand for `self.notifier().id()`.
    fn notifier_id(&self) -> NotifierId {
        self.notifier().id()
    }
}

impl Notify for ChangeNotifier {
    fn notifier(&self) -> &ChangeNotifier {
        self
    }
}

impl<T: ?Sized + Notify> Notify for Arc<T> {
    fn notifier(&self) -> &ChangeNotifier {
        (**self).notifier()
    }
}

/// Domain models.
///
/// `type_lineage` lists the model's runtime type followed by the model types
/// it specializes, most specific first. View model factories use it to pick
/// the closest registered view model type. The default describes a model with
/// no declared supertypes.
pub trait Model: Notify {
    fn type_lineage(&self) -> Vec<TypeId> {
        vec![TypeId::of::<Self>()]
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

static_assertions::assert_impl_all!(ChangeNotifier: Send, Sync);
static_assertions::assert_impl_all!(CollectionLink: Send, Sync);
