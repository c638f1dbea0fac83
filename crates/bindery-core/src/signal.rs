//! Signal/slot dispatch for Bindery.
//!
//! Every change notification in the workspace travels through a [`Signal`]:
//! property changes on a [`ChangeNotifier`](crate::ChangeNotifier), structural
//! changes on an [`ObservableCollection`](crate::ObservableCollection) and the
//! `can_execute_changed` of commands.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The signal type; slots receive `&Args`
//! - [`ConnectionId`] - Identifier returned when connecting a slot
//! - [`ConnectionGuard`] - RAII handle that disconnects when dropped
//!
//! # Delivery
//!
//! Emission is synchronous. The slot list is snapshot before dispatch, so a
//! slot may connect or disconnect slots (including itself) while the signal
//! is being delivered; such changes take effect on the next emission. Slots
//! are invoked in the order they were connected.
//!
//! # Example
//!
//! ```
//! use bindery_core::Signal;
//!
//! let text_changed = Signal::<String>::new();
//! let id = text_changed.connect(|text| println!("new text: {text}"));
//! text_changed.emit("hello".to_string());
//! text_changed.disconnect(id);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    /// The ID remains valid until the connection is explicitly disconnected or
    /// the signal is dropped.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// Internal storage for a single connection.
struct Connection<Args> {
    slot: Slot<Args>,
    /// Monotonic connection sequence, used to keep delivery in connect order
    /// even after slotmap slots are reused.
    order: u64,
}

/// A type-safe signal that can have multiple connected slots.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments.
///
/// # Thread Safety
///
/// `Signal<Args>` is `Send + Sync`. Bindery components still expect all
/// mutation to happen on one logical thread; the locks only protect the
/// connection table.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Connection<Args>>>,
    blocked: AtomicBool,
    next_order: AtomicU64,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
            next_order: AtomicU64::new(0),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let order = self.next_order.fetch_add(1, Ordering::Relaxed);
        let connection = Connection {
            slot: Arc::new(slot),
            order,
        };
        self.connections.lock().insert(connection)
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, calls to `emit()` will do nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots in connection order.
    ///
    /// The connection table is not locked while slots run.
    #[tracing::instrument(skip_all, target = "bindery_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let slots = self.snapshot();
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");
        for slot in slots {
            slot(&args);
        }
    }

    fn snapshot(&self) -> Vec<Slot<Args>> {
        let connections = self.connections.lock();
        let mut ordered: Vec<(u64, Slot<Args>)> = connections
            .values()
            .map(|conn| (conn.order, conn.slot.clone()))
            .collect();
        drop(connections);
        ordered.sort_unstable_by_key(|(order, _)| *order);
        ordered.into_iter().map(|(_, slot)| slot).collect()
    }
}

/// A connection guard that automatically disconnects when dropped.
///
/// Created via [`Signal::connect_scoped`]. The guard only holds a weak
/// reference, so it never keeps the signal alive; dropping it after the
/// signal is gone is a no-op.
///
/// # Example
///
/// ```
/// use bindery_core::Signal;
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
///
/// let signal = Arc::new(Signal::<i32>::new());
/// let counter = Arc::new(AtomicI32::new(0));
/// {
///     let counter_clone = counter.clone();
///     let _guard = signal.connect_scoped(move |&n| {
///         counter_clone.fetch_add(n, Ordering::SeqCst);
///     });
///     signal.emit(42);
/// }
/// signal.emit(43);
/// assert_eq!(counter.load(Ordering::SeqCst), 42);
/// ```
#[must_use = "dropping the guard disconnects the slot"]
pub struct ConnectionGuard<Args> {
    signal: Weak<Signal<Args>>,
    id: ConnectionId,
}

impl<Args> Signal<Args> {
    /// Connect a slot that is disconnected when the returned guard is dropped.
    pub fn connect_scoped<F>(self: &Arc<Self>, slot: F) -> ConnectionGuard<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard {
            signal: Arc::downgrade(self),
            id,
        }
    }
}

impl<Args> ConnectionGuard<Args> {
    /// The id of the guarded connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Disconnect now instead of on drop.
    pub fn disconnect(self) {
        drop(self);
    }
}

impl<Args> Drop for ConnectionGuard<Args> {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.upgrade() {
            signal.disconnect(self.id);
        }
    }
}

static_assertions::assert_impl_all!(Signal<i32>: Send, Sync);
static_assertions::assert_impl_all!(ConnectionGuard<i32>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_connect_emit() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(42);
        signal.emit(100);

        assert_eq!(*received.lock(), vec![42, 100]);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        let conn_id = signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(1);
        assert!(signal.disconnect(conn_id));
        assert!(!signal.disconnect(conn_id));
        signal.emit(2);

        assert_eq!(*received.lock(), vec![1]);
    }

    #[test]
    fn test_signal_blocked() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(1);
        signal.set_blocked(true);
        signal.emit(2);
        signal.set_blocked(false);
        signal.emit(3);

        assert_eq!(*received.lock(), vec![1, 3]);
    }

    #[test]
    fn test_delivery_follows_connect_order_after_slot_reuse() {
        let signal = Signal::<()>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let ids: Vec<_> = (0..3)
            .map(|n| {
                let order = order.clone();
                signal.connect(move |_| order.lock().push(n))
            })
            .collect();

        // Free the first slot so the next connection reuses it.
        signal.disconnect(ids[0]);
        let order_clone = order.clone();
        signal.connect(move |_| order_clone.lock().push(3));

        signal.emit(());
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_slot_may_disconnect_itself_during_emit() {
        let signal = Arc::new(Signal::<i32>::new());
        let calls = Arc::new(Mutex::new(0));
        let own_id: Arc<Mutex<Option<ConnectionId>>> = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&signal);
        let calls_clone = calls.clone();
        let own_id_clone = own_id.clone();
        let id = signal.connect(move |_| {
            *calls_clone.lock() += 1;
            if let (Some(signal), Some(id)) = (weak.upgrade(), *own_id_clone.lock()) {
                signal.disconnect(id);
            }
        });
        *own_id.lock() = Some(id);

        signal.emit(1);
        signal.emit(2);
        assert_eq!(*calls.lock(), 1);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_disconnect_all() {
        let signal = Signal::<()>::new();
        for _ in 0..5 {
            signal.connect(|_| {});
        }

        assert_eq!(signal.connection_count(), 5);
        signal.disconnect_all();
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_connection_guard() {
        let signal = Arc::new(Signal::<i32>::new());
        let received = Arc::new(Mutex::new(Vec::new()));

        {
            let received_clone = received.clone();
            let _guard = signal.connect_scoped(move |&value| {
                received_clone.lock().push(value);
            });
            signal.emit(1);
        }

        signal.emit(2);
        assert_eq!(*received.lock(), vec![1]);
    }

    #[test]
    fn test_connection_guard_outliving_signal() {
        let signal = Arc::new(Signal::<i32>::new());
        let guard = signal.connect_scoped(|_| {});
        drop(signal);
        drop(guard);
    }

    struct Watcher<T: ?Sized> {
        _guard: ConnectionGuard<Vec<Arc<T>>>,
    }

    #[test]
    fn test_guard_held_by_generic_owner() {
        let signal = Arc::new(Signal::<Vec<Arc<str>>>::new());
        let watcher: Watcher<str> = Watcher {
            _guard: signal.connect_scoped(|_| {}),
        };
        assert_eq!(signal.connection_count(), 1);
        drop(watcher);
        assert_eq!(signal.connection_count(), 0);
    }
}
