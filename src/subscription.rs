//! # Subscription: one registered interest in a named event.
//!
//! A [`Subscription`] is the handle returned by [`Bus::subscribe`](crate::Bus::subscribe).
//! It identifies one entry in the bus's ordered sequence and carries:
//! - the event name it matches (immutable),
//! - an ordered list of callbacks (extendable via [`Subscription::add_callback`]),
//! - a single-fire flag set by [`Bus::subscribe_once`](crate::Bus::subscribe_once),
//! - a weak back-reference to the owning bus, used only by [`Subscription::remove`].
//!
//! ## Lifecycle
//! A subscription has exactly two states: *registered* (present in the bus's
//! sequence) and *removed* (absent). The transition is one-directional; there is
//! no way to re-register a removed subscription. Callers create a new one instead.
//!
//! ## Rules
//! - Callbacks run synchronously, in insertion order, on the dispatching stack.
//! - [`Subscription::fire`] snapshots the callback list before invoking anything,
//!   so a callback may call [`Subscription::add_callback`] on its own
//!   subscription without deadlocking.
//! - A removed subscription is simply never fired again; holding the handle
//!   after removal is harmless.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::bus::Core;

/// Callback invoked when a matching event is dispatched.
///
/// Receives `Some(&value)` when the event carried a payload and `None` when it
/// was dispatched without one.
pub type Callback<T> = Arc<dyn Fn(Option<&T>) + Send + Sync + 'static>;

/// Shared listener record, stored by the bus and referenced by the handle.
///
/// Identity matters: the bus compares entries by `Arc::ptr_eq`, so one record
/// appears at most once in the sequence and is never shared by two buses.
pub(crate) struct Record<T: Send + Sync + 'static> {
    pub(crate) id: u64,
    pub(crate) name: Arc<str>,
    /// Single-fire flag: the bus removes the record after its first matching dispatch.
    pub(crate) once: bool,
    callbacks: Mutex<Vec<Callback<T>>>,
}

impl<T: Send + Sync + 'static> Record<T> {
    pub(crate) fn new(id: u64, name: &str, once: bool, callback: Callback<T>) -> Self {
        Self {
            id,
            name: Arc::from(name),
            once,
            callbacks: Mutex::new(vec![callback]),
        }
    }

    pub(crate) fn push_callback(&self, callback: Callback<T>) {
        self.callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(callback);
    }

    /// Invokes every stored callback in insertion order.
    ///
    /// The list is snapshotted first and the lock released, so callbacks may
    /// append to this record re-entrantly. Panics are not caught; they
    /// propagate to the caller.
    pub(crate) fn fire(&self, value: Option<&T>) {
        let snapshot: Vec<Callback<T>> = self
            .callbacks
            .lock()
            // No lock is held while callbacks run, so poisoning cannot occur
            // on the dispatch path; recover anyway.
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for callback in snapshot {
            callback(value);
        }
    }
}

/// Handle to one registered interest in a named event.
///
/// Returned by [`Bus::subscribe`](crate::Bus::subscribe) and
/// [`Bus::subscribe_once`](crate::Bus::subscribe_once). Cloning the handle does
/// not duplicate the registration; all clones refer to the same entry.
///
/// # Example
/// ```rust
/// use evbus::Bus;
///
/// let bus: Bus<u32> = Bus::new();
/// let sub = bus.subscribe("tick", |_value| {});
/// assert_eq!(sub.name(), "tick");
/// assert!(sub.remove());
/// assert!(!sub.remove()); // already gone
/// ```
pub struct Subscription<T: Send + Sync + 'static> {
    pub(crate) record: Arc<Record<T>>,
    pub(crate) bus: Weak<Core<T>>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    /// Returns the event name this subscription matches.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Returns the bus-local identifier, stable for the life of the subscription.
    ///
    /// Intended for logs and debugging; removal uses identity, not this id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.record.id
    }

    /// Appends another callback, invoked whenever this subscription fires.
    ///
    /// Callbacks run in the order they were added, after the one supplied at
    /// subscription time.
    pub fn add_callback(&self, callback: impl Fn(Option<&T>) + Send + Sync + 'static) {
        self.record.push_callback(Arc::new(callback));
    }

    /// Removes this subscription from its owning bus.
    ///
    /// Returns `true` if the entry was present and removed, `false` if it was
    /// already removed or the bus no longer exists.
    pub fn remove(&self) -> bool {
        match self.bus.upgrade() {
            Some(core) => core.remove(&self.record),
            None => false,
        }
    }

    /// Invokes every callback of this subscription, in insertion order.
    ///
    /// Normally driven by [`Bus::dispatch`](crate::Bus::dispatch); exposed so
    /// a held handle can be fired directly (registration state is not
    /// consulted). Callback panics propagate to the caller.
    pub fn fire(&self, value: Option<&T>) {
        self.record.fire(value);
    }
}

impl<T: Send + Sync + 'static> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            record: Arc::clone(&self.record),
            bus: Weak::clone(&self.bus),
        }
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.record.id)
            .field("name", &self.record.name)
            .field("once", &self.record.once)
            .finish()
    }
}
