//! # Bus: the subscription registry and dispatch loop.
//!
//! [`Bus`] owns the ordered sequence of active [`Subscription`]s and fans each
//! dispatched event out to every subscription whose name matches, synchronously,
//! in registration order.
//!
//! ## Architecture
//! ```text
//! Producers:                          Consumers:
//!   dispatch("tick", Some(v)) ──► Bus ──► [Subscription "tick"] ─► callbacks(Some(&v))
//!                                  │  ──► [Subscription "tick"] ─► callbacks(Some(&v))
//!                                  │      (registration order)
//!                                  └────► [Subscription "tock"]   (name mismatch, skipped)
//! ```
//!
//! ## Rules
//! - **Explicit instance**: there is no global bus. Create one with [`Bus::new`]
//!   and pass clones around; clones share the same registry, [`Bus::new`] makes
//!   an isolated one.
//! - **Typed payloads**: `Bus<T>` carries exactly one payload type. An event
//!   either has a value (`Some(v)`) or none. Heterogeneous payloads are an enum
//!   for `T` at the call site.
//! - **Snapshot dispatch**: the matched subscriptions are snapshotted under the
//!   lock, then fired with the lock released. A callback may re-enter any bus
//!   operation; structural changes made mid-pass affect later dispatches, not
//!   the pass in flight.
//! - **No isolation between callbacks**: panics are not caught and abort the
//!   remainder of that dispatch pass, propagating to the dispatcher.
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use evbus::Bus;
//!
//! let bus: Bus<u32> = Bus::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! let sub = bus.subscribe("tick", move |value| {
//!     sink.lock().unwrap().push(value.copied());
//! });
//!
//! bus.dispatch("tick", Some(1));
//! bus.dispatch("tick", None);
//! bus.dispatch("tock", Some(9)); // different name, not delivered
//!
//! assert_eq!(seen.lock().unwrap().as_slice(), &[Some(1), None]);
//! assert!(bus.unsubscribe(&sub));
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::error::BusError;
use crate::subscription::{Callback, Record, Subscription};

/// Shared state behind a [`Bus`] and the `Weak` back-references of its handles.
pub(crate) struct Core<T: Send + Sync + 'static> {
    /// Ordered sequence of active subscriptions; insertion order is dispatch order.
    subs: Mutex<Vec<Arc<Record<T>>>>,
    next_id: AtomicU64,
}

impl<T: Send + Sync + 'static> Core<T> {
    /// Removes one entry by identity. Absent entries are a no-op returning `false`.
    pub(crate) fn remove(&self, target: &Arc<Record<T>>) -> bool {
        let mut subs = self
            .subs
            .lock()
            // The lock is never held while callbacks run, so poisoning can only
            // come from a panic elsewhere; recover and keep going.
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subs.len();
        subs.retain(|entry| !Arc::ptr_eq(entry, target));
        let removed = before != subs.len();
        if removed {
            log::trace!("unsubscribe event={} id={}", target.name, target.id);
        }
        removed
    }
}

/// In-process typed pub/sub event bus.
///
/// Cheap to clone (internally holds an `Arc`); all clones operate on the same
/// subscription sequence. All methods take `&self` and never hold the internal
/// lock while user callbacks run, so callbacks may subscribe, unsubscribe, or
/// dispatch re-entrantly.
pub struct Bus<T: Send + Sync + 'static> {
    core: Arc<Core<T>>,
}

impl<T: Send + Sync + 'static> Bus<T> {
    /// Creates a new, empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Arc::new(Core {
                subs: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    fn register(&self, name: &str, once: bool, callback: Callback<T>) -> Subscription<T> {
        let id = self.core.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let record = Arc::new(Record::new(id, name, once, callback));
        self.core
            .subs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::clone(&record));
        log::trace!("subscribe event={name} id={id} once={once}");
        Subscription {
            record,
            bus: Arc::downgrade(&self.core),
        }
    }

    /// Registers `callback` for every future dispatch of `name`.
    ///
    /// Names may repeat; each call appends an independent subscription to the
    /// end of the sequence. The returned handle removes it again via
    /// [`Subscription::remove`] or [`Bus::unsubscribe`].
    pub fn subscribe(
        &self,
        name: &str,
        callback: impl Fn(Option<&T>) + Send + Sync + 'static,
    ) -> Subscription<T> {
        self.register(name, false, Arc::new(callback))
    }

    /// Registers `callback` for the next dispatch of `name` only.
    ///
    /// The subscription is flagged single-fire: after its callbacks run on the
    /// first matching dispatch, the bus removes it before any later dispatch
    /// can reach it.
    pub fn subscribe_once(
        &self,
        name: &str,
        callback: impl Fn(Option<&T>) + Send + Sync + 'static,
    ) -> Subscription<T> {
        self.register(name, true, Arc::new(callback))
    }

    /// Removes the given subscription from the sequence, comparing by identity.
    ///
    /// Returns `true` if it was present and removed. Removing a subscription
    /// that is absent (already removed, or minted by another bus) is a no-op
    /// returning `false`, never an error.
    pub fn unsubscribe(&self, subscription: &Subscription<T>) -> bool {
        self.core.remove(&subscription.record)
    }

    /// Removes subscriptions in bulk.
    ///
    /// - `None` clears the entire sequence and returns `true`.
    /// - `Some(name)` removes every subscription registered for `name` and
    ///   returns `true` iff at least one was removed.
    pub fn unsubscribe_all(&self, name: Option<&str>) -> bool {
        let mut subs = self
            .core
            .subs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match name {
            None => {
                log::trace!("unsubscribe_all cleared={}", subs.len());
                subs.clear();
                true
            }
            Some(name) => {
                let before = subs.len();
                subs.retain(|entry| &*entry.name != name);
                let removed = before - subs.len();
                log::trace!("unsubscribe_all event={name} removed={removed}");
                removed > 0
            }
        }
    }

    /// Notifies every currently registered subscription whose name equals `name`.
    ///
    /// The matched set is snapshotted before any callback runs, so the pass is
    /// immune to structural changes made by the callbacks themselves:
    /// - a subscription removed mid-pass by an earlier callback still fires,
    /// - a subscription added mid-pass is not delivered until the next dispatch.
    ///
    /// Callbacks receive `Some(&value)`, or `None` for `dispatch(name, None)`.
    /// They run synchronously in registration order; a panic aborts the rest of
    /// the pass and propagates to the caller.
    pub fn dispatch(&self, name: &str, value: Option<T>) {
        let matched: Vec<Arc<Record<T>>> = {
            let subs = self
                .core
                .subs
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            subs.iter()
                .filter(|entry| &*entry.name == name)
                .cloned()
                .collect()
        };
        log::trace!("dispatch event={name} matched={}", matched.len());

        let value = value.as_ref();
        for record in matched {
            record.fire(value);
            if record.once {
                self.core.remove(&record);
            }
        }
    }

    /// Waits for the next dispatch of `name`.
    ///
    /// The underlying single-fire subscription is registered before this
    /// function returns, so an event dispatched between the call and the first
    /// poll of the future is not missed:
    ///
    /// ```rust
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// use evbus::Bus;
    ///
    /// let bus: Bus<u32> = Bus::new();
    /// let next = bus.await_next("tick");
    /// bus.dispatch("tick", Some(42));
    /// assert_eq!(next.await.unwrap(), Some(42));
    /// # }
    /// ```
    ///
    /// Resolves to `None` when the event was dispatched without a value.
    ///
    /// # Errors
    /// [`BusError::Canceled`] if the subscription is torn down before an event
    /// arrives (`unsubscribe_all`, or the bus dropped).
    pub fn await_next(&self, name: &str) -> impl Future<Output = Result<Option<T>, BusError>>
    where
        T: Clone,
    {
        let (tx, rx) = oneshot::channel::<Option<T>>();
        let slot = Mutex::new(Some(tx));
        let _sub = self.subscribe_once(name, move |value| {
            if let Some(tx) = slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take()
            {
                // The receiver may already be gone (future dropped early);
                // nothing useful to do with the value then.
                let _ = tx.send(value.cloned());
            }
        });

        let event = name.to_string();
        async move { rx.await.map_err(|_| BusError::Canceled { event }) }
    }

    /// Number of subscriptions registered for `name`.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.core
            .subs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|entry| &*entry.name == name)
            .count()
    }

    /// Total number of registered subscriptions, across all names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core
            .subs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// True if no subscriptions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + Sync + 'static> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Send + Sync + 'static> Default for Bus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for Bus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    fn counting(hits: &Arc<AtomicUsize>) -> impl Fn(Option<&u32>) + Send + Sync + 'static {
        let hits = Arc::clone(hits);
        move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_dispatch_matches_by_name_in_registration_order() {
        let bus: Bus<u32> = Bus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&order);
        bus.subscribe("tick", move |v| a.lock().unwrap().push(("a", v.copied())));
        let b = Arc::clone(&order);
        bus.subscribe("tick", move |v| b.lock().unwrap().push(("b", v.copied())));
        let c = Arc::clone(&order);
        bus.subscribe("tock", move |v| c.lock().unwrap().push(("c", v.copied())));

        bus.dispatch("tick", Some(1));
        assert_eq!(*order.lock().unwrap(), vec![("a", Some(1)), ("b", Some(1))]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery_and_reports_absence() {
        let bus: Bus<u32> = Bus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&order);
        let sub_a = bus.subscribe("tick", move |v| a.lock().unwrap().push(("a", v.copied())));
        let b = Arc::clone(&order);
        bus.subscribe("tick", move |v| b.lock().unwrap().push(("b", v.copied())));

        bus.dispatch("tick", Some(1));
        assert!(bus.unsubscribe(&sub_a));
        assert!(!bus.unsubscribe(&sub_a)); // no-op, not an error
        bus.dispatch("tick", Some(2));

        assert_eq!(
            *order.lock().unwrap(),
            vec![("a", Some(1)), ("b", Some(1)), ("b", Some(2))]
        );
    }

    #[test]
    fn test_subscribe_once_fires_exactly_once() {
        let bus: Bus<u32> = Bus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe_once("ping", counting(&hits));

        bus.dispatch("ping", None);
        bus.dispatch("ping", None);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.count("ping"), 0);
    }

    #[test]
    fn test_unsubscribe_all_none_clears_everything() {
        let bus: Bus<u32> = Bus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe("a", counting(&hits));
        bus.subscribe("b", counting(&hits));

        assert!(bus.unsubscribe_all(None));
        assert!(bus.is_empty());

        bus.dispatch("a", None);
        bus.dispatch("b", None);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // Clearing an already-empty bus still reports success.
        assert!(bus.unsubscribe_all(None));
    }

    #[test]
    fn test_unsubscribe_all_by_name_removes_only_matches() {
        let bus: Bus<u32> = Bus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe("a", counting(&hits));
        bus.subscribe("a", counting(&hits));
        bus.subscribe("b", counting(&hits));

        assert!(bus.unsubscribe_all(Some("a")));
        assert!(!bus.unsubscribe_all(Some("a"))); // nothing left to remove
        assert!(!bus.unsubscribe_all(Some("missing")));

        assert_eq!(bus.count("a"), 0);
        assert_eq!(bus.count("b"), 1);
        bus.dispatch("b", None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_names_may_repeat_and_len_tracks_all() {
        let bus: Bus<u32> = Bus::new();
        bus.subscribe("x", |_| {});
        bus.subscribe("x", |_| {});
        bus.subscribe("y", |_| {});

        assert_eq!(bus.len(), 3);
        assert_eq!(bus.count("x"), 2);
        assert_eq!(bus.count("y"), 1);
        assert_eq!(bus.count("z"), 0);
    }

    #[test]
    fn test_clones_share_one_registry_new_instances_are_isolated() {
        let bus: Bus<u32> = Bus::new();
        let other: Bus<u32> = Bus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.clone().subscribe("tick", counting(&hits));
        bus.dispatch("tick", None);
        other.dispatch("tick", None); // isolated instance, no delivery

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(other.len(), 0);
    }

    #[test]
    fn test_foreign_handle_is_not_removed() {
        let bus: Bus<u32> = Bus::new();
        let other: Bus<u32> = Bus::new();
        let foreign = other.subscribe("tick", |_| {});

        assert!(!bus.unsubscribe(&foreign));
        assert_eq!(other.count("tick"), 1);
    }

    #[test]
    fn test_reentrant_clear_during_dispatch_completes_pass() {
        let bus: Bus<u32> = Bus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let clearer = bus.clone();
        let a = Arc::clone(&order);
        bus.subscribe("x", move |_| {
            a.lock().unwrap().push("a");
            clearer.unsubscribe_all(None);
        });
        let b = Arc::clone(&order);
        bus.subscribe("x", move |_| b.lock().unwrap().push("b"));

        // The snapshot taken at dispatch start still fires "b" even though the
        // first callback emptied the registry.
        bus.dispatch("x", None);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);

        assert!(bus.is_empty());
        bus.dispatch("x", None);
        assert_eq!(order.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_subscription_added_mid_pass_waits_for_next_dispatch() {
        let bus: Bus<u32> = Bus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let adder = bus.clone();
        let late_hits = Arc::clone(&hits);
        bus.subscribe("x", move |_| {
            let inner = Arc::clone(&late_hits);
            adder.subscribe("x", move |_| {
                inner.fetch_add(1, Ordering::SeqCst);
            });
        });

        bus.dispatch("x", None);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        bus.dispatch("x", None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reentrant_self_removal_during_dispatch() {
        let bus: Bus<u32> = Bus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let sub: Arc<Mutex<Option<crate::Subscription<u32>>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&sub);
        let counter = Arc::clone(&hits);
        let handle = bus.subscribe("x", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = slot.lock().unwrap().take() {
                assert!(me.remove());
            }
        });
        *sub.lock().unwrap() = Some(handle);

        bus.dispatch("x", None);
        bus.dispatch("x", None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
