//! # Scope: lifecycle-bound subscriptions.
//!
//! [`Scope`] ties a group of subscriptions to a lexical or component lifetime:
//! each [`Scope::on`] call subscribes immediately, and dropping the scope
//! removes every binding exactly once. This is the adapter UI-style
//! mount/unmount hooks consume: bind on mount, and teardown happens on its own
//! when the owning component releases the scope.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use evbus::{Bus, Scope};
//!
//! let bus: Bus<u32> = Bus::new();
//! let hits = Arc::new(AtomicUsize::new(0));
//!
//! {
//!     let mut scope = Scope::new(&bus);
//!     let counter = Arc::clone(&hits);
//!     scope.on("tick", move |_| {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     });
//!
//!     bus.dispatch("tick", None);
//!     assert_eq!(hits.load(Ordering::SeqCst), 1);
//! } // scope dropped, binding removed
//!
//! bus.dispatch("tick", None);
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;

use crate::bus::Bus;
use crate::subscription::Subscription;

/// RAII guard over a group of subscriptions.
///
/// Holds a clone of the bus (keeping the registry alive for as long as the
/// bindings exist) and the handles it created. `Drop` removes each one; a
/// binding is subscribed exactly once on [`Scope::on`] and unsubscribed exactly
/// once on drop.
pub struct Scope<T: Send + Sync + 'static> {
    bus: Bus<T>,
    subs: Vec<Subscription<T>>,
}

impl<T: Send + Sync + 'static> Scope<T> {
    /// Creates an empty scope bound to `bus`.
    #[must_use]
    pub fn new(bus: &Bus<T>) -> Self {
        Self {
            bus: bus.clone(),
            subs: Vec::new(),
        }
    }

    /// Subscribes `callback` to `name` for the lifetime of this scope.
    ///
    /// May be called repeatedly to bind a mapping of several name/callback
    /// pairs; all of them are removed together when the scope drops.
    pub fn on(
        &mut self,
        name: &str,
        callback: impl Fn(Option<&T>) + Send + Sync + 'static,
    ) -> &mut Self {
        let sub = self.bus.subscribe(name, callback);
        self.subs.push(sub);
        self
    }

    /// Number of bindings held by this scope.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subs.len()
    }

    /// True if the scope holds no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}

impl<T: Send + Sync + 'static> Drop for Scope<T> {
    fn drop(&mut self) {
        for sub in self.subs.drain(..) {
            sub.remove();
        }
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for Scope<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("bindings", &self.subs.len())
            .finish()
    }
}
