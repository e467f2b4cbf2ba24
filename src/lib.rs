//! # evbus
//!
//! **evbus** is a lightweight in-process publish/subscribe event bus.
//!
//! It lets decoupled components dispatch named events with an optional typed
//! payload and lets other components subscribe to be notified when an event of
//! a given name fires. Delivery is synchronous, same-thread fan-out in
//! registration order; there is no persistence, prioritization, wildcard
//! matching, or cross-process transport.
//!
//! ## Architecture
//! ```text
//!  ┌────────────┐  subscribe / subscribe_once   ┌─────────────────────────────┐
//!  │  Consumer  │ ─────────────────────────────►│  Bus<T>                     │
//!  └────────────┘        Subscription<T>        │  ordered subscription list  │
//!  ┌────────────┐  ◄─────────────────────────── │  (snapshot on dispatch)     │
//!  │  Producer  │ ──── dispatch(name, value) ──►│                             │
//!  └────────────┘                               └──────────┬──────────────────┘
//!                                                          │ name match,
//!                                                          │ registration order
//!                                               ┌──────────▼──────────┐
//!                                               │ callbacks(Option<&T>)│
//!                                               └─────────────────────┘
//!
//!  await_next(name)  ─► single-fire subscription ─► future resolving Option<T>
//!  Scope::on(name)   ─► subscription removed automatically when the scope drops
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types            |
//! |-------------------|---------------------------------------------------------------|----------------------|
//! | **Registry**      | Explicit, clonable bus instance; no global state.             | [`Bus`]              |
//! | **Subscriptions** | Handle per registered interest; identity-based removal.       | [`Subscription`]     |
//! | **One-shot**      | Single-fire subscriptions and a future-based "wait for next". | [`Bus::subscribe_once`], [`Bus::await_next`] |
//! | **Lifecycles**    | RAII scope that unbinds its subscriptions on drop.            | [`Scope`]            |
//! | **Errors**        | Typed error for orphaned waits; booleans for absence.         | [`BusError`]         |
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use evbus::Bus;
//!
//! let bus: Bus<String> = Bus::new();
//! let log = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&log);
//! let sub = bus.subscribe("user:login", move |value| {
//!     sink.lock().unwrap().push(value.cloned());
//! });
//!
//! bus.dispatch("user:login", Some("alice".to_string()));
//! bus.dispatch("user:logout", None); // no subscriber, silently dropped
//!
//! assert_eq!(log.lock().unwrap().len(), 1);
//! sub.remove();
//! ```

mod bus;
mod error;
mod scope;
mod subscription;

// ---- Public re-exports ----

pub use bus::Bus;
pub use error::BusError;
pub use scope::Scope;
pub use subscription::{Callback, Subscription};
