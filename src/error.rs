//! Error types used by the event bus.
//!
//! The bus reports the ordinary "not found" cases through boolean returns
//! ([`Bus::unsubscribe`](crate::Bus::unsubscribe) and friends) and lets
//! callback panics propagate untouched. [`BusError`] covers the one failure
//! that needs a real error value: a [`Bus::await_next`](crate::Bus::await_next)
//! future whose subscription was torn down before its event arrived.

use thiserror::Error;

/// # Errors produced by the event bus.
///
/// Only the future-returning adapter can fail; every synchronous operation
/// either succeeds or reports absence as `false`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// The awaited subscription was removed before a matching event was
    /// dispatched (bulk clear, explicit removal, or the bus was dropped).
    #[error("subscription for \"{event}\" was removed before an event was dispatched")]
    Canceled {
        /// Name of the event that was being awaited.
        event: String,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use evbus::BusError;
    ///
    /// let err = BusError::Canceled { event: "tick".into() };
    /// assert_eq!(err.as_label(), "await_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Canceled { .. } => "await_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::Canceled { event } => format!("await canceled: event={event}"),
        }
    }
}
