//! Observable store: a persistent value, its history, and change subscribers.
//!
//! Reads go straight to the current snapshot. Writes produce a new snapshot,
//! record it in the history log, and notify subscribers if the visible state
//! changed. Navigating the history notifies too.
//!
//! # Invariants
//! - A write that changes nothing is recorded but notifies no one.
//! - Every navigation that moves the history pointer notifies.
//! - Subscribers are called in subscription order, synchronously, over a copy
//!   of the subscriber list taken when the round starts.
//! - A failing subscriber never prevents delivery to the others.
//! - Path subscriptions fire only when the value at their path changes.

mod operation;
mod path_subscription;
mod store;
mod subscribers;

pub use operation::{
    Operation, OperationKind, OperationName, READ_OPERATIONS, Updater, WRITE_OPERATIONS,
};
pub use rewind_history::WritePolicy;
pub use rewind_value::{Key, Value, ValueError, path};
pub use store::{Store, StoreConfig, StoreError, Subscription, WeakStore};
pub use subscribers::{NotifyOutcome, SubscriberError, SubscriberId};

pub fn crate_info() -> &'static str {
    "rewind-store v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("store"));
    }
}
