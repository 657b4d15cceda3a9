//! Ordered change-notification callbacks.
//!
//! Delivery iterates over a copy of the list taken before the round starts,
//! so callbacks may subscribe, unsubscribe, or write to the store while a
//! round is in progress. A callback removed mid-round still receives that
//! round; it is skipped from the next one on. A callback added mid-round
//! first hears the next round.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use rewind_value::Value;

/// Identity of one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A failure reported by a subscriber. Logged, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

/// Return types accepted from subscriber callbacks: `()` or
/// `Result<(), E>` for any displayable `E`.
pub trait NotifyOutcome {
    fn into_outcome(self) -> Result<(), SubscriberError>;
}

impl NotifyOutcome for () {
    fn into_outcome(self) -> Result<(), SubscriberError> {
        Ok(())
    }
}

impl<E: fmt::Display> NotifyOutcome for Result<(), E> {
    fn into_outcome(self) -> Result<(), SubscriberError> {
        self.map_err(|e| SubscriberError(e.to_string()))
    }
}

pub(crate) type Callback = Rc<dyn Fn(&Value) -> Result<(), SubscriberError>>;

/// One notification round: the callbacks registered when it started.
pub(crate) type Round = Vec<(SubscriberId, Callback)>;

#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    next_id: u64,
    entries: Vec<(SubscriberId, Callback)>,
}

impl SubscriberRegistry {
    pub fn subscribe(&mut self, callback: Callback) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    /// Remove the callback registered under `id`. Returns whether it was
    /// still registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn round(&self) -> Round {
        self.entries.clone()
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("len", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

/// Deliver `state` to every callback in `round`, in subscription order.
///
/// A callback that returns an error or panics is logged and skipped; the
/// rest still run.
pub(crate) fn deliver(round: &[(SubscriberId, Callback)], state: &Value) {
    tracing::debug!(subscribers = round.len(), "notifying subscribers");
    for (id, callback) in round {
        match catch_unwind(AssertUnwindSafe(|| callback(state))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(subscriber = %id, error = %err, "subscriber failed");
            }
            Err(payload) => {
                tracing::warn!(
                    subscriber = %id,
                    panic = panic_message(payload.as_ref()),
                    "subscriber panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> Callback {
        let log = Rc::clone(log);
        Rc::new(move |_: &Value| -> Result<(), SubscriberError> {
            log.borrow_mut().push(tag.to_owned());
            Ok(())
        })
    }

    #[test]
    fn delivers_in_subscription_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = SubscriberRegistry::default();
        registry.subscribe(recorder(&log, "a"));
        registry.subscribe(recorder(&log, "b"));
        registry.subscribe(recorder(&log, "c"));

        deliver(&registry.round(), &Value::Null);
        assert_eq!(*log.borrow(), ["a", "b", "c"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_callback() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = SubscriberRegistry::default();
        let a = registry.subscribe(recorder(&log, "a"));
        let b = registry.subscribe(recorder(&log, "b"));

        assert!(registry.unsubscribe(a));
        assert!(!registry.unsubscribe(a));
        assert!(!registry.contains(a));
        assert!(registry.contains(b));
        assert_eq!(registry.len(), 1);

        deliver(&registry.round(), &Value::Null);
        assert_eq!(*log.borrow(), ["b"]);
    }

    #[test]
    fn failing_callback_does_not_stop_delivery() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = SubscriberRegistry::default();
        registry.subscribe(Rc::new(|_: &Value| -> Result<(), SubscriberError> {
            Err(SubscriberError("boom".into()))
        }));
        registry.subscribe(recorder(&log, "after"));

        deliver(&registry.round(), &Value::Null);
        assert_eq!(*log.borrow(), ["after"]);
    }

    #[test]
    fn panicking_callback_does_not_stop_delivery() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = SubscriberRegistry::default();
        registry.subscribe(Rc::new(|_: &Value| -> Result<(), SubscriberError> {
            panic!("subscriber blew up")
        }));
        registry.subscribe(recorder(&log, "after"));

        deliver(&registry.round(), &Value::Null);
        assert_eq!(*log.borrow(), ["after"]);
    }

    #[test]
    fn panic_message_reads_string_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(other.as_ref()), "<non-string panic payload>");
    }

    #[test]
    fn round_is_a_copy() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = SubscriberRegistry::default();
        let a = registry.subscribe(recorder(&log, "a"));
        let round = registry.round();
        registry.unsubscribe(a);

        deliver(&round, &Value::Null);
        assert_eq!(*log.borrow(), ["a"]);
    }

    #[test]
    fn notify_outcome_conversions() {
        assert_eq!(().into_outcome(), Ok(()));
        assert_eq!(Ok::<(), String>(()).into_outcome(), Ok(()));
        assert_eq!(
            Err::<(), _>("bad").into_outcome(),
            Err(SubscriberError("bad".into()))
        );
    }
}
