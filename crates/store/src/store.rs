use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use rewind_history::{History, WritePolicy};
use rewind_value::{Key, Value, ValueError};
use serde::{Deserialize, Serialize};

use crate::operation::{Operation, OperationKind, OperationName};
use crate::path_subscription::PathWatcher;
use crate::subscribers::{Callback, NotifyOutcome, SubscriberId, SubscriberRegistry, deliver};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("invalid arguments for {operation}: {reason}")]
    InvalidArguments {
        operation: OperationName,
        reason: String,
    },
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Store configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How writes behave after the history pointer has been rewound.
    pub write_policy: WritePolicy,
}

struct StoreInner {
    history: History<Value>,
    subscribers: SubscriberRegistry,
    config: StoreConfig,
}

/// Observable, rewindable state container.
///
/// `Store` is a cheap handle: clones share the same history and subscribers.
/// It is single-threaded and every call runs to completion, including the
/// notification round it triggers.
///
/// Callbacks may call back into the store. A write made from inside a
/// callback starts its own nested round before the outer round continues.
/// Nothing bounds that recursion; a callback that always writes never
/// terminates. Callbacks should hold a [`WeakStore`] rather than a `Store`
/// to avoid a reference cycle.
#[derive(Clone)]
pub struct Store {
    inner: Rc<RefCell<StoreInner>>,
}

/// Non-owning handle to a [`Store`].
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<RefCell<StoreInner>>,
}

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

/// Handle returned by [`Store::subscribe`] and [`Store::subscribe_in`].
///
/// Dropping it does not unsubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriberId,
    inner: Weak<RefCell<StoreInner>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove exactly this callback. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if inner.borrow_mut().subscribers.unsubscribe(self.id) {
            tracing::debug!(subscriber = %self.id, "unsubscribed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.borrow().subscribers.contains(self.id))
    }
}

impl Store {
    /// Create a store seeded from a plain JSON structure.
    pub fn new(initial: serde_json::Value) -> Self {
        Self::with_config(initial, StoreConfig::default())
    }

    /// Create a store over an empty map.
    pub fn empty() -> Self {
        Self::from_value(Value::map(), StoreConfig::default())
    }

    pub fn with_config(initial: serde_json::Value, config: StoreConfig) -> Self {
        Self::from_value(Value::from_json(initial), config)
    }

    pub fn from_value(initial: Value, config: StoreConfig) -> Self {
        tracing::debug!(?config, "creating store");
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                history: History::with_policy(initial, config.write_policy),
                subscribers: SubscriberRegistry::default(),
                config,
            })),
        }
    }

    pub fn config(&self) -> StoreConfig {
        self.inner.borrow().config
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// The current state.
    pub fn state(&self) -> Value {
        self.inner.borrow().history.state().clone()
    }

    /// The current state as plain JSON.
    pub fn to_json(&self) -> serde_json::Value {
        self.inner.borrow().history.state().to_json()
    }

    // --- reads ---

    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        self.inner.borrow().history.state().get(&key.into()).cloned()
    }

    pub fn get_in(&self, path: &[Key]) -> Option<Value> {
        self.inner.borrow().history.state().get_in(path).cloned()
    }

    // --- writes ---

    pub fn delete(&self, key: impl Into<Key>) -> Result<Value, StoreError> {
        self.write(Operation::Delete(key.into()))
    }

    pub fn delete_in(&self, path: &[Key]) -> Result<Value, StoreError> {
        self.write(Operation::DeleteIn(path.to_vec()))
    }

    pub fn merge(&self, other: impl Into<Value>) -> Result<Value, StoreError> {
        self.write(Operation::Merge(other.into()))
    }

    pub fn merge_deep(&self, other: impl Into<Value>) -> Result<Value, StoreError> {
        self.write(Operation::MergeDeep(other.into()))
    }

    pub fn merge_deep_in(&self, path: &[Key], other: impl Into<Value>) -> Result<Value, StoreError> {
        self.write(Operation::MergeDeepIn(path.to_vec(), other.into()))
    }

    pub fn merge_in(&self, path: &[Key], other: impl Into<Value>) -> Result<Value, StoreError> {
        self.write(Operation::MergeIn(path.to_vec(), other.into()))
    }

    pub fn remove(&self, key: impl Into<Key>) -> Result<Value, StoreError> {
        self.write(Operation::Remove(key.into()))
    }

    pub fn remove_in(&self, path: &[Key]) -> Result<Value, StoreError> {
        self.write(Operation::RemoveIn(path.to_vec()))
    }

    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<Value, StoreError> {
        self.write(Operation::Set(key.into(), value.into()))
    }

    pub fn set_in(&self, path: &[Key], value: impl Into<Value>) -> Result<Value, StoreError> {
        self.write(Operation::SetIn(path.to_vec(), value.into()))
    }

    /// Replace the value at `key` with `updater(current)`.
    ///
    /// The updater runs without the store borrowed, so it may read the store.
    pub fn update<F>(&self, key: impl Into<Key>, updater: F) -> Result<Value, StoreError>
    where
        F: FnOnce(Option<Value>) -> Value + 'static,
    {
        self.write(Operation::Update(key.into(), Box::new(updater)))
    }

    pub fn update_in<F>(&self, path: &[Key], updater: F) -> Result<Value, StoreError>
    where
        F: FnOnce(Option<Value>) -> Value + 'static,
    {
        self.write(Operation::UpdateIn(path.to_vec(), Box::new(updater)))
    }

    /// Run any operation.
    ///
    /// Reads yield the value found (`None` when missing). Writes yield the
    /// resulting current state.
    pub fn dispatch(&self, op: Operation) -> Result<Option<Value>, StoreError> {
        match op.kind() {
            OperationKind::Read => Ok(op.read(&self.state()).flatten()),
            OperationKind::Write => self.write(op).map(Some),
        }
    }

    fn write(&self, op: Operation) -> Result<Value, StoreError> {
        let name = op.name();
        let current = self.state();
        let candidate = op.apply(&current)?;

        let (outcome, state, round) = {
            let mut inner = self.inner.borrow_mut();
            let outcome = inner.history.record(candidate);
            let state = inner.history.state().clone();
            let round = if outcome.is_changed() {
                inner.subscribers.round()
            } else {
                Vec::new()
            };
            (outcome, state, round)
        };

        tracing::debug!(operation = %name, ?outcome, "write recorded");
        if outcome.is_changed() {
            deliver(&round, &state);
        }
        Ok(state)
    }

    // --- history navigation ---

    /// Show the previous snapshot. `None` when already at the start.
    pub fn step_back(&self) -> Option<Value> {
        self.navigate(History::step_back)
    }

    /// Show the next snapshot. `None` when already at the end.
    pub fn step_forward(&self) -> Option<Value> {
        self.navigate(History::step_forward)
    }

    pub fn jump_to_start(&self) -> Option<Value> {
        self.navigate(History::jump_to_start)
    }

    pub fn jump_to_end(&self) -> Option<Value> {
        self.navigate(History::jump_to_end)
    }

    /// Show the snapshot at `index`, clamped to the history bounds.
    pub fn jump_to(&self, index: usize) -> Option<Value> {
        self.navigate(|history| history.jump_to(index))
    }

    fn navigate<F>(&self, step: F) -> Option<Value>
    where
        F: FnOnce(&mut History<Value>) -> Option<&Value>,
    {
        let (state, round) = {
            let mut inner = self.inner.borrow_mut();
            let state = step(&mut inner.history).cloned()?;
            (state, inner.subscribers.round())
        };
        deliver(&round, &state);
        Some(state)
    }

    pub fn has_previous(&self) -> bool {
        self.inner.borrow().history.has_previous()
    }

    pub fn has_next(&self) -> bool {
        self.inner.borrow().history.has_next()
    }

    /// Drop every snapshot except the current one. Subscribers are not
    /// notified since the visible state does not change.
    pub fn clear_history(&self) {
        self.inner.borrow_mut().history.clear_history();
    }

    pub fn history_len(&self) -> usize {
        self.inner.borrow().history.len()
    }

    pub fn history_index(&self) -> usize {
        self.inner.borrow().history.index()
    }

    /// Every recorded snapshot, oldest first.
    pub fn history(&self) -> Vec<Value> {
        self.inner.borrow().history.snapshots().to_vec()
    }

    // --- subscriptions ---

    /// Call `callback` with the new state whenever the visible state changes.
    ///
    /// The callback may return `()` or a `Result`. Errors and panics are
    /// logged and do not stop delivery to other subscribers or reach the
    /// caller that triggered the round. A callback added during a round
    /// first hears the next one.
    pub fn subscribe<F, R>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value) -> R + 'static,
        R: NotifyOutcome,
    {
        let callback: Callback = Rc::new(move |state: &Value| callback(state).into_outcome());
        let id = self.inner.borrow_mut().subscribers.subscribe(callback);
        tracing::debug!(subscriber = %id, "subscribed");
        Subscription {
            id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Call `callback` with the value at `path` whenever that value changes.
    ///
    /// The value is captured now; the callback fires only for later changes.
    /// `None` means nothing is stored at the path.
    pub fn subscribe_in<F, R>(&self, path: &[Key], callback: F) -> Subscription
    where
        F: Fn(Option<&Value>) -> R + 'static,
        R: NotifyOutcome,
    {
        let watcher = PathWatcher::new(
            path.to_vec(),
            self.get_in(path),
            Box::new(move |value: Option<&Value>| callback(value).into_outcome()),
        );
        self.subscribe(move |state: &Value| watcher.observe(state))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Store")
            .field("state", inner.history.state())
            .field("history_len", &inner.history.len())
            .field("history_index", &inner.history.index())
            .field("subscribers", &inner.subscribers)
            .field("config", &inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_value::path;
    use serde_json::json;
    use std::cell::Cell;

    fn counter_store() -> Store {
        let store = Store::new(json!({"counter": 0}));
        store.set("counter", 1).unwrap();
        store.set("counter", 2).unwrap();
        store
    }

    fn counter(store: &Store) -> i64 {
        store.get("counter").and_then(|v| v.as_i64()).unwrap()
    }

    #[test]
    fn write_returns_resulting_state() {
        let store = Store::empty();
        let state = store.set("foo", "bar").unwrap();
        assert!(state.same(&store.state()));
        assert_eq!(store.to_json(), json!({"foo": "bar"}));
    }

    #[test]
    fn failed_write_leaves_history_untouched() {
        let store = Store::new(json!({"a": 1}));
        let err = store.set_in(&path!["a", "b"], 2).unwrap_err();
        assert!(matches!(err, StoreError::Value(ValueError::NotAContainer { .. })));
        assert_eq!(store.history_len(), 1);
    }

    #[test]
    fn dispatch_routes_reads_and_writes() {
        let store = Store::new(json!({"a": {"b": 1}}));
        let read = store
            .dispatch(Operation::from_json("getIn", &[json!(["a", "b"])]).unwrap())
            .unwrap();
        assert_eq!(read, Some(Value::from(1)));
        assert_eq!(store.history_len(), 1);

        let written = store
            .dispatch(Operation::from_json("set", &[json!("c"), json!(true)]).unwrap())
            .unwrap()
            .unwrap();
        assert!(written.same(&store.state()));
        assert_eq!(store.history_len(), 2);

        let missing = store
            .dispatch(Operation::Get("nope".into()))
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn navigation_notifies_and_noops_are_silent() {
        let store = counter_store();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        store.subscribe(move |_: &Value| h.set(h.get() + 1));

        assert!(store.jump_to(0).is_some());
        assert_eq!(counter(&store), 0);
        assert!(store.jump_to(0).is_none());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn update_can_read_the_store() {
        let store = Store::new(json!({"a": 2, "b": 3}));
        let reader = store.clone();
        store
            .update("a", move |a| {
                let b = reader.get("b").and_then(|v| v.as_i64()).unwrap_or(0);
                Value::from(a.and_then(|v| v.as_i64()).unwrap_or(0) * b)
            })
            .unwrap();
        assert_eq!(store.get("a"), Some(Value::from(6)));
    }

    #[test]
    fn subscription_reports_activity() {
        let store = Store::empty();
        let sub = store.subscribe(|_: &Value| {});
        assert!(sub.is_active());
        assert_eq!(store.subscriber_count(), 1);
        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_after_store_dropped_is_harmless() {
        let store = Store::empty();
        let sub = store.subscribe(|_: &Value| {});
        drop(store);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }

    #[test]
    fn weak_store_upgrades_while_alive() {
        let store = Store::empty();
        let weak = store.downgrade();
        assert!(weak.upgrade().is_some());
        drop(store);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn config_selects_write_policy() {
        let config: StoreConfig = serde_json::from_value(json!({"write_policy": "append_detached"})).unwrap();
        let store = Store::with_config(json!({"counter": 0}), config);
        assert_eq!(store.config().write_policy, WritePolicy::AppendDetached);

        store.set("counter", 1).unwrap();
        store.step_back();
        store.set("counter", 2).unwrap();
        assert_eq!(counter(&store), 0);
        assert!(store.has_next());
        store.jump_to_end();
        assert_eq!(counter(&store), 2);
    }

    #[test]
    fn detached_write_is_silent() {
        let store = Store::with_config(
            json!({"counter": 0}),
            StoreConfig {
                write_policy: WritePolicy::AppendDetached,
            },
        );
        store.set("counter", 1).unwrap();
        store.step_back();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        store.subscribe(move |_: &Value| h.set(h.get() + 1));
        let visible = store.set("counter", 2).unwrap();
        assert_eq!(hits.get(), 0);
        assert_eq!(visible.get(&"counter".into()), Some(&Value::from(0)));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: StoreConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn debug_shows_history_position() {
        let rendered = format!("{:?}", counter_store());
        assert!(rendered.contains("history_len: 3"));
        assert!(rendered.contains("history_index: 2"));
    }
}
