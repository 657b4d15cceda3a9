use std::cell::RefCell;

use rewind_value::{Key, Value};

use crate::subscribers::SubscriberError;

pub(crate) type PathCallback = Box<dyn Fn(Option<&Value>) -> Result<(), SubscriberError>>;

/// Memoized view of one path inside the state.
///
/// Forwards to its callback only when the value at the path is no longer
/// [`Value::same`] as the last one it saw. A missing value is `None`.
pub(crate) struct PathWatcher {
    path: Vec<Key>,
    cached: RefCell<Option<Value>>,
    callback: PathCallback,
}

impl PathWatcher {
    pub fn new(path: Vec<Key>, initial: Option<Value>, callback: PathCallback) -> Self {
        Self {
            path,
            cached: RefCell::new(initial),
            callback,
        }
    }

    pub fn observe(&self, state: &Value) -> Result<(), SubscriberError> {
        let value = state.get_in(&self.path);
        {
            let mut cached = self.cached.borrow_mut();
            let unchanged = match (cached.as_ref(), value) {
                (None, None) => true,
                (Some(old), Some(new)) => old.same(new),
                _ => false,
            };
            if unchanged {
                return Ok(());
            }
            *cached = value.cloned();
        }
        // The cache borrow is released so a reentrant round can observe too.
        (self.callback)(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_value::path;
    use serde_json::json;
    use std::rc::Rc;

    fn watcher(path: &[Key], initial: &Value, seen: &Rc<RefCell<Vec<Option<Value>>>>) -> PathWatcher {
        let seen = Rc::clone(seen);
        PathWatcher::new(
            path.to_vec(),
            initial.get_in(path).cloned(),
            Box::new(move |v: Option<&Value>| -> Result<(), SubscriberError> {
                seen.borrow_mut().push(v.cloned());
                Ok(())
            }),
        )
    }

    #[test]
    fn fires_only_when_path_value_changes() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let state = Value::from_json(json!({"user": {"name": "Brian"}}));
        let w = watcher(&path!["user", "name"], &state, &seen);

        let moved = state.set_in(&path!["user", "location"], "San Jose").unwrap();
        w.observe(&moved).unwrap();
        assert!(seen.borrow().is_empty());

        let renamed = moved.set_in(&path!["user", "name"], "Brian Vaughn").unwrap();
        w.observe(&renamed).unwrap();
        w.observe(&renamed).unwrap();
        assert_eq!(*seen.borrow(), [Some(Value::from("Brian Vaughn"))]);
    }

    #[test]
    fn reports_disappearance_and_reappearance() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let state = Value::from_json(json!({"flag": true}));
        let w = watcher(&path!["flag"], &state, &seen);

        let cleared = state.delete("flag").unwrap();
        w.observe(&cleared).unwrap();
        w.observe(&cleared).unwrap();
        w.observe(&state).unwrap();
        assert_eq!(*seen.borrow(), [None, Some(Value::from(true))]);
    }

    #[test]
    fn container_paths_compare_by_identity() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let state = Value::from_json(json!({"user": {"name": "Brian"}}));
        let w = watcher(&path!["user"], &state, &seen);

        let renamed = state.set_in(&path!["user", "name"], "B").unwrap();
        w.observe(&renamed).unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }
}
