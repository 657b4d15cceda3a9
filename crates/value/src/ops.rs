//! Path-addressed writes over [`Value`].
//!
//! Every write walks the path and rebuilds each container along it. A
//! rebuilt container is a shallow copy of its `BTreeMap` or `Vec`, so a write
//! costs O(width) per level; the children it does not touch are shared by
//! `Arc`, not copied. When the edited slot already holds an equal value the
//! receiver itself is returned.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::{Key, Value, display_path};

/// Errors from writes that cannot be applied to the addressed value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("value at `{path}` is a {kind}, not a container")]
    NotAContainer { path: String, kind: &'static str },
    #[error("key `{key}` cannot address the {kind} at `{path}`")]
    KeyMismatch {
        path: String,
        key: String,
        kind: &'static str,
    },
    #[error("cannot merge a {source_kind} into a {target_kind}")]
    InvalidMergeSource {
        target_kind: &'static str,
        source_kind: &'static str,
    },
    #[error("index {index} is past the end of the list of length {len} at `{path}`")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },
    #[error("cannot remove the root value")]
    RootRemoval,
}

impl Value {
    /// Set `key` to `value`.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<Value, ValueError> {
        self.set_in(&[key.into()], value)
    }

    /// Set the value at `path`, creating missing intermediate maps.
    ///
    /// A list index equal to the list length appends; a larger index is
    /// [`ValueError::IndexOutOfRange`].
    pub fn set_in(&self, path: &[Key], value: impl Into<Value>) -> Result<Value, ValueError> {
        let value = value.into();
        self.edit_in(path, 0, true, |_| Ok(Some(value)))
    }

    /// Remove `key`. Removing a missing key is a no-op.
    pub fn delete(&self, key: impl Into<Key>) -> Result<Value, ValueError> {
        self.delete_in(&[key.into()])
    }

    /// Remove the value at `path`. Missing paths are no-ops.
    pub fn delete_in(&self, path: &[Key]) -> Result<Value, ValueError> {
        self.edit_in(path, 0, false, |_| Ok(None))
    }

    /// Alias of [`Value::delete`].
    pub fn remove(&self, key: impl Into<Key>) -> Result<Value, ValueError> {
        self.delete(key)
    }

    /// Alias of [`Value::delete_in`].
    pub fn remove_in(&self, path: &[Key]) -> Result<Value, ValueError> {
        self.delete_in(path)
    }

    /// Replace the value at `key` with `updater(current)`.
    pub fn update<F>(&self, key: impl Into<Key>, updater: F) -> Result<Value, ValueError>
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        self.update_in(&[key.into()], updater)
    }

    /// Replace the value at `path` with `updater(current)`, creating missing
    /// intermediate maps.
    pub fn update_in<F>(&self, path: &[Key], updater: F) -> Result<Value, ValueError>
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        self.edit_in(path, 0, true, |current| Ok(Some(updater(current.cloned()))))
    }

    /// Shallow merge. Maps merge by key, lists merge by index.
    pub fn merge(&self, other: &Value) -> Result<Value, ValueError> {
        self.merge_with(other, false)
    }

    /// Recursive merge: nested containers of the same kind are merged rather
    /// than replaced.
    pub fn merge_deep(&self, other: &Value) -> Result<Value, ValueError> {
        self.merge_with(other, true)
    }

    /// Shallow merge into the container at `path`; a missing target starts
    /// out as an empty map.
    pub fn merge_in(&self, path: &[Key], other: &Value) -> Result<Value, ValueError> {
        self.edit_in(path, 0, true, |current| {
            current
                .cloned()
                .unwrap_or_else(Value::map)
                .merge(other)
                .map(Some)
        })
    }

    /// Recursive merge into the container at `path`.
    pub fn merge_deep_in(&self, path: &[Key], other: &Value) -> Result<Value, ValueError> {
        self.edit_in(path, 0, true, |current| {
            current
                .cloned()
                .unwrap_or_else(Value::map)
                .merge_deep(other)
                .map(Some)
        })
    }

    /// Core path walk. `edit` receives the current value at the end of the
    /// path and returns its replacement, or `None` to remove it.
    fn edit_in<F>(&self, path: &[Key], depth: usize, create: bool, edit: F) -> Result<Value, ValueError>
    where
        F: FnOnce(Option<&Value>) -> Result<Option<Value>, ValueError>,
    {
        let Some(key) = path.get(depth) else {
            let next = edit(Some(self))?.ok_or(ValueError::RootRemoval)?;
            return Ok(if next == *self { self.clone() } else { next });
        };

        if !self.accepts(key) {
            return if create {
                Err(self.mismatch(path, depth))
            } else {
                Ok(self.clone())
            };
        }

        if let (Value::List(items), Key::Index(index)) = (self, key) {
            if create && *index > items.len() {
                return Err(ValueError::IndexOutOfRange {
                    path: display_path(&path[..depth]),
                    index: *index,
                    len: items.len(),
                });
            }
        }

        let current = self.get(key);
        let replacement = if depth + 1 == path.len() {
            edit(current)?
        } else {
            match current {
                Some(child) => Some(child.edit_in(path, depth + 1, create, edit)?),
                None if create => Some(Value::map().edit_in(path, depth + 1, create, edit)?),
                None => return Ok(self.clone()),
            }
        };

        Ok(self.replace_child(key, current, replacement))
    }

    fn accepts(&self, key: &Key) -> bool {
        matches!(
            (self, key),
            (Value::Map(_), Key::Field(_)) | (Value::List(_), Key::Index(_))
        )
    }

    fn mismatch(&self, path: &[Key], depth: usize) -> ValueError {
        let at = display_path(&path[..depth]);
        if self.is_container() {
            ValueError::KeyMismatch {
                path: at,
                key: path[depth].to_string(),
                kind: self.kind(),
            }
        } else {
            ValueError::NotAContainer {
                path: at,
                kind: self.kind(),
            }
        }
    }

    fn replace_child(&self, key: &Key, current: Option<&Value>, replacement: Option<Value>) -> Value {
        match (current, &replacement) {
            (None, None) => return self.clone(),
            (Some(old), Some(new)) if old == new => return self.clone(),
            _ => {}
        }

        match (self, key) {
            (Value::Map(map), Key::Field(name)) => {
                let mut next = (**map).clone();
                match replacement {
                    Some(value) => next.insert(name.clone(), value),
                    None => next.remove(name),
                };
                Value::Map(Arc::new(next))
            }
            (Value::List(items), Key::Index(index)) => {
                let mut next = (**items).clone();
                match replacement {
                    Some(value) if *index < next.len() => next[*index] = value,
                    // `edit_in` rejects indices past the end.
                    Some(value) => next.push(value),
                    None => {
                        next.remove(*index);
                    }
                }
                Value::List(Arc::new(next))
            }
            // `edit_in` only reaches here after `accepts` succeeded.
            _ => self.clone(),
        }
    }

    fn merge_with(&self, other: &Value, deep: bool) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Map(map), Value::Map(entries)) => {
                let mut next: Option<BTreeMap<String, Value>> = None;
                for (name, incoming) in entries.iter() {
                    let existing = map.get(name);
                    let merged = merge_slot(existing, incoming, deep)?;
                    if existing.is_some_and(|old| *old == merged) {
                        continue;
                    }
                    next.get_or_insert_with(|| (**map).clone())
                        .insert(name.clone(), merged);
                }
                Ok(next.map_or_else(|| self.clone(), Value::from))
            }
            (Value::List(items), Value::List(incoming_items)) => {
                let mut next: Option<Vec<Value>> = None;
                for (index, incoming) in incoming_items.iter().enumerate() {
                    let existing = items.get(index);
                    let merged = merge_slot(existing, incoming, deep)?;
                    if existing.is_some_and(|old| *old == merged) {
                        continue;
                    }
                    let list = next.get_or_insert_with(|| (**items).clone());
                    if index < list.len() {
                        list[index] = merged;
                    } else {
                        list.push(merged);
                    }
                }
                Ok(next.map_or_else(|| self.clone(), Value::from))
            }
            (Value::Map(_) | Value::List(_), _) => Err(ValueError::InvalidMergeSource {
                target_kind: self.kind(),
                source_kind: other.kind(),
            }),
            _ => Err(ValueError::NotAContainer {
                path: display_path(&[]),
                kind: self.kind(),
            }),
        }
    }
}

fn merge_slot(existing: Option<&Value>, incoming: &Value, deep: bool) -> Result<Value, ValueError> {
    match existing {
        Some(old) if deep && same_container_kind(old, incoming) => old.merge_with(incoming, true),
        _ => Ok(incoming.clone()),
    }
}

fn same_container_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Map(_), Value::Map(_)) | (Value::List(_), Value::List(_))
    )
}
