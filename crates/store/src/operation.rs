//! Statically classified store operations.
//!
//! The set of supported names is fixed. Reads go straight to the current
//! snapshot; writes produce a candidate snapshot for the history log. Any
//! other name is rejected with [`StoreError::UnsupportedOperation`].

use std::fmt;
use std::str::FromStr;

use rewind_value::{Key, Value, ValueError};

use crate::store::StoreError;

/// Whether an operation observes or produces state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Write,
}

/// Every operation name the store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationName {
    Get,
    GetIn,
    Delete,
    DeleteIn,
    Merge,
    MergeDeep,
    MergeDeepIn,
    MergeIn,
    Remove,
    RemoveIn,
    Set,
    SetIn,
    Update,
    UpdateIn,
}

pub const READ_OPERATIONS: &[OperationName] = &[OperationName::Get, OperationName::GetIn];

pub const WRITE_OPERATIONS: &[OperationName] = &[
    OperationName::Delete,
    OperationName::DeleteIn,
    OperationName::Merge,
    OperationName::MergeDeep,
    OperationName::MergeDeepIn,
    OperationName::MergeIn,
    OperationName::Remove,
    OperationName::RemoveIn,
    OperationName::Set,
    OperationName::SetIn,
    OperationName::Update,
    OperationName::UpdateIn,
];

impl OperationName {
    pub fn kind(self) -> OperationKind {
        match self {
            Self::Get | Self::GetIn => OperationKind::Read,
            _ => OperationKind::Write,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::GetIn => "getIn",
            Self::Delete => "delete",
            Self::DeleteIn => "deleteIn",
            Self::Merge => "merge",
            Self::MergeDeep => "mergeDeep",
            Self::MergeDeepIn => "mergeDeepIn",
            Self::MergeIn => "mergeIn",
            Self::Remove => "remove",
            Self::RemoveIn => "removeIn",
            Self::Set => "set",
            Self::SetIn => "setIn",
            Self::Update => "update",
            Self::UpdateIn => "updateIn",
        }
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationName {
    type Err = StoreError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        READ_OPERATIONS
            .iter()
            .chain(WRITE_OPERATIONS)
            .copied()
            .find(|op| op.as_str() == name)
            .ok_or_else(|| StoreError::UnsupportedOperation(name.to_owned()))
    }
}

const UPDATER_AS_DATA: &str = "an updater function cannot be given as data";

/// Updater closure carried by `update` and `updateIn`.
pub type Updater = Box<dyn FnOnce(Option<Value>) -> Value>;

/// A store operation together with its arguments.
pub enum Operation {
    Get(Key),
    GetIn(Vec<Key>),
    Delete(Key),
    DeleteIn(Vec<Key>),
    Merge(Value),
    MergeDeep(Value),
    MergeDeepIn(Vec<Key>, Value),
    MergeIn(Vec<Key>, Value),
    Remove(Key),
    RemoveIn(Vec<Key>),
    Set(Key, Value),
    SetIn(Vec<Key>, Value),
    Update(Key, Updater),
    UpdateIn(Vec<Key>, Updater),
}

impl Operation {
    pub fn name(&self) -> OperationName {
        match self {
            Self::Get(..) => OperationName::Get,
            Self::GetIn(..) => OperationName::GetIn,
            Self::Delete(..) => OperationName::Delete,
            Self::DeleteIn(..) => OperationName::DeleteIn,
            Self::Merge(..) => OperationName::Merge,
            Self::MergeDeep(..) => OperationName::MergeDeep,
            Self::MergeDeepIn(..) => OperationName::MergeDeepIn,
            Self::MergeIn(..) => OperationName::MergeIn,
            Self::Remove(..) => OperationName::Remove,
            Self::RemoveIn(..) => OperationName::RemoveIn,
            Self::Set(..) => OperationName::Set,
            Self::SetIn(..) => OperationName::SetIn,
            Self::Update(..) => OperationName::Update,
            Self::UpdateIn(..) => OperationName::UpdateIn,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.name().kind()
    }

    /// Build an operation from a name and JSON arguments.
    ///
    /// Keys are JSON strings (map fields) or non-negative integers (list
    /// indices); paths are arrays of keys. `update` and `updateIn` need a
    /// closure and cannot be expressed as data.
    pub fn from_json(name: &str, args: &[serde_json::Value]) -> Result<Self, StoreError> {
        let op: OperationName = name.parse()?;
        let arity = match op {
            OperationName::Get
            | OperationName::GetIn
            | OperationName::Delete
            | OperationName::DeleteIn
            | OperationName::Merge
            | OperationName::MergeDeep
            | OperationName::Remove
            | OperationName::RemoveIn => 1,
            OperationName::Update | OperationName::UpdateIn => {
                return Err(invalid(op, UPDATER_AS_DATA));
            }
            _ => 2,
        };
        if args.len() != arity {
            return Err(invalid(
                op,
                format!("expected {arity} argument(s), got {}", args.len()),
            ));
        }

        let value = |i: usize| Value::from_json(args[i].clone());
        Ok(match op {
            OperationName::Get => Self::Get(key_from_json(op, &args[0])?),
            OperationName::GetIn => Self::GetIn(path_from_json(op, &args[0])?),
            OperationName::Delete => Self::Delete(key_from_json(op, &args[0])?),
            OperationName::DeleteIn => Self::DeleteIn(path_from_json(op, &args[0])?),
            OperationName::Merge => Self::Merge(value(0)),
            OperationName::MergeDeep => Self::MergeDeep(value(0)),
            OperationName::MergeDeepIn => {
                Self::MergeDeepIn(path_from_json(op, &args[0])?, value(1))
            }
            OperationName::MergeIn => Self::MergeIn(path_from_json(op, &args[0])?, value(1)),
            OperationName::Remove => Self::Remove(key_from_json(op, &args[0])?),
            OperationName::RemoveIn => Self::RemoveIn(path_from_json(op, &args[0])?),
            OperationName::Set => Self::Set(key_from_json(op, &args[0])?, value(1)),
            OperationName::SetIn => Self::SetIn(path_from_json(op, &args[0])?, value(1)),
            OperationName::Update | OperationName::UpdateIn => {
                return Err(invalid(op, UPDATER_AS_DATA));
            }
        })
    }

    /// Evaluate a read against `state`. Returns `None` for writes.
    pub(crate) fn read(&self, state: &Value) -> Option<Option<Value>> {
        match self {
            Self::Get(key) => Some(state.get(key).cloned()),
            Self::GetIn(path) => Some(state.get_in(path).cloned()),
            _ => None,
        }
    }

    /// Apply a write to `state`, producing the candidate snapshot. Reads
    /// return `state` unchanged.
    pub(crate) fn apply(self, state: &Value) -> Result<Value, ValueError> {
        match self {
            Self::Get(_) | Self::GetIn(_) => Ok(state.clone()),
            Self::Delete(key) => state.delete(key),
            Self::DeleteIn(path) => state.delete_in(&path),
            Self::Merge(other) => state.merge(&other),
            Self::MergeDeep(other) => state.merge_deep(&other),
            Self::MergeDeepIn(path, other) => state.merge_deep_in(&path, &other),
            Self::MergeIn(path, other) => state.merge_in(&path, &other),
            Self::Remove(key) => state.remove(key),
            Self::RemoveIn(path) => state.remove_in(&path),
            Self::Set(key, value) => state.set(key, value),
            Self::SetIn(path, value) => state.set_in(&path, value),
            Self::Update(key, updater) => state.update(key, updater),
            Self::UpdateIn(path, updater) => state.update_in(&path, updater),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operation({})", self.name())
    }
}

fn invalid(operation: OperationName, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidArguments {
        operation,
        reason: reason.into(),
    }
}

fn key_from_json(op: OperationName, json: &serde_json::Value) -> Result<Key, StoreError> {
    match json {
        serde_json::Value::String(name) => Ok(Key::Field(name.clone())),
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .map(Key::Index)
            .ok_or_else(|| invalid(op, format!("`{n}` is not a valid list index"))),
        other => Err(invalid(op, format!("`{other}` is not a key"))),
    }
}

fn path_from_json(op: OperationName, json: &serde_json::Value) -> Result<Vec<Key>, StoreError> {
    match json {
        serde_json::Value::Array(keys) => keys.iter().map(|k| key_from_json(op, k)).collect(),
        other => Err(invalid(op, format!("`{other}` is not a key path"))),
    }
}
