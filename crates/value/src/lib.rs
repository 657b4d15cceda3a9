//! Persistent state values: immutable, path-addressable, structurally shared.
//!
//! A [`Value`] is the snapshot type recorded by the history log. Reads never
//! fail; writes return a new value and leave the receiver untouched.
//!
//! # Invariants
//! - Values are never mutated in place. Every write returns a new value.
//! - A write that changes nothing returns a value that is [`Value::same`] as
//!   its receiver, so callers can detect no-ops by reference.
//! - Subtrees a write does not touch are shared between input and output.

mod ops;
mod types;

pub use ops::ValueError;
pub use types::{Key, Value, display_path};

pub fn crate_info() -> &'static str {
    "rewind-value v0.1.0"
}
