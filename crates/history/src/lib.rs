//! History log: an ordered record of snapshots plus a pointer to the current one.
//!
//! # Invariants
//! - The log is never empty.
//! - `0 <= index < len` at all times.
//! - Navigation clamps to the log bounds; an out-of-range move is a no-op,
//!   reported as `None` rather than an error.
//! - Under [`WritePolicy::BranchDiscard`] a write from a rewound position
//!   drops every entry after the pointer before appending.

mod history;
mod snapshot;

pub use history::{History, WriteOutcome, WritePolicy};
pub use snapshot::Snapshot;

pub fn crate_info() -> &'static str {
    "rewind-history v0.1.0"
}
