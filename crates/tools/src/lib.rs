//! Developer tooling: store inspector and history timeline.
//!
//! # Invariants
//! - Tools only read. Inspecting a store never moves its history pointer and
//!   never notifies subscribers.

mod inspector;

pub use inspector::{StoreInspector, StoreSummary, TimelineEntry};

pub fn crate_info() -> &'static str {
    "rewind-tools v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("tools"));
    }
}
