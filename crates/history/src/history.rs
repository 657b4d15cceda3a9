use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// What a write does when the pointer is not at the newest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Drop every entry after the pointer, then append. Standard undo/redo.
    #[default]
    BranchDiscard,
    /// Always append at the end. The pointer follows only if it was already
    /// at the head; otherwise it stays where it is and the new entry is only
    /// reachable through [`History::jump_to_end`] or forward steps.
    AppendDetached,
}

/// Result of [`History::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The pointer moved to a snapshot that differs from the previous one.
    Changed,
    /// The pointer moved, but the new snapshot is the same as the old one.
    Unchanged,
    /// The entry was appended behind a rewound pointer; the visible state
    /// did not move.
    Detached,
}

impl WriteOutcome {
    /// Whether observers of the current state should hear about this write.
    pub fn is_changed(self) -> bool {
        matches!(self, Self::Changed)
    }
}

/// Ordered snapshot log with a current-position pointer.
///
/// Every write appends an entry, even when the snapshot did not change, so
/// that `has_next`/`has_previous` stay a pure function of the write count.
#[derive(Debug, Clone)]
pub struct History<S> {
    entries: Vec<S>,
    index: usize,
    policy: WritePolicy,
}

impl<S: Snapshot> History<S> {
    /// Start a log holding a single snapshot.
    pub fn new(initial: S) -> Self {
        Self::with_policy(initial, WritePolicy::default())
    }

    pub fn with_policy(initial: S, policy: WritePolicy) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
            policy,
        }
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    /// The snapshot under the pointer.
    pub fn state(&self) -> &S {
        &self.entries[self.index]
    }

    /// Number of recorded snapshots. Always at least one.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Position of the pointer.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Read-only access to every recorded snapshot, oldest first.
    pub fn snapshots(&self) -> &[S] {
        &self.entries
    }

    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        self.index < self.entries.len() - 1
    }

    /// Record the result of a write.
    pub fn record(&mut self, state: S) -> WriteOutcome {
        let changed = !state.same_snapshot(self.state());

        match self.policy {
            WritePolicy::BranchDiscard => {
                if self.has_next() {
                    tracing::debug!(
                        index = self.index,
                        dropped = self.entries.len() - self.index - 1,
                        "write from rewound position, discarding future entries"
                    );
                    self.entries.truncate(self.index + 1);
                }
                self.entries.push(state);
                self.index = self.entries.len() - 1;
            }
            WritePolicy::AppendDetached => {
                let at_head = !self.has_next();
                self.entries.push(state);
                if !at_head {
                    tracing::debug!(
                        index = self.index,
                        len = self.entries.len(),
                        "write from rewound position appended detached"
                    );
                    return WriteOutcome::Detached;
                }
                self.index = self.entries.len() - 1;
            }
        }

        if changed {
            WriteOutcome::Changed
        } else {
            WriteOutcome::Unchanged
        }
    }

    /// Move the pointer one entry back. Returns `None` at the start.
    pub fn step_back(&mut self) -> Option<&S> {
        self.jump_to(self.index.saturating_sub(1))
    }

    /// Move the pointer one entry forward. Returns `None` at the end.
    pub fn step_forward(&mut self) -> Option<&S> {
        self.jump_to(self.index + 1)
    }

    pub fn jump_to_start(&mut self) -> Option<&S> {
        self.jump_to(0)
    }

    pub fn jump_to_end(&mut self) -> Option<&S> {
        self.jump_to(self.entries.len() - 1)
    }

    /// Move the pointer to `target`, clamped to the log bounds.
    ///
    /// Returns the newly visible snapshot, or `None` if the pointer did not
    /// move.
    pub fn jump_to(&mut self, target: usize) -> Option<&S> {
        let target = target.min(self.entries.len() - 1);
        if target == self.index {
            tracing::trace!(index = self.index, "navigation is a no-op");
            return None;
        }
        tracing::trace!(from = self.index, to = target, "moving history pointer");
        self.index = target;
        Some(self.state())
    }

    /// Collapse the log to the current snapshot. Irreversible.
    pub fn clear_history(&mut self) {
        let current = self.entries.swap_remove(self.index);
        tracing::debug!(discarded = self.entries.len(), "clearing history");
        self.entries = vec![current];
        self.index = 0;
    }
}
