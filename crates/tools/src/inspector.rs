use rewind_store::{Store, Value};

/// Store inspector for developer tooling.
///
/// Provides read-only queries against a store's history for debugging and
/// scripted runs.
pub struct StoreInspector;

impl StoreInspector {
    /// Produce a summary of the store's history position.
    pub fn summary(store: &Store) -> StoreSummary {
        StoreSummary {
            history_len: store.history_len(),
            index: store.history_index(),
            has_previous: store.has_previous(),
            has_next: store.has_next(),
            subscribers: store.subscriber_count(),
        }
    }

    /// List every recorded snapshot, oldest first, marking the visible one.
    pub fn timeline(store: &Store) -> Vec<TimelineEntry> {
        let current = store.history_index();
        store
            .history()
            .into_iter()
            .enumerate()
            .map(|(index, state)| TimelineEntry {
                index,
                current: index == current,
                state,
            })
            .collect()
    }
}

/// Summary of a store's history for the inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub history_len: usize,
    pub index: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub subscribers: usize,
}

impl std::fmt::Display for StoreSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Store: history={} index={} previous={} next={} subscribers={}",
            self.history_len, self.index, self.has_previous, self.has_next, self.subscribers
        )
    }
}

/// One snapshot in the timeline.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub index: usize,
    pub current: bool,
    pub state: Value,
}

impl std::fmt::Display for TimelineEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let marker = if self.current { '>' } else { ' ' };
        write!(f, "{marker} [{}] {}", self.index, self.state)
    }
}
