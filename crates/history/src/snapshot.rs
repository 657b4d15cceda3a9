use rewind_value::Value;

/// A state that can be recorded in a [`History`](crate::History).
///
/// `same_snapshot` decides whether a write changed anything. It should be
/// cheap: persistent values compare containers by pointer.
pub trait Snapshot: Clone {
    fn same_snapshot(&self, other: &Self) -> bool;
}

impl Snapshot for Value {
    fn same_snapshot(&self, other: &Self) -> bool {
        self.same(other)
    }
}
