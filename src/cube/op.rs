use std::fmt::Debug;

/// An incremental update to one cube cell.
///
/// `merge` must be associative and commutative: the coordinator merges writes
/// to the same address in whatever order callers happen to arrive, and the
/// backend merges a flushed value into whatever it already stores.
pub trait Op: Clone + Debug + Send + Sync + 'static {
    fn merge(&self, other: &Self) -> Self;
}
