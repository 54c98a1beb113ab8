use crate::common::exception::CubeResult;
use crate::cube::address::Address;
use crate::cube::batch::Batch;
use crate::cube::op::Op;

/// Turns one incoming operation into the set of per-address writes it implies.
///
/// Rollups, bucketing and dimension handling all live behind this trait; the
/// coordinator only ever sees the resulting [`Batch`].
pub trait AggregateEngine: Send + Sync + 'static {
    type Op: Op;
    /// Caller-supplied coordinates of a write.
    type Target: ?Sized;

    /// Computes the writes for `op` at `target`. Must not do I/O.
    fn compute_writes(&self, target: &Self::Target, op: &Self::Op) -> CubeResult<Batch<Self::Op>>;

    /// Rejects addresses this engine never writes to, with `InvalidAddress`.
    fn validate_read(&self, address: &Address) -> CubeResult<()>;
}
