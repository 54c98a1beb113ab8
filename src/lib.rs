pub mod common;
pub mod cube;
pub mod io;
pub mod storage;

pub use common::exception::{BackendBusy, CubeIoError, CubeResult, FlushError};
pub use cube::{Address, AddressBuilder, AggregateEngine, Batch, Op};
pub use io::{Coordinator, CoordinatorConfig, FlushHandle, SyncLevel, WriteOutcome};
pub use storage::{FlushCompleter, MemoryBackend, PendingFlush, StorageBackend};
