//! Storage side of the coordinator: the backend contract and an in-memory
//! reference backend.

pub mod backend;
pub mod memory_backend;

pub use backend::{FlushCompleter, PendingFlush, StorageBackend};
pub use memory_backend::MemoryBackend;
