//! Data model seen by the write coordinator: addresses, mergeable operations,
//! batches, and the engine interface that produces them.

pub mod address;
pub mod batch;
pub mod engine;
pub mod op;

pub use address::{Address, AddressBuilder};
pub use batch::Batch;
pub use engine::AggregateEngine;
pub use op::Op;
