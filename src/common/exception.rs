use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::io::SyncLevel;

pub type CubeResult<T> = Result<T, CubeIoError>;

/// Errors surfaced by the coordinator's public API.
#[derive(Error, Debug)]
pub enum CubeIoError {
    #[error("blocking writes are not supported at sync level {0}")]
    BlockingUnsupported(SyncLevel),
    #[error("writes refused, an asynchronous flush failed earlier: {0}")]
    AsyncFailure(Arc<FlushError>),
    #[error("I/O error during flush: {0}")]
    Io(#[from] io::Error),
    #[error("internal error during flush: {0}")]
    Internal(Arc<FlushError>),
    #[error("invalid read address: {0}")]
    InvalidAddress(String),
    #[error("failed to build address: {0}")]
    AddressBuild(String),
    #[error("aggregate engine rejected the write: {0}")]
    Engine(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to start flush watcher runtime: {0}")]
    Runtime(String),
}

/// Terminal failure of one dispatched batch, as reported by the backend.
#[derive(Error, Debug)]
pub enum FlushError {
    #[error("backend I/O failure: {0}")]
    Io(#[from] io::Error),
    #[error("backend failure: {0}")]
    Backend(String),
    #[error("flush was interrupted before the backend completed it")]
    Interrupted,
}

impl FlushError {
    /// Whether this cause is reported to blocking writers as an I/O error.
    pub fn is_io(&self) -> bool {
        matches!(self, FlushError::Io(_) | FlushError::Interrupted)
    }
}

/// The backend cannot accept another batch right now.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("backend submission queue is full")]
pub struct BackendBusy;

impl CubeIoError {
    /// Maps a failed flush onto the error a blocking writer observes.
    pub fn from_flush_failure(cause: Arc<FlushError>) -> Self {
        match cause.as_ref() {
            FlushError::Interrupted => CubeIoError::Io(io::Error::new(
                io::ErrorKind::Interrupted,
                "interrupted during write",
            )),
            FlushError::Io(_) => CubeIoError::Io(io::Error::other(cause)),
            FlushError::Backend(_) => CubeIoError::Internal(cause),
        }
    }
}
