//! Non-durable in-memory backend.
//!
//! Accepted batches go onto a bounded queue drained by one worker thread,
//! which merges each batch into a map. A full queue is reported as
//! [`BackendBusy`], so the coordinator's retry path is exercised the same way
//! a real backend would exercise it. The durability barrier travels through
//! the same queue, so it returns only after every earlier batch is applied.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, info, warn};
use parking_lot::RwLock;

use crate::common::config::MEMORY_BACKEND_QUEUE_DEPTH;
use crate::common::exception::{BackendBusy, FlushError};
use crate::cube::{Address, Batch, Op};
use crate::storage::backend::{FlushCompleter, PendingFlush, StorageBackend};

enum Request<T> {
    Apply {
        batch: Arc<Batch<T>>,
        completer: FlushCompleter,
    },
    Barrier {
        done: Sender<()>,
    },
}

pub struct MemoryBackend<T: Op> {
    cells: Arc<RwLock<HashMap<Address, T>>>,
    sender: Option<Sender<Request<T>>>,
    fail_next: Arc<AtomicUsize>,
    applied: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Op> MemoryBackend<T> {
    pub fn new() -> Self {
        Self::with_queue_depth(MEMORY_BACKEND_QUEUE_DEPTH)
    }

    pub fn with_queue_depth(queue_depth: usize) -> Self {
        let (sender, receiver) = bounded(queue_depth);
        let mut backend = Self {
            cells: Arc::new(RwLock::new(HashMap::new())),
            sender: Some(sender),
            fail_next: Arc::new(AtomicUsize::new(0)),
            applied: Arc::new(AtomicU64::new(0)),
            worker: None,
        };
        backend.start_worker_thread(receiver);
        backend
    }

    fn start_worker_thread(&mut self, receiver: Receiver<Request<T>>) {
        let cells = Arc::clone(&self.cells);
        let fail_next = Arc::clone(&self.fail_next);
        let applied = Arc::clone(&self.applied);

        let spawned = thread::Builder::new()
            .name("cubeio-memory-backend".to_string())
            .spawn(move || {
                // Exits once every sender is gone and the queue is drained.
                for request in receiver.iter() {
                    match request {
                        Request::Apply { batch, completer } => {
                            let injected = fail_next
                                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                                    n.checked_sub(1)
                                })
                                .is_ok();
                            if injected {
                                debug!("Failing batch of {} writes on request", batch.len());
                                completer.fail(FlushError::Io(io::Error::other(
                                    "injected memory backend failure",
                                )));
                                continue;
                            }

                            let mut cells = cells.write();
                            for (address, op) in batch.iter() {
                                let merged = match cells.get(address) {
                                    Some(existing) => existing.merge(op),
                                    None => op.clone(),
                                };
                                cells.insert(address.clone(), merged);
                            }
                            drop(cells);

                            applied.fetch_add(1, Ordering::SeqCst);
                            completer.succeed();
                        }
                        Request::Barrier { done } => {
                            let _ = done.send(());
                        }
                    }
                }
            });

        match spawned {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                // Without a worker every submission resolves as interrupted.
                warn!("Failed to spawn memory backend worker: {}", e);
                self.sender = None;
            }
        }
    }

    /// Makes the next `count` accepted batches fail with an I/O error.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of batches merged into the map so far.
    pub fn applied_batches(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }

    /// Number of distinct addresses stored.
    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }
}

impl<T: Op> Default for MemoryBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Op> StorageBackend<T> for MemoryBackend<T> {
    fn submit_batch(&self, batch: Arc<Batch<T>>) -> Result<PendingFlush, BackendBusy> {
        let (completer, pending) = PendingFlush::channel();
        let Some(sender) = self.sender.as_ref() else {
            completer.fail(FlushError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
            return Ok(pending);
        };

        match sender.try_send(Request::Apply { batch, completer }) {
            Ok(()) => Ok(pending),
            Err(TrySendError::Full(_)) => Err(BackendBusy),
            Err(TrySendError::Disconnected(request)) => {
                if let Request::Apply { completer, .. } = request {
                    completer.fail(FlushError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
                }
                Ok(pending)
            }
        }
    }

    fn get(&self, address: &Address) -> io::Result<Option<T>> {
        Ok(self.cells.read().get(address).cloned())
    }

    fn await_all_durable(&self) -> io::Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::BrokenPipe))?;
        let (done, wait) = bounded(1);
        sender
            .send(Request::Barrier { done })
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        wait.recv()
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
    }
}

impl<T: Op> Drop for MemoryBackend<T> {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.worker.take() {
            if let Err(e) = handle.join() {
                info!("Failed to join memory backend worker: {:?}", e);
            }
        }
    }
}
