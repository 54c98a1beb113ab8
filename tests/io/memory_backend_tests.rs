use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cubeio::{Coordinator, CoordinatorConfig, CubeIoError, MemoryBackend, SyncLevel, WriteOutcome};

use crate::common::fixtures::{Coords, Count, CounterEngine};
use crate::common::logger::init_test_logger;
use crate::{assert_err, assert_ok};

fn coordinator(
    backend: Arc<MemoryBackend<Count>>,
    batch_size: usize,
    sync_level: SyncLevel,
) -> Arc<Coordinator<CounterEngine>> {
    init_test_logger();
    let config = CoordinatorConfig::new(batch_size, Duration::from_secs(10), sync_level)
        .with_retry_interval(Duration::from_millis(1));
    Arc::new(assert_ok!(Coordinator::new(CounterEngine::with_rollup(), backend, config)))
}

#[test]
fn concurrent_batched_writes_sum_up_after_flush() {
    let backend = Arc::new(MemoryBackend::new());
    let coordinator = coordinator(Arc::clone(&backend), 16, SyncLevel::BatchSync);

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                for i in 0..250 {
                    assert_ok!(coordinator.write_blocking(Count(1), &Coords::new("hits", i % 24)));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    assert_ok!(coordinator.flush());

    let total = assert_ok!(coordinator.read(&CounterEngine::total_address("hits")));
    assert_eq!(total, Some(Count(1000)));

    let mut hourly = 0;
    for hour in 0..24 {
        if let Some(Count(n)) = assert_ok!(coordinator.read(&Coords::new("hits", hour).address())) {
            hourly += n;
        }
    }
    assert_eq!(hourly, 1000);
    assert_eq!(coordinator.pending_len(), 0);
    assert_eq!(coordinator.in_flight_flushes(), 0);
}

#[test]
fn shallow_queue_is_ridden_out_by_retries() {
    let backend = Arc::new(MemoryBackend::with_queue_depth(1));
    let coordinator = coordinator(Arc::clone(&backend), 1, SyncLevel::BatchAsync);

    let mut handles = Vec::new();
    for i in 0..200 {
        if let WriteOutcome::Flushed(handle) =
            assert_ok!(coordinator.write_nonblocking(Count(2), &Coords::new("bytes", i % 5)))
        {
            handles.push(handle);
        }
    }
    for handle in handles {
        assert_ok!(handle.wait());
    }
    assert_ok!(coordinator.flush());

    assert_eq!(
        assert_ok!(coordinator.read(&CounterEngine::total_address("bytes"))),
        Some(Count(400))
    );
    let stats = coordinator.stats();
    assert_eq!(stats.completed_flushes, stats.batches_dispatched);
    assert_eq!(stats.failed_flushes, 0);
}

#[test]
fn injected_backend_failure_stops_writes() {
    let backend = Arc::new(MemoryBackend::new());
    let coordinator = coordinator(Arc::clone(&backend), 2, SyncLevel::FullSync);
    backend.fail_next(1);

    let err = assert_err!(coordinator.write_blocking(Count(1), &Coords::new("hits", 0)));
    assert!(matches!(err, CubeIoError::Io(_)));
    assert!(backend.is_empty());

    let err = assert_err!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 1)));
    assert!(matches!(err, CubeIoError::AsyncFailure(_)));
    assert_eq!(backend.applied_batches(), 0);
}

#[test]
fn full_sync_write_is_readable_once_it_returns() {
    let backend = Arc::new(MemoryBackend::new());
    let coordinator = coordinator(Arc::clone(&backend), 100, SyncLevel::FullSync);

    assert_ok!(coordinator.write_blocking(Count(7), &Coords::new("hits", 3)));

    assert_eq!(
        assert_ok!(coordinator.read(&Coords::new("hits", 3).address())),
        Some(Count(7))
    );
    assert_eq!(backend.applied_batches(), 1);
    assert_eq!(backend.len(), 2);
}
