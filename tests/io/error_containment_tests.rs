use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cubeio::{Coordinator, CoordinatorConfig, CubeIoError, FlushError, SyncLevel};

use crate::common::fixtures::{Completion, Coords, Count, CounterEngine, ScriptedBackend};
use crate::common::logger::init_test_logger;
use crate::{assert_err, assert_ok};

fn setup(
    batch_size: usize,
    sync_level: SyncLevel,
) -> (Arc<ScriptedBackend>, Arc<Coordinator<CounterEngine>>) {
    init_test_logger();
    let backend = ScriptedBackend::new();
    let config = CoordinatorConfig::new(batch_size, Duration::from_secs(60), sync_level)
        .with_retry_interval(Duration::from_millis(5));
    let coordinator =
        assert_ok!(Coordinator::new(CounterEngine::hourly(), backend.clone(), config));
    (backend, Arc::new(coordinator))
}

fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not reached in time");
}

#[test]
fn failed_flush_rejects_every_later_nonblocking_write() {
    let (backend, coordinator) = setup(1, SyncLevel::BatchAsync);
    backend.complete_with(Completion::FailBackend);

    let handle = assert_ok!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 1)))
        .into_handle()
        .expect("batch of one flushes");
    assert!(handle.wait().is_err());
    let attempts = backend.attempts();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                for hour in 0..10 {
                    let coords = Coords::new("hits", t * 100 + hour);
                    let err = assert_err!(coordinator.write_nonblocking(Count(1), &coords));
                    assert!(matches!(err, CubeIoError::AsyncFailure(_)));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(backend.attempts(), attempts);
    assert_eq!(coordinator.pending_len(), 0);
    let stats = coordinator.stats();
    assert_eq!(stats.rejected_writes, 40);
    assert_eq!(stats.failed_flushes, 1);
}

#[test]
fn ignored_handle_still_trips_the_breaker() {
    let (backend, coordinator) = setup(1, SyncLevel::BatchAsync);
    backend.complete_with(Completion::FailIo);

    drop(assert_ok!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 1))));
    wait_until(|| coordinator.is_errored());

    let err = assert_err!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 2)));
    match err {
        CubeIoError::AsyncFailure(cause) => assert!(cause.is_io()),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(matches!(coordinator.async_error().as_deref(), Some(FlushError::Io(_))));
}

#[test]
fn writes_before_the_failure_lands_stay_accepted() {
    let (backend, coordinator) = setup(2, SyncLevel::BatchAsync);
    backend.complete_with(Completion::Hold);

    assert_ok!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 1)));
    let handle = assert_ok!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 2)))
        .into_handle()
        .expect("second address fills the batch");

    // The flush has not failed yet, so writes keep merging.
    assert_ok!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 3)));
    assert_eq!(coordinator.pending_len(), 1);

    backend.release_held(true);
    assert!(handle.wait().is_err());

    let err = assert_err!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 4)));
    assert!(matches!(err, CubeIoError::AsyncFailure(_)));
    assert_eq!(coordinator.pending_len(), 1);
}

#[test]
fn flush_is_refused_once_errored_and_keeps_buffered_writes() {
    let (backend, coordinator) = setup(2, SyncLevel::BatchAsync);
    backend.complete_with(Completion::Hold);

    let handle = {
        assert_ok!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 1)));
        assert_ok!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 2)))
            .into_handle()
            .expect("second address fills the batch")
    };
    assert_ok!(coordinator.write_nonblocking(Count(5), &Coords::new("hits", 3)));
    backend.release_held(true);
    assert!(handle.wait().is_err());

    let err = assert_err!(coordinator.flush());
    assert!(matches!(err, CubeIoError::AsyncFailure(_)));
    assert_eq!(coordinator.pending_len(), 1);
    assert_eq!(backend.submitted().len(), 1);
    assert_eq!(backend.durable_calls(), 0);
}

#[test]
fn abandoned_flush_surfaces_as_interruption() {
    let (backend, coordinator) = setup(1, SyncLevel::BatchSync);
    backend.complete_with(Completion::Hold);

    let writer = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || coordinator.write_blocking(Count(1), &Coords::new("hits", 1)))
    };
    wait_until(|| backend.held_count() == 1);
    backend.abandon_held();

    let err = assert_err!(writer.join().unwrap());
    match err {
        CubeIoError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::Interrupted),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(matches!(coordinator.async_error().as_deref(), Some(FlushError::Interrupted)));
}

#[test]
fn blocking_writes_see_async_failure_after_the_breaker_trips() {
    let (backend, coordinator) = setup(1, SyncLevel::BatchSync);
    backend.complete_with(Completion::FailIo);

    let err = assert_err!(coordinator.write_blocking(Count(1), &Coords::new("hits", 1)));
    assert!(matches!(err, CubeIoError::Io(_)));

    backend.complete_with(Completion::Succeed);
    let err = assert_err!(coordinator.write_blocking(Count(1), &Coords::new("hits", 2)));
    assert!(matches!(err, CubeIoError::AsyncFailure(_)));
    assert_eq!(backend.attempts(), 1);
}

#[test]
fn later_failure_replaces_the_recorded_cause() {
    let (backend, coordinator) = setup(1, SyncLevel::BatchAsync);

    backend.complete_with(Completion::Hold);
    let held = assert_ok!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 1)))
        .into_handle()
        .expect("batch of one flushes");

    backend.complete_with(Completion::FailIo);
    let failed = assert_ok!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 2)))
        .into_handle()
        .expect("batch of one flushes");
    assert!(failed.wait().is_err());
    assert!(matches!(coordinator.async_error().as_deref(), Some(FlushError::Io(_))));

    backend.release_held(true);
    assert!(held.wait().is_err());
    assert!(matches!(coordinator.async_error().as_deref(), Some(FlushError::Backend(_))));
}

#[test]
fn dropping_the_coordinator_interrupts_outstanding_handles() {
    let (backend, coordinator) = setup(1, SyncLevel::BatchAsync);
    backend.complete_with(Completion::Hold);

    let handle = assert_ok!(coordinator.write_nonblocking(Count(1), &Coords::new("hits", 1)))
        .into_handle()
        .expect("batch of one flushes");
    drop(coordinator);

    let result = handle.wait();
    assert!(matches!(result.err().as_deref(), Some(FlushError::Interrupted)));
}
