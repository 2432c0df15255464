use std::sync::Arc;
use std::time::Duration;

use mockall::predicate::eq;
use tokio::runtime::Handle;

use super::*;
use crate::metrics::DELAYED_FLUSH_FAILURES_METRIC;
use crate::InMemoryJournal;
use crate::ASQN_IGNORE;

fn journal_with(count: u64) -> Arc<dyn Journal> {
    let journal = InMemoryJournal::default();
    for i in 0..count {
        journal.append(ASQN_IGNORE, &i.to_le_bytes()).unwrap();
    }
    Arc::new(journal)
}

fn meta_expecting(
    index: u64,
    times: usize,
) -> Arc<dyn FlushMetaStore> {
    let mut meta_store = MockFlushMetaStore::new();
    meta_store
        .expect_store_last_flushed_index()
        .with(eq(index))
        .times(times)
        .returning(|_| Ok(()));
    Arc::new(meta_store)
}

#[test]
fn test_direct_flush_publishes_last_index() {
    let journal = journal_with(3);
    let mut flusher = DirectFlusher::new(meta_expecting(3, 1), "direct-test");

    flusher.flush(&journal).unwrap();

    assert!(flusher.is_direct());
    assert!(flusher.close().is_ok());
}

#[test]
fn test_direct_flush_fails_on_closed_journal() {
    let journal = journal_with(1);
    journal.close().unwrap();
    let mut flusher = DirectFlusher::new(meta_expecting(1, 0), "direct-test");

    assert!(flusher.flush(&journal).is_err());
}

#[test]
fn test_noop_never_touches_the_watermark() {
    let journal = journal_with(2);
    let mut flusher = NoopFlusher;

    flusher.flush(&journal).unwrap();
    assert!(!flusher.is_direct());
}

#[tokio::test(start_paused = true)]
async fn test_delayed_flush_coalesces_requests() {
    let journal = journal_with(5);
    let mut flusher = DelayedFlusher::new(
        Duration::from_millis(10),
        meta_expecting(5, 1),
        Handle::current(),
        "delayed-test",
    );

    flusher.flush(&journal).unwrap();
    flusher.flush(&journal).unwrap();
    flusher.flush(&journal).unwrap();
    assert!(flusher.has_pending_flush());
    assert!(!flusher.is_direct());

    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!flusher.has_pending_flush());
    flusher.close().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_delayed_flush_reschedules_after_completion() {
    let journal = journal_with(1);
    let mut meta_store = MockFlushMetaStore::new();
    let mut sequence = mockall::Sequence::new();
    meta_store
        .expect_store_last_flushed_index()
        .with(eq(1))
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Ok(()));
    meta_store
        .expect_store_last_flushed_index()
        .with(eq(2))
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Ok(()));
    let mut flusher = DelayedFlusher::new(
        Duration::from_millis(10),
        Arc::new(meta_store),
        Handle::current(),
        "delayed-test",
    );

    flusher.flush(&journal).unwrap();
    tokio::time::sleep(Duration::from_millis(15)).await;

    journal.append(ASQN_IGNORE, b"second").unwrap();
    flusher.flush(&journal).unwrap();
    assert!(flusher.has_pending_flush());
    tokio::time::sleep(Duration::from_millis(15)).await;

    flusher.close().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_delayed_flush_runs_off_the_runtime_thread() {
    let journal = journal_with(3);
    let flushed_on = Arc::new(parking_lot::Mutex::new(None));
    let recorder = flushed_on.clone();
    let mut meta_store = MockFlushMetaStore::new();
    meta_store
        .expect_store_last_flushed_index()
        .with(eq(3))
        .times(1)
        .returning(move |_| {
            *recorder.lock() = Some(std::thread::current().id());
            Ok(())
        });
    let mut flusher = DelayedFlusher::new(
        Duration::from_millis(10),
        Arc::new(meta_store),
        Handle::current(),
        "delayed-test",
    );

    flusher.flush(&journal).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let thread = flushed_on.lock().expect("delayed flush did not run");
    assert_ne!(thread, std::thread::current().id());
    flusher.close().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_pending_flush() {
    let journal = journal_with(2);
    let mut flusher = DelayedFlusher::new(
        Duration::from_millis(10),
        meta_expecting(2, 0),
        Handle::current(),
        "delayed-test",
    );

    flusher.flush(&journal).unwrap();
    flusher.close().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // requests after close are ignored
    flusher.flush(&journal).unwrap();
    assert!(!flusher.has_pending_flush());
}

#[tokio::test(start_paused = true)]
async fn test_delayed_flush_skips_closed_journal() {
    let journal = journal_with(2);
    let mut flusher = DelayedFlusher::new(
        Duration::from_millis(10),
        meta_expecting(2, 0),
        Handle::current(),
        "delayed-test",
    );

    flusher.flush(&journal).unwrap();
    journal.close().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(flusher.close().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_delayed_flush_failure_surfaces_as_fatal() {
    let partition = "delayed-failure-test";
    let before = DELAYED_FLUSH_FAILURES_METRIC.with_label_values(&[partition]).get();
    let journal = journal_with(4);
    let mut meta_store = MockFlushMetaStore::new();
    meta_store
        .expect_store_last_flushed_index()
        .times(1)
        .returning(|_| Err(Error::Fatal("meta file unavailable".to_string())));
    let mut flusher = DelayedFlusher::new(
        Duration::from_millis(10),
        Arc::new(meta_store),
        Handle::current(),
        partition,
    );

    flusher.flush(&journal).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    match flusher.flush(&journal) {
        Err(Error::Fatal(message)) => assert!(message.contains("meta file unavailable")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(
        DELAYED_FLUSH_FAILURES_METRIC.with_label_values(&[partition]).get(),
        before + 1
    );
}

#[tokio::test]
async fn test_build_flusher_per_strategy() {
    let meta_store = meta_expecting(0, 0);

    let direct = build_flusher(FlushConfig::Direct, meta_store.clone(), None, "p").unwrap();
    assert!(direct.is_direct());

    let noop = build_flusher(FlushConfig::Noop, meta_store.clone(), None, "p").unwrap();
    assert!(!noop.is_direct());

    let delayed = build_flusher(FlushConfig::Delayed { delay_ms: 5 }, meta_store.clone(), None, "p").unwrap();
    assert!(!delayed.is_direct());

    assert!(matches!(
        build_flusher(FlushConfig::Delayed { delay_ms: 0 }, meta_store, None, "p"),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_delayed_flusher_requires_runtime() {
    let result = build_flusher(FlushConfig::Delayed { delay_ms: 5 }, meta_expecting(0, 0), None, "p");
    assert!(matches!(result, Err(Error::Config(_))));
}
