
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::NaiveDate;
use tracing_test::traced_test;

use booking::store::ReservationStore;
use mock_store::{MockStore, mk_event};
use reservation::{CoordinatorConfig, FixedClock, ReservationCoordinator, ReservationError};

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 3, d).unwrap()
}

fn coordinator(store: &MockStore, cfg: CoordinatorConfig) -> Arc<ReservationCoordinator> {
    Arc::new(ReservationCoordinator::new(
        Arc::new(store.clone()),
        Arc::new(FixedClock::new(date(3))),
        cfg,
    ))
}

fn quick_cfg() -> CoordinatorConfig {
    CoordinatorConfig {
        lock_wait: Duration::from_millis(500),
        max_attempts: 3,
        retry_backoff: Duration::from_millis(1),
        ..CoordinatorConfig::default()
    }
}

#[tokio::test]
async fn conflict_is_retried_with_fresh_read() -> anyhow::Result<()> {
    let store = MockStore::new();
    store.insert_direct(mk_event(1, 5, date(20))).await;
    store.force_conflicts(2);

    let c = coordinator(&store, quick_cfg());
    let receipt = c.reserve(1, 7).await?;

    assert_eq!(receipt.capacity_remaining, 4);
    assert_eq!(store.commits(), 3);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn exhausted_retries_surface_contention() -> anyhow::Result<()> {
    let store = MockStore::new();
    store.insert_direct(mk_event(1, 5, date(20))).await;
    store.force_conflicts(10);

    let c = coordinator(&store, quick_cfg());
    let err = c.reserve(1, 7).await.unwrap_err();

    assert!(matches!(err, ReservationError::Contention { attempts: 3 }));
    assert!(err.is_retryable());
    assert_eq!(store.commits(), 3);
    assert!(logs_contain("reporting contention"));

    // Nothing leaked into the ledger.
    let audit = store.audit(1).await?.unwrap();
    assert_eq!(audit.capacity_remaining, 5);
    assert_eq!(audit.reservations, 0);
    Ok(())
}

#[tokio::test]
async fn busy_database_is_retried_then_contention() -> anyhow::Result<()> {
    let store = MockStore::new();
    store.insert_direct(mk_event(1, 5, date(20))).await;

    let c = coordinator(&store, quick_cfg());

    store.force_busy(1);
    let receipt = c.reserve(1, 7).await?;
    assert_eq!(receipt.capacity_remaining, 4);
    assert_eq!(store.commits(), 2);

    store.force_busy(10);
    let err = c.reserve(1, 8).await.unwrap_err();
    assert!(matches!(err, ReservationError::Contention { attempts: 3 }));
    assert_eq!(err.code(), "contention");

    let audit = store.audit(1).await?.unwrap();
    assert_eq!(audit.capacity_remaining, 4);
    assert!(audit.is_consistent());
    Ok(())
}

#[tokio::test]
async fn preview_reads_the_event_once_and_returns_it() -> anyhow::Result<()> {
    let store = MockStore::new();
    store.insert_direct(mk_event(1, 5, date(20))).await;

    let c = coordinator(&store, quick_cfg());

    let preview = c.preview(1, 7).await?;
    assert!(preview.eligibility.is_eligible());
    assert_eq!(preview.event.map(|e| e.capacity_remaining), Some(5));
    assert_eq!(store.fetches(), 1);
    assert_eq!(store.commits(), 0);

    let missing = c.preview(2, 7).await?;
    assert!(missing.event.is_none());
    assert!(!missing.eligibility.is_eligible());
    Ok(())
}

#[tokio::test]
async fn caller_retry_after_contention_succeeds() -> anyhow::Result<()> {
    let store = MockStore::new();
    store.insert_direct(mk_event(1, 5, date(20))).await;
    store.force_conflicts(3);

    let c = coordinator(&store, quick_cfg());
    assert!(c.reserve(1, 7).await.unwrap_err().is_retryable());

    let receipt = c.reserve(1, 7).await?;
    assert_eq!(receipt.capacity_remaining, 4);
    Ok(())
}

#[tokio::test]
async fn lock_wait_timeout_is_contention() -> anyhow::Result<()> {
    let store = MockStore::new();
    store.insert_direct(mk_event(1, 5, date(20))).await;
    store.commit_delay_ms.store(300, Ordering::SeqCst);

    let c = coordinator(
        &store,
        CoordinatorConfig {
            lock_wait: Duration::from_millis(20),
            ..quick_cfg()
        },
    );

    let slow = {
        let c = c.clone();
        tokio::spawn(async move { c.reserve(1, 1).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = c.reserve(1, 2).await.unwrap_err();
    assert!(matches!(err, ReservationError::Contention { attempts: 1 }));

    assert!(slow.await?.is_ok());
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn storage_failure_on_read_propagates_unchanged() {
    let store = MockStore::new();
    store.insert_direct(mk_event(1, 5, date(20))).await;
    store.fail_reads.store(true, Ordering::SeqCst);

    let c = coordinator(&store, quick_cfg());
    let err = c.reserve(1, 7).await.unwrap_err();

    assert!(matches!(err, ReservationError::StorageFailure(_)));
    assert!(!err.is_retryable());
    assert_eq!(store.commits(), 0);
    assert!(logs_contain("reservation store failed"));

    let err = c.preview(1, 7).await.unwrap_err();
    assert!(matches!(err, ReservationError::StorageFailure(_)));
}

#[tokio::test]
async fn storage_failure_on_commit_is_not_retried() {
    let store = MockStore::new();
    store.insert_direct(mk_event(1, 5, date(20))).await;
    store.fail_commits.store(true, Ordering::SeqCst);

    let c = coordinator(&store, quick_cfg());
    let err = c.reserve(1, 7).await.unwrap_err();

    assert!(matches!(err, ReservationError::StorageFailure(_)));
    assert_eq!(store.commits(), 1);
}

#[tokio::test]
async fn zero_max_attempts_still_tries_once() -> anyhow::Result<()> {
    let store = MockStore::new();
    store.insert_direct(mk_event(1, 1, date(20))).await;

    let c = coordinator(
        &store,
        CoordinatorConfig {
            max_attempts: 0,
            ..quick_cfg()
        },
    );

    let receipt = c.reserve(1, 7).await?;
    assert_eq!(receipt.capacity_remaining, 0);

    let err = c.reserve(1, 8).await.unwrap_err();
    assert!(matches!(err, ReservationError::CapacityExhausted));
    Ok(())
}
