//! End-to-end scenarios exercising a [`TxManager`] wired to the in-memory test store and
//! scripted participants, covering the lifecycle engine's happy path, failure path, timeout,
//! retry-then-success, and crash-recovery-via-monitor scenarios.

use std::sync::Arc;
use std::time::Duration;

use coordinator::{TxManager, TxManagerConfig};
use prometheus::Registry;
use tcc_base::{CoreMetrics, TxStore};
use tcc_core::{CoordinatorError, TryStatus, TxStatus};
use tcc_retry::RetryConfig;
use tcc_test_utils::{InMemoryTxStore, ScriptedParticipant};

fn metrics() -> Arc<CoreMetrics> {
    Arc::new(CoreMetrics::new("coordinator-test", Registry::new()).unwrap())
}

fn config(timeout: Duration) -> TxManagerConfig {
    TxManagerConfig {
        timeout,
        monitor_interval: Duration::from_millis(30),
        enable_monitor: false,
        retry: RetryConfig {
            max_retries: 5,
            base_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter_ms: 1,
        },
    }
}

#[tokio::test]
async fn s1_happy_path_two_participants() {
    let store = Arc::new(InMemoryTxStore::new());
    let manager = TxManager::new(store.clone(), metrics(), config(Duration::from_secs(5)), "a");

    let a = ScriptedParticipant::always_ok("a");
    let b = ScriptedParticipant::always_ok("b");
    manager.register(a.clone()).unwrap();
    manager.register(b.clone()).unwrap();

    let outcome = manager.start_transaction().await.unwrap();
    assert!(outcome.succeeded());

    let tx = store.get_tx(outcome.tx_id()).await.unwrap();
    assert_eq!(tx.status, TxStatus::Successful);
    assert_eq!(tx.participant_statuses["a"].try_status, TryStatus::Successful);
    assert_eq!(tx.participant_statuses["b"].try_status, TryStatus::Successful);

    assert_eq!(a.confirm_call_count(), 1);
    assert_eq!(b.confirm_call_count(), 1);
    assert_eq!(a.cancel_call_count(), 0);
    assert_eq!(b.cancel_call_count(), 0);
}

#[tokio::test]
async fn s2_one_try_fails() {
    let store = Arc::new(InMemoryTxStore::new());
    let manager = TxManager::new(store.clone(), metrics(), config(Duration::from_secs(5)), "a");

    let a = ScriptedParticipant::always_ok("a");
    let b = ScriptedParticipant::try_rejects("b");
    manager.register(a.clone()).unwrap();
    manager.register(b.clone()).unwrap();

    let outcome = manager.start_transaction().await.unwrap();
    assert!(!outcome.succeeded());

    let tx = store.get_tx(outcome.tx_id()).await.unwrap();
    assert_eq!(tx.status, TxStatus::Failure);
    assert_eq!(tx.participant_statuses["b"].try_status, TryStatus::Failure);

    assert_eq!(a.cancel_call_count(), 1);
    assert_eq!(b.cancel_call_count(), 1);
    assert_eq!(a.confirm_call_count(), 0);
    assert_eq!(b.confirm_call_count(), 0);
}

#[tokio::test]
async fn s3_try_timeout_aborts_and_cancels() {
    let store = Arc::new(InMemoryTxStore::new());
    let manager = TxManager::new(
        store.clone(),
        metrics(),
        config(Duration::from_millis(50)),
        "a",
    );

    let a = ScriptedParticipant::try_hangs("a");
    let b = ScriptedParticipant::always_ok("b");
    manager.register(a.clone()).unwrap();
    manager.register(b.clone()).unwrap();

    let started = std::time::Instant::now();
    let outcome = manager.start_transaction().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!outcome.succeeded());

    // The timed-out Try phase records a's still-outstanding try as Failure itself, so the
    // foreground advance already called by start_transaction drives this straight to
    // Failure with both participants cancelled, with no manual store write needed.
    let tx = store.get_tx(outcome.tx_id()).await.unwrap();
    assert_eq!(tx.status, TxStatus::Failure);
    assert_eq!(tx.participant_statuses["a"].try_status, TryStatus::Failure);

    assert_eq!(a.cancel_call_count(), 1);
    assert_eq!(b.cancel_call_count(), 1);
}

#[tokio::test]
async fn s4_confirm_transient_failure_then_success() {
    let store = Arc::new(InMemoryTxStore::new());
    let manager = TxManager::new(store.clone(), metrics(), config(Duration::from_secs(5)), "a");

    let a = ScriptedParticipant::confirm_fails_then_ok("a", 2);
    manager.register(a.clone()).unwrap();

    let outcome = manager.start_transaction().await.unwrap();
    assert!(outcome.succeeded());

    let tx = store.get_tx(outcome.tx_id()).await.unwrap();
    assert_eq!(tx.status, TxStatus::Successful);
    // 2 failures + 1 success = 3 calls.
    assert_eq!(a.confirm_call_count(), 3);

    // tx_submit is idempotent; a second advance is a no-op rather than a double-confirm.
    manager
        .advance_transaction_progress(outcome.tx_id())
        .await
        .unwrap();
    assert_eq!(a.confirm_call_count(), 3);
}

#[tokio::test]
async fn s5_crash_recovery_via_monitor() {
    let store = Arc::new(InMemoryTxStore::new());
    let manager = TxManager::new(
        store.clone(),
        metrics(),
        TxManagerConfig {
            enable_monitor: true,
            monitor_interval: Duration::from_millis(20),
            ..config(Duration::from_secs(5))
        },
        "a",
    );

    let a = ScriptedParticipant::always_ok("a");
    let b = ScriptedParticipant::always_ok("b");
    manager.register(a.clone()).unwrap();
    manager.register(b.clone()).unwrap();

    // Simulate a crash after both per-participant Try statuses were durably recorded as
    // successful, but before the coordinator called AdvanceTransactionProgress/TXSubmit.
    let tx_id = store
        .create_tx(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    store.tx_update_component_status(tx_id, "a", true).await.unwrap();
    store.tx_update_component_status(tx_id, "b", true).await.unwrap();

    let tx = store.get_tx(tx_id).await.unwrap();
    assert_eq!(tx.status, TxStatus::Hanging);

    manager.start_monitor().await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    manager.stop().await;

    let tx = store.get_tx(tx_id).await.unwrap();
    assert_eq!(tx.status, TxStatus::Successful);
    assert_eq!(a.confirm_call_count(), 1);
    assert_eq!(b.confirm_call_count(), 1);
}

#[tokio::test]
async fn s6_duplicate_registration_is_rejected() {
    let store = Arc::new(InMemoryTxStore::new());
    let manager = TxManager::new(store, metrics(), config(Duration::from_secs(5)), "a");

    manager
        .register(ScriptedParticipant::always_ok("x"))
        .unwrap();
    let err = manager
        .register(ScriptedParticipant::always_ok("x"))
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::DuplicateParticipant { .. }));
}

#[tokio::test]
async fn zero_participants_is_rejected() {
    let store = Arc::new(InMemoryTxStore::new());
    let manager = TxManager::new(store, metrics(), config(Duration::from_secs(5)), "a");

    let err = manager.start_transaction().await.unwrap_err();
    assert!(matches!(err, CoordinatorError::NoParticipantsRegistered));
}
