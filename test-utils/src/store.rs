//! An in-memory [`TxStore`] for unit and integration tests. Not crash-safe and never
//! durable across a process restart — use [`tcc_base::store::RocksTxStore`] for that.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tcc_base::TxStore;
use tcc_core::{CoordinatorError, Transaction, TryStatus, TxStatus};
use tokio::time::Instant;

#[derive(Default)]
struct State {
    next_id: u64,
    txs: HashMap<u64, Transaction>,
    lock_expires_at: Option<Instant>,
}

/// An in-memory, single-process [`TxStore`] backed by a `parking_lot::Mutex`.
#[derive(Clone, Default)]
pub struct InMemoryTxStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryTxStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions currently recorded, for test assertions.
    pub fn len(&self) -> usize {
        self.state.lock().txs.len()
    }

    /// Whether no transactions have been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TxStore for InMemoryTxStore {
    async fn create_tx(&self, participant_ids: &[String]) -> Result<u64, CoordinatorError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        let tx = Transaction::new(id, participant_ids, Utc::now());
        state.txs.insert(id, tx);
        Ok(id)
    }

    async fn tx_update_component_status(
        &self,
        tx_id: u64,
        participant_id: &str,
        accept: bool,
    ) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock();
        let tx = state
            .txs
            .get_mut(&tx_id)
            .ok_or(CoordinatorError::TransactionNotFound { tx_id })?;
        let entry = tx
            .participant_statuses
            .get_mut(participant_id)
            .ok_or(CoordinatorError::TransactionNotFound { tx_id })?;
        if entry.try_status == TryStatus::Hanging {
            entry.try_status = if accept {
                TryStatus::Successful
            } else {
                TryStatus::Failure
            };
        }
        Ok(())
    }

    async fn tx_submit(&self, tx_id: u64, success: bool) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock();
        let tx = state
            .txs
            .get_mut(&tx_id)
            .ok_or(CoordinatorError::TransactionNotFound { tx_id })?;
        let desired = if success {
            TxStatus::Successful
        } else {
            TxStatus::Failure
        };
        if tx.status == desired {
            return Ok(());
        }
        if tx.status.is_terminal() {
            return Err(CoordinatorError::InvalidTransactionState {
                tx_id,
                attempted: desired,
            });
        }
        tx.status = desired;
        Ok(())
    }

    async fn get_hanging_txs(&self, limit: usize) -> Result<Vec<Transaction>, CoordinatorError> {
        let state = self.state.lock();
        let mut hanging: Vec<Transaction> = state
            .txs
            .values()
            .filter(|tx| tx.status == TxStatus::Hanging)
            .cloned()
            .collect();
        hanging.sort_by_key(|tx| (tx.created_at, tx.id));
        hanging.truncate(limit);
        Ok(hanging)
    }

    async fn get_tx(&self, tx_id: u64) -> Result<Transaction, CoordinatorError> {
        self.state
            .lock()
            .txs
            .get(&tx_id)
            .cloned()
            .ok_or(CoordinatorError::TransactionNotFound { tx_id })
    }

    async fn lock(&self, expire: Duration) -> Result<(), CoordinatorError> {
        let deadline = Instant::now() + expire;
        loop {
            {
                let mut state = self.state.lock();
                let available = state
                    .lock_expires_at
                    .map(|exp| Instant::now() >= exp)
                    .unwrap_or(true);
                if available {
                    state.lock_expires_at = Some(Instant::now() + expire);
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(CoordinatorError::LockAcquisitionError(
                    "in-memory lock busy".to_string(),
                ));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn unlock(&self) {
        self.state.lock().lock_expires_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_and_submit_round_trip() {
        let store = InMemoryTxStore::new();
        let id = store
            .create_tx(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(store.len(), 1);

        store.tx_update_component_status(id, "a", true).await.unwrap();
        let tx = store.get_tx(id).await.unwrap();
        assert_eq!(tx.participant_statuses["a"].try_status, TryStatus::Successful);
        assert_eq!(tx.participant_statuses["b"].try_status, TryStatus::Hanging);

        store.tx_submit(id, true).await.unwrap();
        let tx = store.get_tx(id).await.unwrap();
        assert_eq!(tx.status, TxStatus::Successful);
    }

    #[tokio::test]
    async fn conflicting_submit_after_terminal_is_rejected() {
        let store = InMemoryTxStore::new();
        let id = store.create_tx(&["a".to_string()]).await.unwrap();
        store.tx_submit(id, true).await.unwrap();
        let err = store.tx_submit(id, false).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidTransactionState { .. }));
    }

    #[tokio::test]
    async fn first_writer_wins_on_component_status() {
        let store = InMemoryTxStore::new();
        let id = store.create_tx(&["a".to_string()]).await.unwrap();
        store.tx_update_component_status(id, "a", true).await.unwrap();
        store.tx_update_component_status(id, "a", false).await.unwrap();
        let tx = store.get_tx(id).await.unwrap();
        assert_eq!(tx.participant_statuses["a"].try_status, TryStatus::Successful);
    }

    #[tokio::test]
    async fn hanging_txs_are_ordered_by_creation_and_capped() {
        let store = InMemoryTxStore::new();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(store.create_tx(&["a".to_string()]).await.unwrap());
        }
        let hanging = store.get_hanging_txs(3).await.unwrap();
        assert_eq!(hanging.len(), 3);
        assert_eq!(hanging[0].id, ids[0]);
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_released_or_expired() {
        let store = InMemoryTxStore::new();
        store.lock(Duration::from_millis(500)).await.unwrap();

        let other = store.clone();
        let attempt = tokio::time::timeout(
            Duration::from_millis(50),
            other.lock(Duration::from_millis(500)),
        )
        .await;
        assert!(attempt.is_err(), "lock should still be held");

        store.unlock().await;
        other.lock(Duration::from_millis(500)).await.unwrap();
    }
}
