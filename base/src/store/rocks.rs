use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tcc_core::{CoordinatorError, Transaction, TxStatus};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use super::{apply_component_status, hanging_index_key, submit_outcome, TxStore};
use crate::db::{DbError, TypedDB, DB};

const ENTITY: &str = "tx_store";
// Keys MUST not be given multiple uses within this entity's namespace.
const TX: &str = "tx_";
const HANGING_INDEX: &str = "hanging_index_";
const COUNTER: &str = "next_id_";
const LOCK: &str = "lock_";

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(20);

fn store_err(e: DbError) -> CoordinatorError {
    CoordinatorError::StorageError(Box::new(e))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockRecord {
    holder: String,
    expires_at: chrono::DateTime<Utc>,
}

/// A crash-safe [`TxStore`] backed by an embedded RocksDB instance.
///
/// Transactions are stored one-row-per-id under the `tx_` prefix. A secondary index under
/// `hanging_index_`, keyed by `(createdAt, id)`, lets [`TxStore::get_hanging_txs`] scan
/// ascending by creation time without a full table walk; the index entry is removed the
/// moment a transaction leaves `Hanging`. The advisory lock lives in the same database as a
/// single record carrying a holder id and an expiry, acquired via a read-then-write guarded
/// by an in-process mutex (cross-process mutual exclusion still relies on RocksDB's own
/// single-writer-per-directory guarantee, same as every other table in this store).
#[derive(Clone)]
pub struct RocksTxStore {
    db: TypedDB,
    instance_id: String,
    write_lock: Arc<AsyncMutex<()>>,
}

impl RocksTxStore {
    /// Open (or create) a store at `db`, identifying this process as `instance_id` for lock
    /// ownership and log fields.
    pub fn new(db: DB, instance_id: impl Into<String>) -> Self {
        Self {
            db: TypedDB::new(ENTITY.to_owned(), db),
            instance_id: instance_id.into(),
            write_lock: Arc::new(AsyncMutex::new(())),
        }
    }

    fn index_hanging(&self, tx: &Transaction) -> Result<(), DbError> {
        let key = hanging_index_key(tx.created_at, tx.id);
        self.db.store_keyed_encodable(HANGING_INDEX, &key, &tx.id)
    }

    fn remove_hanging_index(&self, tx: &Transaction) -> Result<(), DbError> {
        let key = hanging_index_key(tx.created_at, tx.id);
        self.db.delete_keyed(HANGING_INDEX, &key)
    }

    fn try_acquire(&self, expire: Duration) -> Result<bool, CoordinatorError> {
        let now = Utc::now();
        let current: Option<LockRecord> = self
            .db
            .retrieve_decodable(ENTITY, LOCK)
            .map_err(store_err)?;
        if let Some(rec) = &current {
            if rec.expires_at > now && rec.holder != self.instance_id {
                return Ok(false);
            }
        }
        let lease = chrono::Duration::from_std(expire).unwrap_or_else(|_| chrono::Duration::zero());
        let record = LockRecord {
            holder: self.instance_id.clone(),
            expires_at: now + lease,
        };
        self.db
            .store_encodable(ENTITY, LOCK, &record)
            .map_err(store_err)?;
        Ok(true)
    }
}

#[async_trait]
impl TxStore for RocksTxStore {
    #[tracing::instrument(skip(self), err)]
    async fn create_tx(&self, participant_ids: &[String]) -> Result<u64, CoordinatorError> {
        let _guard = self.write_lock.lock().await;
        let next_id = self
            .db
            .retrieve_decodable::<u64>(ENTITY, COUNTER)
            .map_err(store_err)?
            .unwrap_or(0)
            + 1;
        self.db
            .store_encodable(ENTITY, COUNTER, &next_id)
            .map_err(store_err)?;

        let tx = Transaction::new(next_id, participant_ids, Utc::now());
        self.db
            .store_keyed_encodable(TX, &next_id, &tx)
            .map_err(store_err)?;
        self.index_hanging(&tx).map_err(store_err)?;
        Ok(next_id)
    }

    #[tracing::instrument(skip(self), err)]
    async fn tx_update_component_status(
        &self,
        tx_id: u64,
        participant_id: &str,
        accept: bool,
    ) -> Result<(), CoordinatorError> {
        let _guard = self.write_lock.lock().await;
        let mut tx: Transaction = self
            .db
            .retrieve_keyed_decodable(TX, &tx_id)
            .map_err(store_err)?
            .ok_or(CoordinatorError::TransactionNotFound { tx_id })?;

        if apply_component_status(&mut tx, participant_id, accept)? {
            self.db
                .store_keyed_encodable(TX, &tx_id, &tx)
                .map_err(store_err)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), err)]
    async fn tx_submit(&self, tx_id: u64, success: bool) -> Result<(), CoordinatorError> {
        let _guard = self.write_lock.lock().await;
        let mut tx: Transaction = self
            .db
            .retrieve_keyed_decodable(TX, &tx_id)
            .map_err(store_err)?
            .ok_or(CoordinatorError::TransactionNotFound { tx_id })?;

        match submit_outcome(tx_id, tx.status, success)? {
            None => Ok(()),
            Some(status) => {
                tx.status = status;
                self.remove_hanging_index(&tx).map_err(store_err)?;
                self.db
                    .store_keyed_encodable(TX, &tx_id, &tx)
                    .map_err(store_err)?;
                Ok(())
            }
        }
    }

    #[tracing::instrument(skip(self), err)]
    async fn get_hanging_txs(&self, limit: usize) -> Result<Vec<Transaction>, CoordinatorError> {
        let guard = self.write_lock.lock().await;
        let ids: Vec<u64> = self
            .db
            .prefix_iterator::<u64>(HANGING_INDEX)
            .take(limit)
            .collect();
        drop(guard);

        let mut txs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(tx) = self
                .db
                .retrieve_keyed_decodable::<_, Transaction>(TX, &id)
                .map_err(store_err)?
            {
                if tx.status == TxStatus::Hanging {
                    txs.push(tx);
                }
            }
        }
        Ok(txs)
    }

    #[tracing::instrument(skip(self), err)]
    async fn get_tx(&self, tx_id: u64) -> Result<Transaction, CoordinatorError> {
        self.db
            .retrieve_keyed_decodable(TX, &tx_id)
            .map_err(store_err)?
            .ok_or(CoordinatorError::TransactionNotFound { tx_id })
    }

    #[tracing::instrument(skip(self), err)]
    async fn lock(&self, expire: Duration) -> Result<(), CoordinatorError> {
        let deadline = Instant::now() + expire;
        loop {
            {
                let _guard = self.write_lock.lock().await;
                if self.try_acquire(expire)? {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(CoordinatorError::LockAcquisitionError(format!(
                    "could not acquire lock within {expire:?}"
                )));
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL.min(expire)).await;
        }
    }

    #[tracing::instrument(skip(self))]
    async fn unlock(&self) {
        let _guard = self.write_lock.lock().await;
        let current: Result<Option<LockRecord>, _> = self.db.retrieve_decodable(ENTITY, LOCK);
        if let Ok(Some(rec)) = current {
            if rec.holder == self.instance_id {
                let _ = self.db.delete(ENTITY, LOCK);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::run_test_db;

    #[tokio::test]
    async fn create_get_and_submit_round_trip() {
        run_test_db(|db| async move {
            let store = RocksTxStore::new(db, "instance-a");
            let id = store
                .create_tx(&["a".to_string(), "b".to_string()])
                .await
                .unwrap();

            let tx = store.get_tx(id).await.unwrap();
            assert_eq!(tx.status, TxStatus::Hanging);

            store
                .tx_update_component_status(id, "a", true)
                .await
                .unwrap();
            store
                .tx_update_component_status(id, "b", true)
                .await
                .unwrap();

            let hanging = store.get_hanging_txs(100).await.unwrap();
            assert_eq!(hanging.len(), 1);

            store.tx_submit(id, true).await.unwrap();
            // idempotent
            store.tx_submit(id, true).await.unwrap();

            let tx = store.get_tx(id).await.unwrap();
            assert_eq!(tx.status, TxStatus::Successful);

            let hanging = store.get_hanging_txs(100).await.unwrap();
            assert!(hanging.is_empty());
        })
        .await;
    }

    #[tokio::test]
    async fn conflicting_submit_after_terminal_is_rejected() {
        run_test_db(|db| async move {
            let store = RocksTxStore::new(db, "instance-a");
            let id = store.create_tx(&["a".to_string()]).await.unwrap();
            store.tx_submit(id, true).await.unwrap();
            let err = store.tx_submit(id, false).await.unwrap_err();
            assert!(matches!(
                err,
                CoordinatorError::InvalidTransactionState { .. }
            ));
        })
        .await;
    }

    #[tokio::test]
    async fn first_writer_wins_on_component_status() {
        run_test_db(|db| async move {
            let store = RocksTxStore::new(db, "instance-a");
            let id = store.create_tx(&["a".to_string()]).await.unwrap();
            store
                .tx_update_component_status(id, "a", false)
                .await
                .unwrap();
            // a late "success" update must not clobber the earlier failure
            store
                .tx_update_component_status(id, "a", true)
                .await
                .unwrap();
            let tx = store.get_tx(id).await.unwrap();
            assert_eq!(
                tx.participant_statuses["a"].try_status,
                tcc_core::TryStatus::Failure
            );
        })
        .await;
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_released_or_expired() {
        run_test_db(|db| async move {
            let a = RocksTxStore::new(db.clone(), "instance-a");
            let b = RocksTxStore::new(db, "instance-b");

            a.lock(Duration::from_secs(5)).await.unwrap();
            let err = b.lock(Duration::from_millis(50)).await.unwrap_err();
            assert!(matches!(err, CoordinatorError::LockAcquisitionError(_)));

            a.unlock().await;
            b.lock(Duration::from_secs(5)).await.unwrap();
        })
        .await;
    }
}
