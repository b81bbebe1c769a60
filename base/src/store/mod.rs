//! The durable transaction log and the cluster-wide advisory lock the `Monitor` serializes
//! on, plus a concrete RocksDB-backed implementation of both.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tcc_core::{CoordinatorError, Transaction, TryStatus, TxStatus};

mod rocks;
pub use rocks::RocksTxStore;

/// The storage contract the coordinator core depends on: a durable log of transactions and
/// per-participant try-statuses, plus a cluster-wide advisory mutex used by the `Monitor`.
///
/// Implementations MUST honor atomicity per operation and durability of successful writes;
/// beyond that, any backend (embedded KV, SQL, in-memory) is acceptable. See `tcc-test-utils`
/// for an in-memory implementation used by unit and integration tests.
#[async_trait]
pub trait TxStore: Send + Sync {
    /// Write a new transaction with every participant entry `Hanging`, returning the
    /// store-assigned, monotonically increasing id.
    async fn create_tx(&self, participant_ids: &[String]) -> Result<u64, CoordinatorError>;

    /// Atomically set `participantStatuses[participant_id].tryStatus`. Once an entry has left
    /// `Hanging` it never changes again (first-writer-wins), so a late update racing an
    /// earlier one is silently ignored rather than clobbering it.
    async fn tx_update_component_status(
        &self,
        tx_id: u64,
        participant_id: &str,
        accept: bool,
    ) -> Result<(), CoordinatorError>;

    /// Atomically set the top-level aggregate status. Idempotent for the same
    /// `(tx_id, success)` pair; fails with `InvalidTransactionState` if the transaction is
    /// already terminal with the opposite outcome.
    async fn tx_submit(&self, tx_id: u64, success: bool) -> Result<(), CoordinatorError>;

    /// Transactions still `Hanging`, ordered ascending by `createdAt`, capped at `limit`.
    async fn get_hanging_txs(&self, limit: usize) -> Result<Vec<Transaction>, CoordinatorError>;

    /// Fetch a single transaction by id.
    async fn get_tx(&self, tx_id: u64) -> Result<Transaction, CoordinatorError>;

    /// Block up to `expire` attempting to acquire the cluster-wide advisory lock; the
    /// acquired lease itself is also valid for `expire` before it is considered abandoned.
    async fn lock(&self, expire: Duration) -> Result<(), CoordinatorError>;

    /// Release whatever this store instance holds. A no-op if nothing is held.
    async fn unlock(&self);
}

/// Shared helper: derive the next aggregate status a submit would apply, used by both the
/// Rocks and in-memory stores to keep the idempotence/terminal-state rules identical.
pub(crate) fn submit_outcome(
    tx_id: u64,
    current: TxStatus,
    success: bool,
) -> Result<Option<TxStatus>, CoordinatorError> {
    let desired = if success {
        TxStatus::Successful
    } else {
        TxStatus::Failure
    };
    if current == desired {
        return Ok(None);
    }
    if current.is_terminal() {
        return Err(CoordinatorError::InvalidTransactionState {
            tx_id,
            attempted: desired,
        });
    }
    Ok(Some(desired))
}

/// Lexicographically-sortable key so a byte-ordered scan over `(created_at, tx_id)` matches
/// ascending creation order. Zero-padded so RocksDB's default byte comparator sorts
/// numerically, not textually.
pub(crate) fn hanging_index_key(created_at: DateTime<Utc>, tx_id: u64) -> String {
    format!(
        "{:020}_{:020}",
        created_at.timestamp_millis().max(0),
        tx_id
    )
}

pub(crate) fn apply_component_status(
    tx: &mut Transaction,
    participant_id: &str,
    accept: bool,
) -> Result<bool, CoordinatorError> {
    let entry = tx
        .participant_statuses
        .get_mut(participant_id)
        .ok_or(CoordinatorError::TransactionNotFound { tx_id: tx.id })?;
    if entry.try_status != TryStatus::Hanging {
        return Ok(false);
    }
    entry.try_status = if accept {
        TryStatus::Successful
    } else {
        TryStatus::Failure
    };
    Ok(true)
}
