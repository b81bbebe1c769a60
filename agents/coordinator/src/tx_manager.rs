//! The transaction lifecycle engine: participant registry, Try fan-out with timeout,
//! two-phase advancement to Confirm/Cancel, and the reconciliation [`Monitor`](crate::monitor).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, select_all};
use parking_lot::RwLock;
use tcc_base::CoreMetrics;
use tcc_core::{CoordinatorError, Participant, Phase, Transaction, TxStatus};
use tcc_retry::{RetryConfig, RetryExecutor};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::state_evaluator;

/// Configuration for a [`TxManager`].
#[derive(Debug, Clone, Copy)]
pub struct TxManagerConfig {
    /// Budget for the Try phase.
    pub timeout: Duration,
    /// Spacing between [`Monitor`](crate::monitor) ticks.
    pub monitor_interval: Duration,
    /// Whether the reconciliation loop runs at all.
    pub enable_monitor: bool,
    /// Parameters for the Confirm/Cancel [`RetryExecutor`].
    pub retry: RetryConfig,
}

/// The discriminated result of [`TxManager::start_transaction`]. Keeps a Try-phase timeout
/// distinct from a participant's business rejection, per the normative resolution of the
/// "collapsed boolean vs discriminated outcome" open question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartTransactionOutcome {
    /// Every participant's `Try` succeeded within the timeout.
    Ok {
        /// The transaction id.
        tx_id: u64,
    },
    /// The Try-phase deadline elapsed before every participant responded.
    Timeout {
        /// The transaction id.
        tx_id: u64,
    },
    /// A participant's `Try` rejected the transaction for a business reason.
    BusinessFailure {
        /// The transaction id.
        tx_id: u64,
        /// The participant that rejected the `Try`.
        participant_id: String,
    },
}

impl StartTransactionOutcome {
    /// The transaction id, regardless of which variant this is.
    pub fn tx_id(&self) -> u64 {
        match self {
            StartTransactionOutcome::Ok { tx_id }
            | StartTransactionOutcome::Timeout { tx_id }
            | StartTransactionOutcome::BusinessFailure { tx_id, .. } => *tx_id,
        }
    }

    /// Collapse to the boolean a caller that doesn't care about the distinction can use.
    pub fn succeeded(&self) -> bool {
        matches!(self, StartTransactionOutcome::Ok { .. })
    }

    fn metric_label(&self) -> &'static str {
        match self {
            StartTransactionOutcome::Ok { .. } => "ok",
            StartTransactionOutcome::Timeout { .. } => "timeout",
            StartTransactionOutcome::BusinessFailure { .. } => "business_failure",
        }
    }
}

/// `GetHealth()`'s return shape.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    /// Always true once a `TxManager` has successfully constructed; present for API parity
    /// with a richer liveness check a deployment might add.
    pub healthy: bool,
    /// This process's instance id, also used for log fields and lock ownership.
    pub instance_id: String,
    /// Number of participants currently registered.
    pub participants_count: usize,
    /// Whether the reconciliation loop is active.
    pub monitor_enabled: bool,
    /// A point-in-time snapshot of a few counters a caller would otherwise have to scrape
    /// `/metrics` for.
    pub metrics: HealthMetrics,
}

/// The `metrics` field of [`Health`].
#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    /// Total transactions started via `StartTransaction` on this instance.
    pub transactions_started: u64,
    /// Hanging transactions observed on the most recent monitor tick.
    pub hanging_transaction_count: i64,
}

enum TryPhaseOutcome {
    AllOk,
    Timeout,
    BusinessFailure(String),
    StorageTerminal(CoordinatorError),
}

/// Durable storage contract the `TxManager` depends on. Mirrors
/// [`tcc_base::store::TxStore`] without tying this crate to that concrete crate, so tests can
/// substitute [`tcc_test_utils`](../tcc_test_utils/index.html)'s in-memory store.
pub use tcc_base::TxStore;

/// Holds the in-process participant registry and drives every transaction through the TCC
/// protocol against a durable [`TxStore`].
pub struct TxManager<S: TxStore> {
    registry: RwLock<HashMap<String, Arc<dyn Participant>>>,
    store: Arc<S>,
    metrics: Arc<CoreMetrics>,
    config: TxManagerConfig,
    instance_id: String,
    stop_tx: tokio::sync::watch::Sender<bool>,
    stop_rx: tokio::sync::watch::Receiver<bool>,
    monitor_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<S: TxStore + 'static> TxManager<S> {
    /// Build a `TxManager` over `store`, reporting as `instance_id` in `GetHealth` and lock
    /// ownership.
    pub fn new(
        store: Arc<S>,
        metrics: Arc<CoreMetrics>,
        config: TxManagerConfig,
        instance_id: impl Into<String>,
    ) -> Arc<Self> {
        let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
        Arc::new(Self {
            registry: RwLock::new(HashMap::new()),
            store,
            metrics,
            config,
            instance_id: instance_id.into(),
            stop_tx,
            stop_rx,
            monitor_handle: tokio::sync::Mutex::new(None),
        })
    }

    /// Register a participant. Fails with [`CoordinatorError::DuplicateParticipant`] if its id
    /// collides with an already-registered one.
    pub fn register(&self, participant: Arc<dyn Participant>) -> Result<(), CoordinatorError> {
        let mut registry = self.registry.write();
        let id = participant.id().to_string();
        if registry.contains_key(&id) {
            return Err(CoordinatorError::DuplicateParticipant { participant_id: id });
        }
        registry.insert(id, participant);
        Ok(())
    }

    /// A point-in-time `GetHealth()` snapshot.
    pub fn health(&self) -> Health {
        Health {
            healthy: true,
            instance_id: self.instance_id.clone(),
            participants_count: self.registry.read().len(),
            monitor_enabled: self.config.enable_monitor,
            metrics: HealthMetrics {
                transactions_started: self.metrics.transaction_started_value(&self.instance_id),
                hanging_transaction_count: self
                    .metrics
                    .hanging_transaction_count_value(&self.instance_id),
            },
        }
    }

    /// Start the reconciliation loop if `config.enable_monitor` is set. A no-op, idempotent,
    /// if the monitor is disabled or already running.
    pub async fn start_monitor(self: &Arc<Self>) {
        if !self.config.enable_monitor {
            return;
        }
        let mut handle = self.monitor_handle.lock().await;
        if handle.is_some() {
            return;
        }
        let this = self.clone();
        let mut stop_rx = this.stop_rx.clone();
        *handle = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(this.config.monitor_interval) => {}
                }
                if *stop_rx.borrow() {
                    break;
                }

                if let Err(err) = this.monitor_tick().await {
                    warn!(%err, "monitor tick failed; backing off");
                    tokio::time::sleep(this.config.monitor_interval * 3).await;
                }
            }
        }));
    }

    /// Flip the shared stop flag and, if the monitor was running, await its current
    /// iteration before returning. In-flight `start_transaction` calls are left to complete.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.monitor_handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// Step 2-7 of §4.6: one reconciliation tick, with the cluster-wide lock held for its
    /// duration.
    #[instrument(skip(self))]
    async fn monitor_tick(&self) -> Result<(), CoordinatorError> {
        let start = std::time::Instant::now();
        let lock_budget = self.config.monitor_interval * 2;

        let outcome_label;
        let result = match self.store.lock(lock_budget).await {
            Ok(()) => {
                let batch_result = self.run_monitor_batch().await;
                self.store.unlock().await;
                outcome_label = if batch_result.is_ok() { "ok" } else { "error" };
                batch_result
            }
            Err(CoordinatorError::LockAcquisitionError(_)) => {
                outcome_label = "lock_unavailable";
                Ok(())
            }
            Err(err) => {
                outcome_label = "error";
                Err(err)
            }
        };

        self.metrics
            .monitor_tick_duration()
            .with_label_values(&[outcome_label])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    async fn run_monitor_batch(&self) -> Result<(), CoordinatorError> {
        const HANGING_CAP: usize = 100;
        let batch = self.store.get_hanging_txs(HANGING_CAP).await?;
        self.metrics
            .hanging_transaction_count()
            .with_label_values(&[&self.instance_id])
            .set(batch.len() as i64);
        info!(count = batch.len(), "monitor tick advancing hanging transactions");

        let results = join_all(batch.iter().map(|tx| self.advance(tx))).await;
        for (tx, result) in batch.iter().zip(results) {
            if let Err(err) = result {
                warn!(tx_id = tx.id, %err, "advancing hanging transaction failed");
            }
        }
        Ok(())
    }

    /// `StartTransaction()`. See §4.5 steps 1-5.
    #[instrument(skip(self))]
    pub async fn start_transaction(&self) -> Result<StartTransactionOutcome, CoordinatorError> {
        let snapshot: HashMap<String, Arc<dyn Participant>> = self.registry.read().clone();
        if snapshot.is_empty() {
            return Err(CoordinatorError::NoParticipantsRegistered);
        }

        let ids: Vec<String> = snapshot.keys().cloned().collect();
        let tx_id = self.store.create_tx(&ids).await?;
        self.metrics
            .transaction_started()
            .with_label_values(&[&self.instance_id])
            .inc();

        let outcome = match self.try_phase(tx_id, &snapshot).await {
            TryPhaseOutcome::AllOk => StartTransactionOutcome::Ok { tx_id },
            TryPhaseOutcome::Timeout => StartTransactionOutcome::Timeout { tx_id },
            TryPhaseOutcome::BusinessFailure(participant_id) => {
                StartTransactionOutcome::BusinessFailure { tx_id, participant_id }
            }
            TryPhaseOutcome::StorageTerminal(err) => return Err(err),
        };

        self.metrics
            .transaction_outcome()
            .with_label_values(&[outcome.metric_label()])
            .inc();

        if let Err(err) = self.advance_transaction_progress(tx_id).await {
            warn!(tx_id, %err, "advance after try phase failed; monitor will retry");
        }

        Ok(outcome)
    }

    /// §4.5 step 3: race the Try-phase timer against every participant's `Try`, abandoning
    /// (not cancelling) whatever is still in flight once a result is decided.
    async fn try_phase(
        &self,
        tx_id: u64,
        participants: &HashMap<String, Arc<dyn Participant>>,
    ) -> TryPhaseOutcome {
        let mut pending_ids: Vec<String> = participants.keys().cloned().collect();
        let mut handles: Vec<JoinHandle<(String, Result<(), CoordinatorError>)>> = pending_ids
            .iter()
            .map(|id| {
                let p = participants[id].clone();
                let id = id.clone();
                tokio::spawn(async move {
                    let result = p.try_op(tx_id).await;
                    (id, result)
                })
            })
            .collect();

        let deadline = tokio::time::sleep(self.config.timeout);
        tokio::pin!(deadline);

        while !handles.is_empty() {
            tokio::select! {
                _ = &mut deadline => {
                    self.abandon_outstanding_tries(tx_id, &pending_ids).await;
                    return TryPhaseOutcome::Timeout;
                }
                (joined, _idx, remaining) = select_all(handles) => {
                    handles = remaining;
                    let (participant_id, result) = match joined {
                        Ok(v) => v,
                        Err(join_err) => {
                            warn!(%join_err, "participant try task panicked");
                            continue;
                        }
                    };
                    pending_ids.retain(|id| id != &participant_id);

                    let accept = result.is_ok();
                    if let Err(update_err) = self
                        .store
                        .tx_update_component_status(tx_id, &participant_id, accept)
                        .await
                    {
                        if !update_err.retryable() {
                            return TryPhaseOutcome::StorageTerminal(update_err);
                        }
                        warn!(tx_id, participant_id, %update_err, "retryable storage error recording try status");
                    }

                    if !accept {
                        return TryPhaseOutcome::BusinessFailure(participant_id);
                    }
                }
            }
        }

        TryPhaseOutcome::AllOk
    }

    /// Record the Try-phase deadline as a `Failure` for every participant whose `Try` hadn't
    /// resolved by the time it elapsed, so `state_evaluator::aggregate`'s dominance rule has
    /// a `Failure` entry to find instead of leaving the transaction `Hanging` forever waiting
    /// on a `Try` the coordinator has already abandoned. The store's first-writer-wins rule
    /// on `participantStatuses[x].tryStatus` means a late `Successful` from an abandoned Try
    /// that eventually completes cannot overwrite this.
    async fn abandon_outstanding_tries(&self, tx_id: u64, pending_ids: &[String]) {
        join_all(pending_ids.iter().map(|participant_id| async move {
            if let Err(err) = self
                .store
                .tx_update_component_status(tx_id, participant_id, false)
                .await
            {
                warn!(tx_id, participant_id, %err, "failed to record timed-out try as failure");
            }
        }))
        .await;
    }

    /// `AdvanceTransactionProgress(txId)`.
    pub async fn advance_transaction_progress(&self, tx_id: u64) -> Result<(), CoordinatorError> {
        let tx = self.store.get_tx(tx_id).await?;
        self.advance(&tx).await
    }

    /// `GetTX(txId)`, exposed for the admin HTTP surface.
    pub async fn get_tx(&self, tx_id: u64) -> Result<Transaction, CoordinatorError> {
        self.store.get_tx(tx_id).await
    }

    /// `AdvanceTransactionProgress(tx)`; idempotent. See §4.5.
    #[instrument(skip(self, tx), fields(tx_id = tx.id))]
    async fn advance(&self, tx: &Transaction) -> Result<(), CoordinatorError> {
        let ids: Vec<String> = tx.participant_statuses.keys().cloned().collect();
        let status = state_evaluator::aggregate(tx, ids.iter().map(String::as_str));

        match status {
            TxStatus::Hanging => Ok(()),
            TxStatus::Successful => self.finish(tx, &ids, Phase::Confirm, true).await,
            TxStatus::Failure => self.finish(tx, &ids, Phase::Cancel, false).await,
        }
    }

    async fn finish(
        &self,
        tx: &Transaction,
        ids: &[String],
        phase: Phase,
        success: bool,
    ) -> Result<(), CoordinatorError> {
        let participants: Vec<Arc<dyn Participant>> = {
            let registry = self.registry.read();
            let mut missing = Vec::new();
            let found = ids
                .iter()
                .filter_map(|id| match registry.get(id) {
                    Some(p) => Some(p.clone()),
                    None => {
                        missing.push(id.clone());
                        None
                    }
                })
                .collect();
            if !missing.is_empty() {
                warn!(
                    tx_id = tx.id,
                    ?missing,
                    "participant(s) not registered on this instance; leaving transaction hanging"
                );
                return Ok(());
            }
            found
        };

        let executor = RetryExecutor::new(self.config.retry, self.metrics.as_ref());
        let operation = match phase {
            Phase::Confirm => "confirm",
            Phase::Cancel => "cancel",
            Phase::Try => unreachable!("finish is only called with Confirm or Cancel"),
        };

        let results = join_all(participants.iter().map(|p| {
            let executor = &executor;
            async move {
                executor
                    .run(operation, || async {
                        match phase {
                            Phase::Confirm => p.confirm(tx.id).await,
                            Phase::Cancel => p.cancel(tx.id).await,
                            Phase::Try => unreachable!(),
                        }
                    })
                    .await
            }
        }))
        .await;

        if let Some(err) = results.into_iter().find_map(|r| r.err()) {
            warn!(tx_id = tx.id, %err, %phase, "participant retries exhausted; transaction remains hanging");
            return Err(err);
        }

        self.store.tx_submit(tx.id, success).await
    }
}
