use thiserror::Error;

/// The coordinator's error taxonomy.
///
/// Every variant is classified as retryable or terminal by [`CoordinatorError::retryable`];
/// this classification, not string matching, is what [`tcc_retry`](../tcc_retry/index.html)
/// uses to decide whether to back off and retry or surface immediately.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The Try-phase deadline elapsed before every participant responded.
    #[error("transaction {tx_id} timed out waiting for Try responses")]
    TransactionTimeout {
        /// The transaction that timed out.
        tx_id: u64,
    },

    /// A participant's operation failed during the named phase.
    #[error("participant {participant_id} failed during {phase}: {source}")]
    ParticipantExecutionError {
        /// Which TCC phase the failure occurred in.
        phase: Phase,
        /// The participant that failed.
        participant_id: String,
        /// The underlying cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        /// Whether the underlying cause should be retried.
        retryable: bool,
    },

    /// Referenced a transaction id the store has no record of.
    #[error("transaction {tx_id} not found")]
    TransactionNotFound {
        /// The unknown transaction id.
        tx_id: u64,
    },

    /// Attempted to register a participant id that is already registered.
    #[error("participant {participant_id} is already registered")]
    DuplicateParticipant {
        /// The id that collided.
        participant_id: String,
    },

    /// `StartTransaction` was called with no participants registered.
    #[error("no participants are registered")]
    NoParticipantsRegistered,

    /// A transient storage-layer failure.
    #[error("storage error: {0}")]
    StorageError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The distributed lock could not be acquired within its budget.
    #[error("failed to acquire distributed lock: {0}")]
    LockAcquisitionError(String),

    /// An operation attempted to mutate a transaction already in a terminal state
    /// with a conflicting outcome.
    #[error("transaction {tx_id} is already in a terminal state and cannot transition to {attempted:?}")]
    InvalidTransactionState {
        /// The transaction whose terminal state was violated.
        tx_id: u64,
        /// The status the caller tried to apply.
        attempted: crate::TxStatus,
    },
}

/// Which TCC phase an error occurred in, used for log fields and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The Try phase.
    Try,
    /// The Confirm phase.
    Confirm,
    /// The Cancel phase.
    Cancel,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Try => "try",
            Phase::Confirm => "confirm",
            Phase::Cancel => "cancel",
        };
        write!(f, "{s}")
    }
}

impl CoordinatorError {
    /// Whether `tcc-retry`'s `RetryExecutor` should back off and retry this error, as opposed
    /// to surfacing it immediately. Classification is by error kind, never by message text.
    pub fn retryable(&self) -> bool {
        match self {
            CoordinatorError::TransactionTimeout { .. } => false,
            CoordinatorError::ParticipantExecutionError { retryable, .. } => *retryable,
            CoordinatorError::TransactionNotFound { .. } => false,
            CoordinatorError::DuplicateParticipant { .. } => false,
            CoordinatorError::NoParticipantsRegistered => false,
            CoordinatorError::StorageError(_) => true,
            CoordinatorError::LockAcquisitionError(_) => true,
            CoordinatorError::InvalidTransactionState { .. } => false,
        }
    }
}
