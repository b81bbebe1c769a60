use async_trait::async_trait;

use crate::CoordinatorError;

/// The result of a single participant operation: either it succeeded, or it failed in a way
/// classified as retryable or terminal.
///
/// This mirrors the shape of `PendingOperationResult` used elsewhere in this codebase for
/// classifying the outcome of a submitted operation, narrowed to the binary
/// success-or-classified-failure the TCC contract needs.
pub type ParticipantResult = Result<(), CoordinatorError>;

/// The capability contract a downstream service must implement to take part in a transaction.
///
/// A participant is identified by a stable [`id`](Participant::id) and exposes three
/// idempotent operations. The coordinator treats every implementor identically regardless of
/// transport — in-process, HTTP, or otherwise — so this trait is deliberately small: avoid
/// growing a hierarchy of participant traits, add transports instead.
#[async_trait]
pub trait Participant: Send + Sync {
    /// This participant's stable identifier, unique within one coordinator's registry.
    fn id(&self) -> &str;

    /// Attempt to reserve this participant's side of the transaction.
    ///
    /// MAY fail for business reasons (e.g. insufficient balance); such failures abort the
    /// whole transaction. MUST be idempotent given the same transaction id.
    async fn try_op(&self, tx_id: u64) -> ParticipantResult;

    /// Finalize this participant's reservation. MUST eventually succeed if the matching
    /// `Try` succeeded; the coordinator retries indefinitely under `RetryExecutor` until
    /// success or operator intervention. MUST be idempotent.
    async fn confirm(&self, tx_id: u64) -> ParticipantResult;

    /// Release/roll back this participant's reservation. MUST eventually succeed; failures
    /// are logged and retried but never flip the outcome of an already-aborted transaction.
    /// MUST be idempotent.
    async fn cancel(&self, tx_id: u64) -> ParticipantResult;
}
