use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The status of a single participant's `Try` leg.
///
/// Transitions only ever go `Hanging -> Successful` or `Hanging -> Failure`; never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TryStatus {
    /// No terminal result has been recorded yet.
    Hanging,
    /// The participant's `Try` succeeded.
    Successful,
    /// The participant's `Try` failed (business rejection or timeout abandonment).
    Failure,
}

/// The aggregate status of a transaction as a whole.
///
/// `Hanging` is the only non-terminal value; `Successful` and `Failure` are terminal and
/// no further transition is ever applied once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TxStatus {
    /// Still awaiting a terminal aggregate outcome.
    Hanging,
    /// All participants confirmed.
    Successful,
    /// At least one participant failed or was cancelled.
    Failure,
}

impl TxStatus {
    /// Whether this status is terminal (`Successful` or `Failure`).
    pub fn is_terminal(self) -> bool {
        !matches!(self, TxStatus::Hanging)
    }
}

/// A single participant's recorded `Try` outcome within a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantEntry {
    /// The participant's stable identifier.
    pub participant_id: String,
    /// The participant's current `Try` status.
    pub try_status: TryStatus,
}

impl ParticipantEntry {
    /// A fresh entry in the initial `Hanging` state.
    pub fn hanging(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            try_status: TryStatus::Hanging,
        }
    }
}

/// The durable unit tracked by the coordinator.
///
/// `participantStatuses` keys are fixed at creation time (set by `CreateTx`) and are never
/// added to or removed from afterward. The field is named `id`, not `txID` — this is the
/// normative name for the transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Store-assigned, monotonic, unique identifier.
    pub id: u64,
    /// The aggregate status.
    pub status: TxStatus,
    /// Per-participant `Try` status, keyed by participant id.
    pub participant_statuses: BTreeMap<String, ParticipantEntry>,
    /// Wall-clock creation time, immutable after creation.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Construct a freshly-created transaction with all participant entries `Hanging`.
    pub fn new(id: u64, participant_ids: &[String], created_at: DateTime<Utc>) -> Self {
        let participant_statuses = participant_ids
            .iter()
            .map(|pid| (pid.clone(), ParticipantEntry::hanging(pid.clone())))
            .collect();
        Self {
            id,
            status: TxStatus::Hanging,
            participant_statuses,
            created_at,
        }
    }

    /// The participant ids this transaction was created with.
    pub fn participant_ids(&self) -> impl Iterator<Item = &str> {
        self.participant_statuses.keys().map(String::as_str)
    }
}
