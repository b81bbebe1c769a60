//! Pure aggregation of per-participant `Try` statuses into the transaction's overall status.

use tcc_core::{Transaction, TryStatus, TxStatus};

/// Derive the aggregate [`TxStatus`] for `tx` from the recorded `Try` status of every id in
/// `registered_participant_ids`.
///
/// `Failure` dominates `Hanging`, and both dominate `Successful` — a transaction with any
/// recorded failure is driven to `Cancel` even while other participants are still
/// `Hanging`, so that a participant's abandoned `Try` reservation never lingers waiting on a
/// sibling that will never resolve it. This dominance rule is normative; do not special-case
/// "successful unless something is still hanging" here.
pub fn aggregate<'a>(
    tx: &Transaction,
    registered_participant_ids: impl IntoIterator<Item = &'a str>,
) -> TxStatus {
    let mut any_hanging = false;

    for id in registered_participant_ids {
        match tx.participant_statuses.get(id).map(|e| e.try_status) {
            Some(TryStatus::Failure) => return TxStatus::Failure,
            Some(TryStatus::Hanging) | None => any_hanging = true,
            Some(TryStatus::Successful) => {}
        }
    }

    if any_hanging {
        TxStatus::Hanging
    } else {
        TxStatus::Successful
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tcc_core::Transaction;

    use super::*;

    fn tx_with(statuses: &[(&str, TryStatus)]) -> Transaction {
        let ids: Vec<String> = statuses.iter().map(|(id, _)| id.to_string()).collect();
        let mut tx = Transaction::new(1, &ids, Utc::now());
        for (id, status) in statuses {
            tx.participant_statuses.get_mut(*id).unwrap().try_status = *status;
        }
        tx
    }

    #[test]
    fn all_successful_is_successful() {
        let tx = tx_with(&[("a", TryStatus::Successful), ("b", TryStatus::Successful)]);
        assert_eq!(aggregate(&tx, ["a", "b"]), TxStatus::Successful);
    }

    #[test]
    fn any_hanging_is_hanging() {
        let tx = tx_with(&[("a", TryStatus::Successful), ("b", TryStatus::Hanging)]);
        assert_eq!(aggregate(&tx, ["a", "b"]), TxStatus::Hanging);
    }

    #[test]
    fn failure_dominates_hanging() {
        let tx = tx_with(&[("a", TryStatus::Hanging), ("b", TryStatus::Failure)]);
        assert_eq!(aggregate(&tx, ["a", "b"]), TxStatus::Failure);
    }

    #[test]
    fn failure_dominates_successful() {
        let tx = tx_with(&[("a", TryStatus::Successful), ("b", TryStatus::Failure)]);
        assert_eq!(aggregate(&tx, ["a", "b"]), TxStatus::Failure);
    }
}
