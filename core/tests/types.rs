use chrono::Utc;
use tcc_core::{Transaction, TryStatus, TxStatus};

#[test]
fn new_transaction_has_all_entries_hanging() {
    let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let tx = Transaction::new(1, &ids, Utc::now());

    assert_eq!(tx.status, TxStatus::Hanging);
    assert_eq!(tx.participant_statuses.len(), 3);
    for pid in &ids {
        assert_eq!(tx.participant_statuses[pid].try_status, TryStatus::Hanging);
    }
}

#[test]
fn participant_ids_match_creation_set() {
    let ids = vec!["x".to_string(), "y".to_string()];
    let tx = Transaction::new(7, &ids, Utc::now());
    let mut seen: Vec<&str> = tx.participant_ids().collect();
    seen.sort_unstable();
    assert_eq!(seen, vec!["x", "y"]);
}

#[test]
fn tx_status_terminality() {
    assert!(!TxStatus::Hanging.is_terminal());
    assert!(TxStatus::Successful.is_terminal());
    assert!(TxStatus::Failure.is_terminal());
}
