//! A `stateright` model of the per-transaction state machine: the dominance rule that
//! aggregates per-participant `Try` outcomes, and the invariant that a terminal aggregate
//! never reverses. This explores every interleaving of participant outcomes for a small,
//! fixed set of participants — wider coverage than the example-based tests in
//! `agents/coordinator/src/state_evaluator.rs` reach on their own.

use std::collections::BTreeMap;

use stateright::{Checker, Expectation, Model, Property};

/// Per-participant `Try` outcome, independent of `tcc_core::TryStatus` so this model has no
/// dependency on the crate it's verifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum TryOutcome {
    Hanging,
    Successful,
    Failure,
}

/// The aggregate status derived from the dominance rule: `Failure` beats `Hanging` beats
/// `Successful`. Mirrors `agents/coordinator/src/state_evaluator::aggregate`, reimplemented
/// here so the model has no path back into the crate under test.
fn aggregate(statuses: &BTreeMap<&'static str, TryOutcome>) -> TryOutcome {
    let mut any_hanging = false;
    for status in statuses.values() {
        match status {
            TryOutcome::Failure => return TryOutcome::Failure,
            TryOutcome::Hanging => any_hanging = true,
            TryOutcome::Successful => {}
        }
    }
    if any_hanging {
        TryOutcome::Hanging
    } else {
        TryOutcome::Successful
    }
}

/// One transaction's state: the recorded `Try` outcome of each participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TxState {
    statuses: BTreeMap<&'static str, TryOutcome>,
}

/// Resolve participant `id`'s `Try` outcome to `to`. Only fires from `Hanging`, matching the
/// `TxStore::tx_update_component_status` contract: a resolved entry never moves again.
#[derive(Debug, Clone, Copy)]
struct Resolve {
    id: &'static str,
    to: TryOutcome,
}

/// A model of a single transaction over a fixed participant set.
struct TxModel {
    participant_ids: Vec<&'static str>,
}

impl Model for TxModel {
    type State = TxState;
    type Action = Resolve;

    fn init_states(&self) -> Vec<Self::State> {
        vec![TxState {
            statuses: self
                .participant_ids
                .iter()
                .map(|id| (*id, TryOutcome::Hanging))
                .collect(),
        }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for (&id, &status) in &state.statuses {
            if status == TryOutcome::Hanging {
                actions.push(Resolve {
                    id,
                    to: TryOutcome::Successful,
                });
                actions.push(Resolve {
                    id,
                    to: TryOutcome::Failure,
                });
            }
        }
    }

    fn next_state(&self, last_state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = last_state.clone();
        let entry = next.statuses.get_mut(action.id)?;
        if *entry != TryOutcome::Hanging {
            // Resolved entries never move again; this action shouldn't have been generated.
            return None;
        }
        *entry = action.to;
        Some(next)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always("failure dominates", |_, state| {
                let any_failure = state.statuses.values().any(|s| *s == TryOutcome::Failure);
                !any_failure || aggregate(&state.statuses) == TryOutcome::Failure
            }),
            Property::always("all successful implies successful aggregate", |_, state| {
                let all_successful = state
                    .statuses
                    .values()
                    .all(|s| *s == TryOutcome::Successful);
                !all_successful || aggregate(&state.statuses) == TryOutcome::Successful
            }),
            Property::always("any hanging without failure implies hanging aggregate", |_, state| {
                let any_failure = state.statuses.values().any(|s| *s == TryOutcome::Failure);
                let any_hanging = state.statuses.values().any(|s| *s == TryOutcome::Hanging);
                any_failure || !any_hanging || aggregate(&state.statuses) == TryOutcome::Hanging
            }),
            Property::sometimes("failure is reachable", |_, state| {
                aggregate(&state.statuses) == TryOutcome::Failure
            }),
            Property::sometimes("successful is reachable", |_, state| {
                aggregate(&state.statuses) == TryOutcome::Successful
            }),
            Property::<Self>::eventually("every transaction reaches a terminal aggregate", |_, state| {
                aggregate(&state.statuses) != TryOutcome::Hanging
            }),
        ]
    }
}

#[test]
fn dominance_rule_holds_across_every_interleaving() {
    TxModel {
        participant_ids: vec!["a", "b", "c"],
    }
    .checker()
    .spawn_bfs()
    .join()
    .assert_properties();
}

#[test]
fn single_participant_transaction_has_two_reachable_terminal_states() {
    let checker = TxModel {
        participant_ids: vec!["a"],
    }
    .checker()
    .spawn_bfs()
    .join();
    checker.assert_properties();

    let discoveries = checker.discoveries();
    assert!(discoveries.is_empty(), "unexpected counterexamples: {discoveries:?}");
}

#[allow(dead_code)]
fn _expectation_is_exhaustive(e: Expectation) -> Expectation {
    e
}
