//! Test doubles and a model-checking harness for the coordinator's transaction lifecycle:
//! an in-memory [`TxStore`](tcc_base::TxStore), mock/scripted [`Participant`](tcc_core::Participant)
//! implementations, and (under `cfg(test)`) a `stateright` model of the dominance rule.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod participant;
mod store;

#[cfg(test)]
mod model;

pub use participant::{MockParticipant, Script, ScriptedParticipant};
pub use store::InMemoryTxStore;
