//! Shared types for the TCC (Try-Confirm-Cancel) coordinator: the durable data model,
//! the `Participant` capability contract, and the error taxonomy that drives retry
//! classification throughout the rest of the workspace.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod participant;
mod types;

pub use error::*;
pub use participant::*;
pub use types::*;
