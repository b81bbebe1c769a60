//! Concrete [`Participant`](tcc_core::Participant) transports: an in-process adapter for
//! participants that live in the same binary, and an HTTP adapter for everyone else.

mod http;
mod in_process;

pub use http::HttpParticipant;
pub use in_process::InProcessParticipant;
