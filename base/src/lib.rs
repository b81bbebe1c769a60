//! Common runtime scaffolding shared by every coordinator binary: configuration loading,
//! metrics, the RocksDB-backed transaction store (which also carries the cluster-wide
//! advisory lock), and the agent bootstrap/lifecycle.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(missing_docs)]

pub mod settings;

#[macro_use]
mod macros;

/// Base trait for an agent and the process bootstrap/lifecycle helpers.
mod agent;
pub use agent::*;

mod metrics;
pub use metrics::*;

/// RocksDB-backed storage primitives shared by the transaction store and the lock.
pub mod db;

mod store;
pub use store::*;

#[cfg(feature = "oneline-eyre")]
pub mod oneline_eyre;
