//! The coordinator binary: a `TxManager` over a crash-safe RocksDB store, the admin HTTP
//! surface, and the reconciliation loop, bootstrapped through the shared agent lifecycle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use eyre::Result;

use coordinator::CoordinatorAgent;
use tcc_base::agent_main;

#[tokio::main]
async fn main() -> Result<()> {
    agent_main::<CoordinatorAgent>().await
}
