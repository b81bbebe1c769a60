//! Common settings and configuration for coordinator agents.
//!
//! ## Configuration value precedence
//!
//! Configuration key/value pairs are loaded in the following order, with later sources
//! taking precedence:
//!
//! 1. `config/default.json` (or the base config named by `config_file_name`).
//! 2. `config/<RUN_ENV>/<agent_prefix>-partial.json`, if present.
//! 3. Environment variables prefixed `TCC_BASE`, shared by every agent in the deployment.
//! 4. Environment variables prefixed `TCC_<agent_prefix>`, specific to one agent.
//!
//! `RUN_ENV` defaults to `default` if unset.

pub use base::*;

mod base;
pub mod loader;
mod trace;

pub use trace::{TracingConfig, TracingFormat};
