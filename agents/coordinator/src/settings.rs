//! Coordinator-specific configuration, layered on top of [`tcc_base::Settings`] the same way
//! every agent in this codebase composes its settings: `#[serde(flatten)] base: Settings`
//! plus whatever fields are specific to this binary.

use std::time::Duration;

use serde::Deserialize;
use tcc_base::settings::loader::load_settings_object;
use tcc_base::settings::Settings;
use tcc_base::NewFromSettings;
use tcc_retry::RetryConfig;

use crate::tx_manager::TxManagerConfig;

/// Settings for the `coordinator` binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorSettings {
    #[serde(flatten)]
    base: Settings,

    /// Try-phase budget, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Spacing between monitor ticks, in milliseconds.
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    /// Whether the reconciliation loop runs at all.
    #[serde(default = "default_enable_monitor")]
    pub enable_monitor: bool,
    /// Port the admin HTTP surface (`/health`, `/tx/:id`, `/tx/:id/advance`, `/metrics`)
    /// binds on.
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
    /// `RetryExecutor` parameters for the Confirm/Cancel fan-out.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Participants reached over HTTP, registered at startup.
    #[serde(default)]
    pub http_participants: Vec<HttpParticipantConfig>,
}

/// One entry of `http_participants`: an id and the base URL `{id}/try|confirm|cancel` is
/// appended to.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpParticipantConfig {
    /// Participant id, must be unique across the registry.
    pub id: String,
    /// Base URL the coordinator posts `try`/`confirm`/`cancel` requests to.
    pub base_url: String,
}

/// The recognized `retry.*` configuration options.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    /// See [`RetryConfig::max_retries`].
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// See [`RetryConfig::base_delay_ms`].
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// See [`RetryConfig::max_delay_ms`].
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// See [`RetryConfig::backoff_multiplier`].
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// See [`RetryConfig::jitter_ms`].
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl From<RetrySettings> for RetryConfig {
    fn from(s: RetrySettings) -> Self {
        RetryConfig {
            max_retries: s.max_retries,
            base_delay_ms: s.base_delay_ms,
            max_delay_ms: s.max_delay_ms,
            backoff_multiplier: s.backoff_multiplier,
            jitter_ms: s.jitter_ms,
        }
    }
}

fn default_timeout_ms() -> u64 {
    5_000
}
fn default_monitor_interval_ms() -> u64 {
    10_000
}
fn default_enable_monitor() -> bool {
    true
}
fn default_admin_port() -> u16 {
    9091
}
fn default_max_retries() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_jitter_ms() -> u64 {
    100
}

impl CoordinatorSettings {
    /// Build the `TxManager` configuration this settings object describes.
    pub fn tx_manager_config(&self) -> TxManagerConfig {
        TxManagerConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            monitor_interval: Duration::from_millis(self.monitor_interval_ms),
            enable_monitor: self.enable_monitor,
            retry: self.retry.into(),
        }
    }
}

impl AsRef<Settings> for CoordinatorSettings {
    fn as_ref(&self) -> &Settings {
        &self.base
    }
}

impl AsMut<Settings> for CoordinatorSettings {
    fn as_mut(&mut self) -> &mut Settings {
        &mut self.base
    }
}

impl NewFromSettings for CoordinatorSettings {
    type Error = eyre::Report;

    fn new() -> Result<Self, Self::Error> {
        load_settings_object::<Self, &str>("coordinator", Some("coordinator"), &[])
    }
}
