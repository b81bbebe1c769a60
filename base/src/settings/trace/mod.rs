use eyre::Result;
use serde::Deserialize;
use tracing_error::ErrorLayer;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::CoreMetrics;

mod span_metrics;
use span_metrics::TimeSpanLifetime;

/// How log lines should be formatted.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    /// Human-readable, colorized output. The right default for local development.
    #[default]
    Pretty,
    /// One JSON object per line. The right choice once logs flow into a collector.
    Json,
}

/// Tracing/logging configuration, loaded as part of [`crate::Settings`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingConfig {
    /// Overrides `RUST_LOG` if set; otherwise `RUST_LOG` (or `info`) is used.
    #[serde(default)]
    pub level: Option<String>,
    /// Log line format.
    #[serde(default)]
    pub format: TracingFormat,
}

impl TracingConfig {
    /// Install the global tracing subscriber for this process.
    ///
    /// Idempotent-in-practice: called once from `agent_main`. Uses `EnvFilter` so
    /// `RUST_LOG` always works even when `level` isn't set in config. Also registers a
    /// [`TimeSpanLifetime`] layer that feeds `metrics.span_duration_seconds()` /
    /// `span_count()` / `span_events()`, so span activity is observable over `/metrics`
    /// without every call site touching `CoreMetrics` directly, plus an [`ErrorLayer`] so
    /// `eyre`/`color-eyre` reports can capture the active span trace alongside the
    /// one-line backtrace from [`crate::oneline_eyre`].
    pub fn start_tracing(&self, metrics: &CoreMetrics) -> Result<()> {
        let filter = match &self.level {
            Some(level) => EnvFilter::try_new(level)?,
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        };

        let registry = tracing_subscriber::registry()
            .with(filter)
            .with(TimeSpanLifetime::new(metrics))
            .with(ErrorLayer::default());

        match self.format {
            TracingFormat::Pretty => {
                registry.with(fmt::layer().with_target(true)).try_init()?;
            }
            TracingFormat::Json => {
                registry.with(fmt::layer().json()).try_init()?;
            }
        }

        Ok(())
    }
}
