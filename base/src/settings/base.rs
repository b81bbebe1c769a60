use std::sync::Arc;

use serde::Deserialize;

use crate::settings::trace::TracingConfig;
use crate::CoreMetrics;

/// Settings common to every coordinator agent. Usually embedded with `#[serde(flatten)]`:
///
/// ```ignore
/// use tcc_base::Settings;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// pub struct CoordinatorSettings {
///     #[serde(flatten)]
///     base: Settings,
///     // ... coordinator-specific fields
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Filesystem path of the embedded RocksDB instance backing the transaction store and
    /// the distributed lock.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    /// Overrides the generated coordinator instance id used in `GetHealth` and log fields.
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Tracing/logging configuration.
    #[serde(default)]
    pub tracing: TracingConfig,
}

fn default_storage_path() -> String {
    "./tcc-data".to_string()
}

impl Settings {
    /// Build the process-wide metrics registry for the named agent.
    pub fn metrics(&self, name: &str) -> eyre::Result<Arc<CoreMetrics>> {
        Ok(Arc::new(CoreMetrics::new(name, prometheus::Registry::new())?))
    }

    /// The instance id to report in `GetHealth`, falling back to a process-local
    /// generated value if none was configured.
    pub fn instance_id(&self) -> String {
        self.instance_id
            .clone()
            .unwrap_or_else(|| format!("coordinator-{}", std::process::id()))
    }
}
