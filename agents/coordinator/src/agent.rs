use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use tcc_base::db::DB;
use tcc_base::{run_all, BaseAgent, CoreMetrics, RocksTxStore};
use tokio::task::JoinHandle;
use tracing::{info_span, instrument::Instrumented, Instrument};

use crate::server;
use crate::settings::CoordinatorSettings;
use crate::transport::HttpParticipant;
use crate::tx_manager::TxManager;

/// The `coordinator` binary: a `TxManager` backed by a crash-safe RocksDB store, the admin
/// HTTP surface, and the reconciliation loop, wired together per [`tcc_base::BaseAgent`]'s
/// process lifecycle contract.
pub struct CoordinatorAgent {
    tx_manager: Arc<TxManager<RocksTxStore>>,
    metrics: Arc<CoreMetrics>,
    admin_port: u16,
}

// Manual impl: `TxManager` holds `Arc<dyn Participant>` trait objects, which aren't `Debug`,
// so this can't be derived.
impl std::fmt::Debug for CoordinatorAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorAgent")
            .field("admin_port", &self.admin_port)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BaseAgent for CoordinatorAgent {
    const AGENT_NAME: &'static str = "coordinator";

    type Settings = CoordinatorSettings;

    async fn from_settings(settings: Self::Settings, metrics: Arc<CoreMetrics>) -> Result<Self> {
        let core_settings = settings.as_ref();
        let db = DB::from_path(Path::new(&core_settings.storage_path))?;
        let instance_id = core_settings.instance_id();

        let store = Arc::new(RocksTxStore::new(db, instance_id.clone()));
        let tx_manager = TxManager::new(
            store,
            metrics.clone(),
            settings.tx_manager_config(),
            instance_id,
        );

        for participant in &settings.http_participants {
            tx_manager.register(Arc::new(HttpParticipant::new(
                participant.id.clone(),
                participant.base_url.clone(),
            )))?;
        }

        Ok(Self {
            tx_manager,
            metrics,
            admin_port: settings.admin_port,
        })
    }

    #[allow(clippy::async_yields_async)]
    async fn run(&self) -> Instrumented<JoinHandle<Result<()>>> {
        self.tx_manager.start_monitor().await;

        let tx_manager = self.tx_manager.clone();
        let metrics = self.metrics.clone();
        let admin_port = self.admin_port;

        let server_task = tokio::spawn(async move {
            let app = server::routes(tx_manager, metrics);
            let addr = SocketAddr::from(([0, 0, 0, 0], admin_port));
            tracing::info!(%addr, "starting admin http server");
            axum::Server::bind(&addr)
                .serve(app.into_make_service())
                .await
                .map_err(eyre::Report::from)
        })
        .instrument(info_span!("admin_server"));

        run_all(vec![server_task])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tcc_base::settings::Settings;
    use tcc_base::CoreMetrics;

    use crate::settings::CoordinatorSettings;

    fn _settings_implements_as_ref(s: &CoordinatorSettings) -> &Settings {
        s.as_ref()
    }

    #[allow(dead_code)]
    fn _metrics_type_check(m: Arc<CoreMetrics>) -> Arc<CoreMetrics> {
        m
    }
}
