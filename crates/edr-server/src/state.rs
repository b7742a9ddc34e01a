//! `ControlPlane`: a single aggregate constructed once at startup and
//! passed by reference everywhere, replacing the cross-module singletons
//! (`elastalert_client`, `ping_monitor`, `active_servicer`) this system's
//! antecedents relied on.

use std::sync::Arc;
use std::time::Duration;

use edr_shared::Result;

use crate::config::Config;
use crate::iocs::IocStore;
use crate::matches::IocMatchTable;
use crate::persistence::JsonCollection;
use crate::queue::CommandQueue;
use crate::registry::AgentRegistry;
use crate::results::ResultTable;
use crate::stream_registry::StreamRegistry;

#[derive(Clone)]
pub struct ControlPlane {
    pub config: Arc<Config>,
    pub registry: Arc<AgentRegistry>,
    pub queue: Arc<CommandQueue>,
    pub results: Arc<ResultTable>,
    pub iocs: Arc<IocStore>,
    pub ioc_matches: Arc<IocMatchTable>,
    pub streams: Arc<StreamRegistry>,
}

impl ControlPlane {
    pub async fn bootstrap(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|e| edr_shared::EdrError::Persistence(format!("creating data dir: {e}")))?;

        let save_interval = Duration::from_secs(config.save_interval_secs);
        let agents = JsonCollection::load(&config.data_dir, "agents", save_interval).await?;
        let command_results = JsonCollection::load(&config.data_dir, "command_results", save_interval).await?;
        let ioc_match_store = JsonCollection::load(&config.data_dir, "ioc_matches", save_interval).await?;
        let iocs = IocStore::load(&config.data_dir.join("iocs")).await?;

        let registry = Arc::new(AgentRegistry::new(agents));
        if config.seed_demo_data {
            seed_demo_data(&registry).await;
        }

        Ok(Self {
            config: Arc::new(config),
            registry,
            queue: Arc::new(CommandQueue::new()),
            results: Arc::new(ResultTable::new(command_results)),
            iocs: Arc::new(iocs),
            ioc_matches: Arc::new(IocMatchTable::new(ioc_match_store)),
            streams: Arc::new(StreamRegistry::new()),
        })
    }

    pub async fn force_save_all(&self) -> Result<()> {
        self.registry.force_save().await?;
        self.results.force_save().await?;
        self.ioc_matches.force_save().await?;
        self.iocs.commit_version().await?;
        Ok(())
    }
}

/// Opt-in dev convenience (`EDR_SEED_DEMO=1`), off by default so production
/// boots never see synthetic agents.
async fn seed_demo_data(registry: &AgentRegistry) {
    let now = edr_shared::now_ts();
    for (id, hostname, status) in [
        ("demo-win-desktop-01", "WIN-DESKTOP-01", edr_shared::AgentStatus::Online),
        ("demo-win-laptop-01", "WIN-LAPTOP-01", edr_shared::AgentStatus::Offline),
    ] {
        if registry.get(id).await.is_some() {
            continue;
        }
        let _ = registry
            .register(
                id,
                hostname.to_string(),
                "127.0.0.1".to_string(),
                "00:00:00:00:00:00".to_string(),
                "demo".to_string(),
                "Windows 11".to_string(),
                "1.0.0".to_string(),
            )
            .await;
        let _ = registry.update_status(id, status, now, None).await;
    }
    tracing::info!("seeded demo agent data (EDR_SEED_DEMO=1)");
}
