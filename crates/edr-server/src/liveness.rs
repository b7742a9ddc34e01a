//! Periodic sweep demoting stale ONLINE agents to OFFLINE, grounded in the
//! teacher's lineage of `AgentPingMonitor`: same check-interval/ping-timeout
//! shape, ported from a daemon thread + `threading.Event` to a Tokio task
//! with a oneshot-channel stop signal.

use std::sync::Arc;
use std::time::Duration;

use edr_shared::{now_ts, AgentStatus};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::registry::AgentRegistry;
use crate::telemetry::metrics;

pub struct LivenessMonitor {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LivenessMonitor {
    pub fn start(registry: Arc<AgentRegistry>, check_interval: Duration, ping_timeout_secs: i64) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep(&registry, ping_timeout_secs).await;
                    }
                    _ = &mut stop_rx => {
                        tracing::info!("liveness monitor stopping");
                        break;
                    }
                }
            }
        });
        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Signals the sweep loop to stop and joins with a 5 s grace period.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }
}

async fn sweep(registry: &Arc<AgentRegistry>, ping_timeout_secs: i64) {
    metrics().liveness_sweeps.inc();
    let now = now_ts();
    let threshold = now - ping_timeout_secs;

    let agents = registry.all().await;
    let mut demoted = 0u64;
    for agent in agents {
        if agent.status != AgentStatus::Online {
            continue;
        }
        if agent.last_seen < threshold {
            tracing::info!(
                agent_id = %agent.agent_id,
                last_seen_secs_ago = now - agent.last_seen,
                "agent ping timeout, marking OFFLINE"
            );
            if let Err(err) = registry.mark_offline(&agent.agent_id).await {
                tracing::error!(agent_id = %agent.agent_id, %err, "failed to mark agent offline");
                continue;
            }
            demoted += 1;
        }
    }

    if demoted > 0 {
        metrics().liveness_demotions.inc_by(demoted);
        if let Err(err) = registry.force_save().await {
            tracing::error!(%err, "failed to force-save agent registry after liveness sweep");
        }
    }
    tracing::info!(demoted, "liveness sweep complete");
}
