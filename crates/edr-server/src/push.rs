//! IOC push orchestration: the stream-local lazy check run from inside a
//! stream's writer loop, and the fleet-wide publish triggered after an
//! admin commits a batch of IOC edits.

use std::collections::HashMap;
use std::time::Duration;

use edr_shared::{now_ts, AgentStatus, Command, CommandType};

use crate::state::ControlPlane;

/// If `agent_id`'s confirmed IOC version lags the store's current version,
/// enqueues an `UPDATE_IOCS` command (subject to the queue's own de-dup).
pub async fn stream_local_check(control: &ControlPlane, agent_id: &str) {
    let Some(agent) = control.registry.get(agent_id).await else {
        return;
    };
    let current_version = control.iocs.version().await;
    if agent.ioc_version < current_version {
        let command = Command::new(agent_id.to_string(), CommandType::UpdateIocs, HashMap::new());
        control.queue.enqueue(command).await;
    }
}

const RETRY_DELAYS_MS: [u64; 3] = [0, 500, 1000];

/// Enqueues `UPDATE_IOCS` for every currently ONLINE agent, retrying each
/// enqueue up to 3 times with 0/500/1000 ms backoff if it raises. Returns
/// `(success_count, total_online)`.
pub async fn publish(control: &ControlPlane) -> (usize, usize) {
    let agents: Vec<_> = control
        .registry
        .all()
        .await
        .into_iter()
        .filter(|a| a.status == AgentStatus::Online)
        .collect();
    let total_online = agents.len();
    let mut success_count = 0usize;

    for agent in agents {
        if enqueue_with_retry(control, &agent.agent_id).await {
            success_count += 1;
        }
    }

    tracing::info!(success_count, total_online, server_time = now_ts(), "ioc fleet publish complete");
    (success_count, total_online)
}

/// `CommandQueue::enqueue` cannot currently fail, so this loop always
/// succeeds on the first attempt; the retry/backoff shape is kept so a
/// future bounded queue (see §5's `max_queue_depth` extension point) can
/// start rejecting enqueues without changing this function's contract.
async fn enqueue_with_retry(control: &ControlPlane, agent_id: &str) -> bool {
    for delay_ms in RETRY_DELAYS_MS {
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        let command = Command::new(agent_id.to_string(), CommandType::UpdateIocs, HashMap::new());
        control.queue.enqueue(command).await;
        return true;
    }
    false
}
