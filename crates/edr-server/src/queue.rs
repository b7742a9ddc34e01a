//! Per-agent ordered command queue: enqueue, de-dup of `UPDATE_IOCS`,
//! timestamp-descending drain, ack-driven removal.

use std::collections::HashMap;
use std::sync::Arc;

use edr_shared::{Command, CommandType};
use tokio::sync::{Mutex, Notify};

use crate::telemetry::metrics;

#[derive(Default)]
struct AgentQueue {
    commands: Vec<Command>,
    notify: Arc<Notify>,
}

/// Single global mutex guarding the map-of-lists, per §5 — sufficient at
/// this system's target scale (a per-agent lock would add complexity
/// without a measured contention problem to justify it).
#[derive(Default)]
pub struct CommandQueue {
    queues: Mutex<HashMap<String, AgentQueue>>,
}

impl CommandQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `command`, unless it is `UPDATE_IOCS` and the agent's queue
    /// already holds one, in which case it is silently dropped.
    pub async fn enqueue(&self, command: Command) {
        let mut queues = self.queues.lock().await;
        let entry = queues.entry(command.agent_id.clone()).or_default();
        if command.command_type == CommandType::UpdateIocs
            && entry
                .commands
                .iter()
                .any(|c| c.command_type == CommandType::UpdateIocs)
        {
            tracing::debug!(agent_id = %command.agent_id, "dropping duplicate UPDATE_IOCS enqueue");
            return;
        }
        entry.commands.push(command);
        entry.notify.notify_one();
        Self::refresh_depth_gauge(&queues);
    }

    /// Returns a clone of the `Notify` the writer task should await to learn
    /// about new enqueues for `agent_id`, without removing anything.
    pub async fn notifier(&self, agent_id: &str) -> Arc<Notify> {
        let mut queues = self.queues.lock().await;
        queues.entry(agent_id.to_string()).or_default().notify.clone()
    }

    /// Commands with `timestamp > after_ts`, sorted by timestamp descending
    /// (ties by insertion order, since `Vec` retains insertion order and a
    /// stable sort preserves it among equal keys). Delivered commands are
    /// not removed here; the caller must call [`CommandQueue::ack_delivered`].
    pub async fn drain_deliverable(&self, agent_id: &str, after_ts: i64) -> Vec<Command> {
        let queues = self.queues.lock().await;
        let Some(entry) = queues.get(agent_id) else {
            return Vec::new();
        };
        let mut deliverable: Vec<Command> = entry
            .commands
            .iter()
            .filter(|c| c.timestamp > after_ts)
            .cloned()
            .collect();
        deliverable.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        deliverable
    }

    pub async fn ack_delivered(&self, agent_id: &str, command_ids: &[String]) {
        let mut queues = self.queues.lock().await;
        if let Some(entry) = queues.get_mut(agent_id) {
            entry.commands.retain(|c| !command_ids.contains(&c.command_id));
        }
        Self::refresh_depth_gauge(&queues);
    }

    /// Defensive cleanup called on result arrival in case a command lingers
    /// in the queue despite already having been delivered.
    pub async fn remove(&self, agent_id: &str, command_id: &str) {
        let mut queues = self.queues.lock().await;
        if let Some(entry) = queues.get_mut(agent_id) {
            entry.commands.retain(|c| c.command_id != command_id);
        }
        Self::refresh_depth_gauge(&queues);
    }

    /// Recomputes `edr_queue_depth` as the sum of per-agent queue lengths.
    /// Called after every mutation of `queues`, under the same lock guard.
    fn refresh_depth_gauge(queues: &HashMap<String, AgentQueue>) {
        let total: usize = queues.values().map(|q| q.commands.len()).sum();
        metrics().queue_depth.set(total as i64);
    }

    pub async fn contains_command(&self, agent_id: &str, command_id: &str) -> Option<Command> {
        let queues = self.queues.lock().await;
        queues
            .get(agent_id)
            .and_then(|entry| entry.commands.iter().find(|c| c.command_id == command_id).cloned())
    }
}
