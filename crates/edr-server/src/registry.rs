//! Authoritative agent records: ID assignment with collision protection,
//! status transitions, liveness bookkeeping.

use edr_shared::{now_ts, Agent, AgentMetrics, AgentStatus, EdrError, Result};
use uuid::Uuid;

use crate::persistence::JsonCollection;
use crate::telemetry::metrics;

const MAX_ID_COLLISION_RETRIES: usize = 5;

pub struct AgentRegistry {
    store: JsonCollection<Agent>,
}

impl AgentRegistry {
    #[must_use]
    pub const fn new(store: JsonCollection<Agent>) -> Self {
        Self { store }
    }

    /// Registers a new agent or re-registers an existing one. Mirrors
    /// §4.3: an empty `agent_id` gets a fresh UUID (retried on collision),
    /// a supplied id that already exists is treated as re-registration that
    /// retains the id and `ioc_version` but overwrites descriptive fields.
    pub async fn register(
        &self,
        agent_id: &str,
        hostname: String,
        ip_address: String,
        mac_address: String,
        username: String,
        os_version: String,
        agent_version: String,
    ) -> Result<Agent> {
        let now = now_ts();

        if agent_id.is_empty() {
            for _ in 0..MAX_ID_COLLISION_RETRIES {
                let candidate = Uuid::new_v4().to_string();
                if !self.store.contains(&candidate).await {
                    let mut agent = Agent::new(candidate.clone(), now);
                    agent.hostname = hostname;
                    agent.ip_address = ip_address;
                    agent.mac_address = mac_address;
                    agent.username = username;
                    agent.os_version = os_version;
                    agent.agent_version = agent_version;
                    self.store.put(candidate, agent.clone()).await;
                    return Ok(agent);
                }
            }
            return Err(EdrError::Invariant(
                "exhausted agent id collision retries".into(),
            ));
        }

        if let Some(mut existing) = self.store.get(agent_id).await {
            existing.hostname = hostname;
            existing.ip_address = ip_address;
            existing.mac_address = mac_address;
            existing.username = username;
            existing.os_version = os_version;
            existing.agent_version = agent_version;
            existing.last_seen = now.max(existing.last_seen);
            self.store.put(agent_id.to_string(), existing.clone()).await;
            return Ok(existing);
        }

        let mut agent = Agent::new(agent_id.to_string(), now);
        agent.hostname = hostname;
        agent.ip_address = ip_address;
        agent.mac_address = mac_address;
        agent.username = username;
        agent.os_version = os_version;
        agent.agent_version = agent_version;
        self.store.put(agent_id.to_string(), agent.clone()).await;
        Ok(agent)
    }

    /// Auto-creates a minimal `PENDING_REGISTRATION` record for an agent_id
    /// seen on the stream before any unary `RegisterAgent` call, per §4.5
    /// step 2.
    pub async fn get_or_auto_create(&self, agent_id: &str) -> Agent {
        if let Some(agent) = self.store.get(agent_id).await {
            return agent;
        }
        let agent = Agent::new(agent_id.to_string(), now_ts());
        self.store.put(agent_id.to_string(), agent.clone()).await;
        agent
    }

    pub async fn get(&self, agent_id: &str) -> Option<Agent> {
        self.store.get(agent_id).await
    }

    pub async fn all(&self) -> Vec<Agent> {
        self.store.all().await
    }

    /// Latest-wins update of status and metrics; `last_seen` is clamped to
    /// never move backwards.
    pub async fn update_status(
        &self,
        agent_id: &str,
        status: AgentStatus,
        last_seen: i64,
        metrics: Option<AgentMetrics>,
    ) -> Result<Agent> {
        let mut agent = self
            .store
            .get(agent_id)
            .await
            .ok_or_else(|| EdrError::UnknownAgent(agent_id.to_string()))?;
        agent.status = status;
        agent.last_seen = last_seen.max(agent.last_seen);
        if let Some(reported) = metrics {
            agent.metrics = reported;
        }
        self.store.put(agent_id.to_string(), agent.clone()).await;
        self.refresh_online_gauge().await;
        Ok(agent)
    }

    /// Updates `last_seen` only, without touching status. Used by
    /// `AGENT_RUNNING` frames and ping activity.
    pub async fn touch(&self, agent_id: &str, now: i64) -> Result<()> {
        let mut agent = self
            .store
            .get(agent_id)
            .await
            .ok_or_else(|| EdrError::UnknownAgent(agent_id.to_string()))?;
        agent.last_seen = now.max(agent.last_seen);
        self.store.put(agent_id.to_string(), agent).await;
        Ok(())
    }

    /// Idempotent: sets `status = OFFLINE` and records `last_offline`.
    pub async fn mark_offline(&self, agent_id: &str) -> Result<()> {
        let Some(mut agent) = self.store.get(agent_id).await else {
            return Err(EdrError::UnknownAgent(agent_id.to_string()));
        };
        agent.status = AgentStatus::Offline;
        agent.last_offline = Some(now_ts());
        self.store.put(agent_id.to_string(), agent).await;
        self.refresh_online_gauge().await;
        Ok(())
    }

    /// Recomputes `edr_online_agents` from the current store contents.
    /// Called after every transition that can change ONLINE membership.
    async fn refresh_online_gauge(&self) {
        let online = self
            .store
            .all()
            .await
            .iter()
            .filter(|a| a.status == AgentStatus::Online)
            .count();
        metrics().online_agents.set(online as i64);
    }

    /// Records the agent's confirmed IOC version after a push completes.
    pub async fn set_ioc_version(&self, agent_id: &str, version: u64) -> Result<()> {
        let Some(mut agent) = self.store.get(agent_id).await else {
            return Err(EdrError::UnknownAgent(agent_id.to_string()));
        };
        agent.ioc_version = version;
        self.store.put(agent_id.to_string(), agent).await;
        Ok(())
    }

    pub async fn set_last_ioc_match(&self, agent_id: &str, summary: String) -> Result<()> {
        let Some(mut agent) = self.store.get(agent_id).await else {
            return Err(EdrError::UnknownAgent(agent_id.to_string()));
        };
        agent.last_ioc_match = Some(summary);
        self.store.put(agent_id.to_string(), agent).await;
        Ok(())
    }

    pub async fn find_by_hostname(&self, hostname: &str) -> Option<Agent> {
        let needle = hostname.to_lowercase();
        self.store
            .all()
            .await
            .into_iter()
            .find(|a| a.hostname.to_lowercase().contains(&needle))
    }

    pub async fn find_by_ip(&self, ip: &str) -> Option<Agent> {
        self.store.all().await.into_iter().find(|a| a.ip_address == ip)
    }

    pub async fn force_save(&self) -> Result<()> {
        self.store.force_save().await
    }
}
