use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an [`Agent`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    PendingRegistration,
    Registered,
    Online,
    Offline,
}

/// Most-recent-wins system metrics reported by an agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub uptime: Option<i64>,
}

/// An endpoint enrolled in the fleet. Keyed by `agent_id`, which never
/// changes once assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub hostname: String,
    pub ip_address: String,
    pub mac_address: String,
    pub username: String,
    pub os_version: String,
    pub agent_version: String,
    pub registration_time: i64,
    pub last_seen: i64,
    pub last_offline: Option<i64>,
    pub status: AgentStatus,
    #[serde(default)]
    pub metrics: AgentMetrics,
    pub ioc_version: u64,
    pub last_ioc_match: Option<String>,
}

impl Agent {
    #[must_use]
    pub fn new(agent_id: String, now: i64) -> Self {
        Self {
            agent_id,
            hostname: String::new(),
            ip_address: String::new(),
            mac_address: String::new(),
            username: String::new(),
            os_version: String::new(),
            agent_version: String::new(),
            registration_time: now,
            last_seen: now,
            last_offline: None,
            status: AgentStatus::Registered,
            metrics: AgentMetrics::default(),
            ioc_version: 0,
            last_ioc_match: None,
        }
    }
}

/// Stable, bit-exact command discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    Unknown,
    DeleteFile,
    KillProcess,
    KillProcessTree,
    BlockIp,
    BlockUrl,
    NetworkIsolate,
    NetworkRestore,
    UpdateIocs,
}

impl CommandType {
    /// Required parameter keys for this command type, per the wire contract.
    /// An empty slice means no parameters are required.
    #[must_use]
    pub const fn required_params(self) -> &'static [&'static str] {
        match self {
            Self::DeleteFile => &["path"],
            Self::KillProcess | Self::KillProcessTree => &["pid"],
            Self::BlockIp => &["ip"],
            Self::BlockUrl => &["url"],
            Self::NetworkIsolate | Self::NetworkRestore | Self::UpdateIocs | Self::Unknown => &[],
        }
    }

    /// The SCREAMING_SNAKE_CASE wire name, matching this type's serde
    /// representation. Used in user-facing messages so they quote the same
    /// string a client actually sent, not Rust's identifier casing.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::DeleteFile => "DELETE_FILE",
            Self::KillProcess => "KILL_PROCESS",
            Self::KillProcessTree => "KILL_PROCESS_TREE",
            Self::BlockIp => "BLOCK_IP",
            Self::BlockUrl => "BLOCK_URL",
            Self::NetworkIsolate => "NETWORK_ISOLATE",
            Self::NetworkRestore => "NETWORK_RESTORE",
            Self::UpdateIocs => "UPDATE_IOCS",
        }
    }
}

/// A work order addressed to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub command_id: String,
    pub agent_id: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub command_type: CommandType,
    pub params: HashMap<String, String>,
    pub priority: i32,
    pub timeout_seconds: i32,
}

impl Command {
    #[must_use]
    pub fn new(agent_id: String, command_type: CommandType, params: HashMap<String, String>) -> Self {
        Self {
            command_id: Uuid::new_v4().to_string(),
            agent_id,
            timestamp: Utc::now().timestamp(),
            command_type,
            params,
            priority: 1,
            timeout_seconds: 60,
        }
    }

    /// Returns the first required parameter key missing from `params`, if any.
    #[must_use]
    pub fn missing_param(&self) -> Option<&'static str> {
        self.command_type
            .required_params()
            .iter()
            .find(|key| !self.params.contains_key(**key))
            .copied()
    }
}

/// Outcome of one command on one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub command_id: String,
    pub agent_id: String,
    pub success: bool,
    pub message: String,
    pub execution_time: i64,
    pub duration_ms: i64,
}

/// Severity classification shared by IOC entries and IOC matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    Md5,
    Sha1,
    Sha256,
}

/// One entry in an IOC map (ip, file_hash, or url).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IocEntry {
    pub added_at: i64,
    pub description: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_type: Option<HashType>,
}

/// The three IOC maps, keyed by normalized indicator value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IocMaps {
    #[serde(rename = "ip_addresses")]
    pub ips: HashMap<String, IocEntry>,
    pub file_hashes: HashMap<String, IocEntry>,
    pub urls: HashMap<String, IocEntry>,
}

/// Version record committed alongside the IOC maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IocVersion {
    pub version: u64,
    pub updated_at: i64,
    pub hash: String,
}

impl Default for IocVersion {
    fn default() -> Self {
        Self {
            version: 0,
            updated_at: Utc::now().timestamp(),
            hash: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IocMatchType {
    Ip,
    Hash,
    Url,
}

/// A report that an agent observed an indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IocMatch {
    pub report_id: String,
    pub agent_id: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub match_type: IocMatchType,
    pub ioc_value: String,
    pub matched_value: String,
    pub context: String,
    pub severity: Severity,
    pub action_taken: Option<CommandType>,
    pub action_success: Option<bool>,
    pub action_message: Option<String>,
    pub server_received_at: i64,
}

#[must_use]
pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}
