//! Wire types for the bidirectional agent stream and the unary RPC surface.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Command, CommandResult, CommandType, IocEntry, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    AgentHello,
    AgentStatus,
    AgentRunning,
    AgentShutdown,
    ServerCommand,
    CommandResult,
    IocData,
    IocMatch,
    IocMatchAck,
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHello {
    pub agent_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    pub agent_id: String,
    pub timestamp: i64,
    pub status: String,
    #[serde(default)]
    pub system_metrics: Option<SystemMetrics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub uptime: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningSignal {
    pub agent_id: String,
    pub timestamp: i64,
    #[serde(default)]
    pub system_metrics: Option<SystemMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownSignal {
    pub agent_id: String,
    pub timestamp: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IocResponse {
    pub update_available: bool,
    pub version: u64,
    pub timestamp: i64,
    pub ip_addresses: HashMap<String, IocEntry>,
    pub file_hashes: HashMap<String, IocEntry>,
    pub urls: HashMap<String, IocEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IocMatchReport {
    pub report_id: String,
    pub agent_id: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub match_type: crate::models::IocMatchType,
    pub ioc_value: String,
    pub matched_value: String,
    pub context: String,
    pub severity: Severity,
    pub action_taken: Option<CommandType>,
    pub action_success: Option<bool>,
    pub action_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IocMatchAck {
    pub report_id: String,
    pub received: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingMessage {
    pub agent_id: String,
    pub timestamp: i64,
}

/// A single frame on the bidirectional stream. Tagged on `message_type` so
/// both directions share one wire enum instead of separate request/response
/// types per frame kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message_type", content = "payload")]
pub enum CommandMessage {
    #[serde(rename = "AGENT_HELLO")]
    AgentHello(AgentHello),
    #[serde(rename = "AGENT_STATUS")]
    AgentStatus(StatusRequest),
    #[serde(rename = "AGENT_RUNNING")]
    AgentRunning(RunningSignal),
    #[serde(rename = "AGENT_SHUTDOWN")]
    AgentShutdown(ShutdownSignal),
    #[serde(rename = "SERVER_COMMAND")]
    ServerCommand(Command),
    #[serde(rename = "COMMAND_RESULT")]
    CommandResultFrame(CommandResult),
    #[serde(rename = "IOC_DATA")]
    IocData(IocResponse),
    #[serde(rename = "IOC_MATCH")]
    IocMatch(IocMatchReport),
    #[serde(rename = "IOC_MATCH_ACK")]
    IocMatchAck(IocMatchAck),
    #[serde(rename = "PING")]
    Ping(PingMessage),
}

impl CommandMessage {
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::AgentHello(_) => MessageType::AgentHello,
            Self::AgentStatus(_) => MessageType::AgentStatus,
            Self::AgentRunning(_) => MessageType::AgentRunning,
            Self::AgentShutdown(_) => MessageType::AgentShutdown,
            Self::ServerCommand(_) => MessageType::ServerCommand,
            Self::CommandResultFrame(_) => MessageType::CommandResult,
            Self::IocData(_) => MessageType::IocData,
            Self::IocMatch(_) => MessageType::IocMatch,
            Self::IocMatchAck(_) => MessageType::IocMatchAck,
            Self::Ping(_) => MessageType::Ping,
        }
    }
}

// --- Unary RPC request/response bodies -------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAgentRequest {
    #[serde(default)]
    pub agent_id: String,
    pub hostname: String,
    pub ip_address: String,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub agent_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAgentResponse {
    pub assigned_id: String,
    pub success: bool,
    pub server_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub agent_id: String,
    pub status: String,
    #[serde(default)]
    pub system_metrics: Option<SystemMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusResponse {
    pub acknowledged: bool,
    pub server_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendCommandRequest {
    pub agent_id: String,
    #[serde(rename = "type")]
    pub command_type: CommandType,
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: i32,
}

const fn default_priority() -> i32 {
    1
}

const fn default_timeout() -> i32 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendCommandResponse {
    pub success: bool,
    pub message: String,
}
