//! Unary RPC handlers (§4.10), grounded on the teacher's
//! `handlers::agents` handler-calls-service shape, stripped of the
//! auth/tenant middleware this system's non-goals exclude.

use axum::extract::State;
use axum::Json;
use edr_shared::{now_ts, AgentStatus, Command, CommandType, IocMatch, IocMatchAck, IocMatchReport};
use edr_shared::{RegisterAgentRequest, RegisterAgentResponse, SendCommandRequest, SendCommandResponse};
use edr_shared::{UpdateStatusRequest, UpdateStatusResponse};

use crate::state::ControlPlane;

pub async fn register_agent(
    State(control): State<ControlPlane>,
    Json(request): Json<RegisterAgentRequest>,
) -> Json<RegisterAgentResponse> {
    match control
        .registry
        .register(
            &request.agent_id,
            request.hostname,
            request.ip_address,
            request.mac_address,
            request.username,
            request.os_version,
            request.agent_version,
        )
        .await
    {
        Ok(agent) => Json(RegisterAgentResponse {
            assigned_id: agent.agent_id,
            success: true,
            server_time: now_ts(),
        }),
        Err(err) => {
            tracing::error!(%err, "RegisterAgent failed");
            Json(RegisterAgentResponse {
                assigned_id: String::new(),
                success: false,
                server_time: now_ts(),
            })
        }
    }
}

pub async fn update_status(
    State(control): State<ControlPlane>,
    Json(request): Json<UpdateStatusRequest>,
) -> Json<UpdateStatusResponse> {
    let status = match request.status.to_uppercase().as_str() {
        "ONLINE" => AgentStatus::Online,
        "OFFLINE" => AgentStatus::Offline,
        "PENDING_REGISTRATION" => AgentStatus::PendingRegistration,
        _ => AgentStatus::Registered,
    };
    let metrics = request.system_metrics.map(|m| edr_shared::AgentMetrics {
        cpu_usage: m.cpu_usage,
        memory_usage: m.memory_usage,
        uptime: m.uptime,
    });
    let acknowledged = control
        .registry
        .update_status(&request.agent_id, status, now_ts(), metrics)
        .await
        .is_ok();
    Json(UpdateStatusResponse {
        acknowledged,
        server_time: now_ts(),
    })
}

pub async fn report_ioc_match(
    State(control): State<ControlPlane>,
    Json(report): Json<IocMatchReport>,
) -> Json<IocMatchAck> {
    let ioc_match = IocMatch {
        report_id: report.report_id.clone(),
        agent_id: report.agent_id.clone(),
        timestamp: report.timestamp,
        match_type: report.match_type,
        ioc_value: report.ioc_value,
        matched_value: report.matched_value,
        context: report.context,
        severity: report.severity,
        action_taken: report.action_taken,
        action_success: report.action_success,
        action_message: report.action_message,
        server_received_at: now_ts(),
    };
    control.ioc_matches.put(ioc_match).await;
    Json(IocMatchAck {
        report_id: report.report_id,
        received: true,
        message: "recorded".to_string(),
    })
}

const ACTIVE_STREAM_GRACE_SECS: i64 = 300;

/// Fire-and-forget command injection for external callers (e.g. the
/// out-of-scope alert-to-command auto-response mapper). Validates the
/// agent, its liveness, and the command's required parameters before
/// enqueueing; never waits for a `CommandResult`.
pub async fn send_command(
    State(control): State<ControlPlane>,
    Json(request): Json<SendCommandRequest>,
) -> Json<SendCommandResponse> {
    let Some(agent) = control.registry.get(&request.agent_id).await else {
        return Json(SendCommandResponse {
            success: false,
            message: format!("unknown agent: {}", request.agent_id),
        });
    };

    if request.command_type == CommandType::UpdateIocs {
        if agent.status != AgentStatus::Online {
            return Json(SendCommandResponse {
                success: false,
                message: "agent is not ONLINE".to_string(),
            });
        }
    } else {
        let recently_seen = now_ts() - agent.last_seen < ACTIVE_STREAM_GRACE_SECS;
        let has_stream = control.streams.is_registered(&request.agent_id).await;
        if !recently_seen || !has_stream {
            return Json(SendCommandResponse {
                success: false,
                message: "agent has no active stream".to_string(),
            });
        }
    }

    let mut command = Command::new(request.agent_id.clone(), request.command_type, request.params);
    command.priority = request.priority;
    command.timeout_seconds = request.timeout_seconds;

    if let Some(missing) = command.missing_param() {
        return Json(SendCommandResponse {
            success: false,
            message: format!(
                "{} requires parameter \"{missing}\"",
                command.command_type.wire_name()
            ),
        });
    }

    command.timestamp = now_ts();
    control.queue.enqueue(command).await;

    Json(SendCommandResponse {
        success: true,
        message: "enqueued".to_string(),
    })
}
