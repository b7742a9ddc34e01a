mod common;

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use edr_server::handlers::rpc;
use edr_shared::{AgentStatus, CommandType, RegisterAgentRequest, SendCommandRequest, UpdateStatusRequest};

#[tokio::test]
async fn register_agent_assigns_an_id_when_none_supplied() {
    let (control, _dir) = common::test_control_plane().await;

    let response = rpc::register_agent(
        State(control),
        Json(RegisterAgentRequest {
            agent_id: String::new(),
            hostname: "WIN-DESKTOP-42".to_string(),
            ip_address: "10.0.0.42".to_string(),
            mac_address: String::new(),
            username: String::new(),
            os_version: String::new(),
            agent_version: String::new(),
        }),
    )
    .await;

    assert!(response.0.success);
    assert!(!response.0.assigned_id.is_empty());
}

#[tokio::test]
async fn update_status_rejects_unknown_agent() {
    let (control, _dir) = common::test_control_plane().await;

    let response = rpc::update_status(
        State(control),
        Json(UpdateStatusRequest {
            agent_id: "does-not-exist".to_string(),
            status: "ONLINE".to_string(),
            system_metrics: None,
        }),
    )
    .await;

    assert!(!response.0.acknowledged);
}

#[tokio::test]
async fn send_command_rejects_update_iocs_for_offline_agent() {
    let (control, _dir) = common::test_control_plane().await;
    control
        .registry
        .register(
            "agent-x",
            "HOST".to_string(),
            "10.0.0.1".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        )
        .await
        .unwrap();

    let response = rpc::send_command(
        State(control),
        Json(SendCommandRequest {
            agent_id: "agent-x".to_string(),
            command_type: CommandType::UpdateIocs,
            params: HashMap::new(),
            priority: 1,
            timeout_seconds: 60,
        }),
    )
    .await;

    assert!(!response.0.success);
}

#[tokio::test]
async fn send_command_rejects_missing_required_parameter() {
    let (control, _dir) = common::test_control_plane().await;
    control
        .registry
        .register(
            "agent-y",
            "HOST".to_string(),
            "10.0.0.1".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        )
        .await
        .unwrap();
    control
        .registry
        .update_status("agent-y", AgentStatus::Online, edr_shared::now_ts(), None)
        .await
        .unwrap();
    control.streams.register("agent-y", make_handle()).await;

    let response = rpc::send_command(
        State(control),
        Json(SendCommandRequest {
            agent_id: "agent-y".to_string(),
            command_type: CommandType::DeleteFile,
            params: HashMap::new(),
            priority: 1,
            timeout_seconds: 60,
        }),
    )
    .await;

    assert!(!response.0.success);
    assert!(
        response.0.message.contains("DELETE_FILE"),
        "message must quote the wire name, not Rust's Debug casing: {}",
        response.0.message
    );
    assert!(response.0.message.contains("path"));
}

#[tokio::test]
async fn send_command_enqueues_when_agent_has_active_stream() {
    let (control, _dir) = common::test_control_plane().await;
    control
        .registry
        .register(
            "agent-z",
            "HOST".to_string(),
            "10.0.0.1".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        )
        .await
        .unwrap();
    control
        .registry
        .update_status("agent-z", AgentStatus::Online, edr_shared::now_ts(), None)
        .await
        .unwrap();
    control.streams.register("agent-z", make_handle()).await;

    let mut params = HashMap::new();
    params.insert("pid".to_string(), "4242".to_string());

    let response = rpc::send_command(
        State(control.clone()),
        Json(SendCommandRequest {
            agent_id: "agent-z".to_string(),
            command_type: CommandType::KillProcess,
            params,
            priority: 1,
            timeout_seconds: 60,
        }),
    )
    .await;

    assert!(response.0.success);
    let queued = control.queue.drain_deliverable("agent-z", 0).await;
    assert_eq!(queued.len(), 1);
}

fn make_handle() -> edr_server::stream_registry::StreamHandle {
    let (tx, _rx) = tokio::sync::oneshot::channel();
    edr_server::stream_registry::StreamHandle::new(tx)
}
