//! The bidirectional agent stream: one Axum WebSocket connection per agent,
//! split into a reader task and a writer task per §4.5/§5. All outbound
//! frames are emitted by the writer; the reader only ever signals the
//! writer over a channel, generalizing the teacher's
//! `websocket::agent_handler::handle_agent_socket` two-task split from a
//! plain relay into the full heartbeat/inactivity/IOC-push writer contract
//! this system's stream handler needs — and explicitly not the legacy
//! "write from reader" pattern this design rejects.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use edr_shared::{now_ts, AgentStatus, CommandMessage, CommandResult, IocMatch, IocResponse};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};

use crate::push;
use crate::state::ControlPlane;
use crate::stream_registry::StreamHandle;
use crate::telemetry::metrics;

pub async fn stream_broker(ws: WebSocketUpgrade, State(control): State<ControlPlane>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream(socket, control))
}

async fn handle_stream(socket: WebSocket, control: ControlPlane) {
    let (mut sender, mut receiver) = socket.split();

    let Some(agent_id) = await_hello(&mut receiver).await else {
        tracing::debug!("stream closed before a valid AGENT_HELLO frame");
        return;
    };

    control.registry.get_or_auto_create(&agent_id).await;

    let (stop_tx, stop_rx) = oneshot::channel();
    let handle = StreamHandle::new(stop_tx);
    let generation = handle.generation();
    control.streams.register(&agent_id, handle).await;
    metrics().connected_agents.inc();

    let hello_ack = CommandMessage::AgentHello(edr_shared::AgentHello {
        agent_id: agent_id.clone(),
        timestamp: now_ts(),
    });
    if send_frame(&mut sender, &hello_ack).await.is_err() {
        control.streams.deregister(&agent_id, generation).await;
        metrics().connected_agents.dec();
        return;
    }

    let last_activity = Arc::new(AtomicI64::new(now_ts()));
    let (ack_tx, ack_rx) = mpsc::unbounded_channel();

    let reader_control = control.clone();
    let reader_agent_id = agent_id.clone();
    let reader_activity = Arc::clone(&last_activity);
    let mut reader_task = tokio::spawn(async move {
        reader_loop(receiver, reader_control, reader_agent_id, reader_activity, ack_tx).await;
    });

    let writer_control = control.clone();
    let writer_agent_id = agent_id.clone();
    let writer_activity = Arc::clone(&last_activity);
    let mut writer_task = tokio::spawn(async move {
        writer_loop(sender, writer_control, writer_agent_id, stop_rx, writer_activity, ack_rx).await;
    });

    tokio::select! {
        _ = &mut reader_task => { writer_task.abort(); }
        _ = &mut writer_task => { reader_task.abort(); }
    }

    let _ = control.registry.mark_offline(&agent_id).await;
    control.streams.deregister(&agent_id, generation).await;
    metrics().connected_agents.dec();
    tracing::info!(%agent_id, "stream closed");
}

async fn await_hello(receiver: &mut WsReceiver) -> Option<String> {
    let frame = receiver.next().await?.ok()?;
    let Message::Text(text) = frame else {
        return None;
    };
    match serde_json::from_str::<CommandMessage>(&text).ok()? {
        CommandMessage::AgentHello(hello) => Some(hello.agent_id),
        _ => None,
    }
}

async fn send_frame<S>(sender: &mut S, message: &CommandMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(err) => {
            tracing::error!(%err, "failed to serialize outbound frame");
            return Err(());
        }
    };
    sender.send(Message::Text(text)).await.map_err(|_| ())
}

type WsReceiver = futures_util::stream::SplitStream<WebSocket>;

async fn reader_loop(
    mut receiver: WsReceiver,
    control: ControlPlane,
    agent_id: String,
    last_activity: Arc<AtomicI64>,
    ack_tx: mpsc::UnboundedSender<CommandMessage>,
) {
    while let Some(frame) = receiver.next().await {
        let Ok(Message::Text(text)) = frame else {
            break;
        };
        let Ok(message) = serde_json::from_str::<CommandMessage>(&text) else {
            tracing::warn!(%agent_id, "dropping unparseable inbound frame");
            continue;
        };
        last_activity.store(now_ts(), Ordering::SeqCst);
        dispatch_inbound(&control, &agent_id, message, &ack_tx).await;
    }
}

async fn dispatch_inbound(
    control: &ControlPlane,
    agent_id: &str,
    message: CommandMessage,
    ack_tx: &mpsc::UnboundedSender<CommandMessage>,
) {
    match message {
        CommandMessage::AgentHello(_) => {}
        CommandMessage::AgentStatus(status) => {
            let agent_status = parse_status(&status.status);
            let metrics = status.system_metrics.map(|m| edr_shared::AgentMetrics {
                cpu_usage: m.cpu_usage,
                memory_usage: m.memory_usage,
                uptime: m.uptime,
            });
            if let Err(err) = control
                .registry
                .update_status(agent_id, agent_status, status.timestamp, metrics)
                .await
            {
                tracing::warn!(%agent_id, %err, "AGENT_STATUS for unknown agent");
                return;
            }
            if let Err(err) = control.registry.force_save().await {
                tracing::error!(%agent_id, %err, "force-save after AGENT_STATUS failed");
            }
        }
        CommandMessage::AgentRunning(running) => {
            if let Err(err) = control.registry.touch(agent_id, running.timestamp).await {
                tracing::warn!(%agent_id, %err, "AGENT_RUNNING for unknown agent");
            }
        }
        CommandMessage::AgentShutdown(shutdown) => {
            tracing::info!(%agent_id, reason = %shutdown.reason, "agent reported shutdown");
            if let Err(err) = control.registry.mark_offline(agent_id).await {
                tracing::warn!(%agent_id, %err, "AGENT_SHUTDOWN for unknown agent");
            }
            if let Err(err) = control.registry.force_save().await {
                tracing::error!(%agent_id, %err, "force-save after AGENT_SHUTDOWN failed");
            }
        }
        CommandMessage::CommandResultFrame(result) => {
            handle_command_result(control, agent_id, result).await;
        }
        CommandMessage::IocMatch(report) => {
            handle_ioc_match(control, agent_id, report, ack_tx).await;
        }
        CommandMessage::ServerCommand(_)
        | CommandMessage::IocData(_)
        | CommandMessage::IocMatchAck(_)
        | CommandMessage::Ping(_) => {
            // server-to-agent-only frame types; nothing to do if echoed back.
        }
    }
}

fn parse_status(status: &str) -> AgentStatus {
    match status.to_uppercase().as_str() {
        "ONLINE" => AgentStatus::Online,
        "OFFLINE" => AgentStatus::Offline,
        "PENDING_REGISTRATION" => AgentStatus::PendingRegistration,
        _ => AgentStatus::Registered,
    }
}

/// A result is IOC-related if its message mentions an IOC update, or the
/// command it answers was itself an `UPDATE_IOCS`. IOC-related results are
/// deliberately not persisted to ResultTable to avoid unbounded growth from
/// the periodic push cycle; the queued command is removed regardless.
async fn handle_command_result(control: &ControlPlane, agent_id: &str, result: CommandResult) {
    let queued = control.queue.contains_command(agent_id, &result.command_id).await;
    let is_update_iocs = queued
        .as_ref()
        .is_some_and(|c| c.command_type == edr_shared::CommandType::UpdateIocs);
    let mentions_ioc_update =
        result.message.contains("IOC update available") || result.message.contains("No IOC update available");
    let ioc_related = is_update_iocs || mentions_ioc_update;

    control.queue.remove(agent_id, &result.command_id).await;

    if ioc_related {
        if result.success && result.message.contains("IOC update available") {
            let current_version = control.iocs.version().await;
            if let Err(err) = control.registry.set_ioc_version(agent_id, current_version).await {
                tracing::warn!(%agent_id, %err, "failed to record confirmed ioc_version");
            }
        }
        return;
    }

    metrics().command_results_received.inc();
    control.results.put(result).await;
}

async fn handle_ioc_match(
    control: &ControlPlane,
    agent_id: &str,
    report: edr_shared::IocMatchReport,
    ack_tx: &mpsc::UnboundedSender<CommandMessage>,
) {
    let ioc_match = IocMatch {
        report_id: report.report_id.clone(),
        agent_id: agent_id.to_string(),
        timestamp: report.timestamp,
        match_type: report.match_type,
        ioc_value: report.ioc_value.clone(),
        matched_value: report.matched_value,
        context: report.context,
        severity: report.severity,
        action_taken: report.action_taken,
        action_success: report.action_success,
        action_message: report.action_message,
        server_received_at: now_ts(),
    };
    control.ioc_matches.put(ioc_match).await;
    let summary = format!("{:?}:{}", report.match_type, report.ioc_value);
    if let Err(err) = control.registry.set_last_ioc_match(agent_id, summary).await {
        tracing::warn!(%agent_id, %err, "failed to record last ioc match summary");
    }

    let ack = CommandMessage::IocMatchAck(edr_shared::IocMatchAck {
        report_id: report.report_id,
        received: true,
        message: "recorded".to_string(),
    });
    let _ = ack_tx.send(ack);
}

type WsSender = futures_util::stream::SplitSink<WebSocket, Message>;

#[allow(clippy::too_many_arguments)]
async fn writer_loop(
    mut sender: WsSender,
    control: ControlPlane,
    agent_id: String,
    mut stop_rx: oneshot::Receiver<()>,
    last_activity: Arc<AtomicI64>,
    mut ack_rx: mpsc::UnboundedReceiver<CommandMessage>,
) {
    let notify = control.queue.notifier(&agent_id).await;
    let mut last_outbound = now_ts();
    let mut last_command_ts: i64 = 0;

    let heartbeat_interval = Duration::from_secs(control.config.heartbeat_interval_secs);
    let inactivity_timeout = control.config.inactivity_timeout_secs as i64;
    let ioc_recheck_interval = Duration::from_secs(control.config.ioc_recheck_interval_secs);

    let mut heartbeat_ticker = tokio::time::interval(heartbeat_interval);
    let mut ioc_ticker = tokio::time::interval(ioc_recheck_interval);

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                tracing::info!(%agent_id, "writer stopping: displaced by a newer stream");
                break;
            }
            _ = heartbeat_ticker.tick() => {
                if now_ts() - last_activity.load(Ordering::SeqCst) > inactivity_timeout {
                    tracing::info!(%agent_id, "writer closing stream: inactivity timeout exceeded");
                    break;
                }
                if now_ts() - last_outbound >= control.config.heartbeat_interval_secs as i64 {
                    let ping = CommandMessage::Ping(edr_shared::PingMessage { agent_id: agent_id.clone(), timestamp: now_ts() });
                    if send_frame(&mut sender, &ping).await.is_err() { break; }
                    last_outbound = now_ts();
                }
            }
            _ = ioc_ticker.tick() => {
                push::stream_local_check(&control, &agent_id).await;
            }
            ack = ack_rx.recv() => {
                let Some(ack) = ack else {
                    tracing::debug!(%agent_id, "writer stopping: reader side closed");
                    break;
                };
                if send_frame(&mut sender, &ack).await.is_err() { break; }
                last_outbound = now_ts();
            }
            () = notify.notified() => {
                if !drain_and_emit(&mut sender, &control, &agent_id, &mut last_command_ts, &mut last_outbound).await {
                    break;
                }
            }
        }
    }
}

/// Drains deliverable commands and emits them, applying the
/// push-with-the-command pattern for `UPDATE_IOCS`. Returns `false` if the
/// socket write failed and the writer should stop.
async fn drain_and_emit(
    sender: &mut WsSender,
    control: &ControlPlane,
    agent_id: &str,
    last_command_ts: &mut i64,
    last_outbound: &mut i64,
) -> bool {
    let commands = control.queue.drain_deliverable(agent_id, *last_command_ts).await;
    if commands.is_empty() {
        return true;
    }
    let mut delivered_ids = Vec::with_capacity(commands.len());
    for command in commands {
        metrics().commands_dispatched.inc();
        let is_update_iocs = command.command_type == edr_shared::CommandType::UpdateIocs;
        let command_ts = command.timestamp;
        let command_id = command.command_id.clone();
        let frame = CommandMessage::ServerCommand(command);
        if send_frame(sender, &frame).await.is_err() {
            return false;
        }
        *last_outbound = now_ts();
        *last_command_ts = (*last_command_ts).max(command_ts);
        delivered_ids.push(command_id);

        if is_update_iocs {
            let (maps, version) = control.iocs.snapshot().await;
            let payload = IocResponse {
                update_available: true,
                version,
                timestamp: now_ts(),
                ip_addresses: maps.ips,
                file_hashes: maps.file_hashes,
                urls: maps.urls,
            };
            let ioc_frame = CommandMessage::IocData(payload);
            if send_frame(sender, &ioc_frame).await.is_err() {
                return false;
            }
            *last_outbound = now_ts();
            if let Err(err) = control.registry.set_ioc_version(agent_id, version).await {
                tracing::warn!(%agent_id, %err, "failed to update ioc_version after push");
            }
        }
    }
    control.queue.ack_delivered(agent_id, &delivered_ids).await;
    true
}
