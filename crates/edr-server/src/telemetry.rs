//! Logging and metrics. `tracing` + `tracing-subscriber` for structured
//! logs, `prometheus` for the `/metrics` text exposition — the ambient
//! observability stack, independent of whatever features the control
//! plane itself does or doesn't implement.
//!
//! This drops the teacher's OpenTelemetry OTLP trace pipeline: that stack
//! exists to ship spans to an external collector, and this control plane
//! has no such collector in scope (see DESIGN.md for the dependency-drop
//! rationale). `tracing` fmt output plus Prometheus counters/gauges cover
//! the observability this system actually needs.

use std::sync::OnceLock;

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub struct Metrics {
    pub registry: Registry,
    pub connected_agents: IntGauge,
    pub online_agents: IntGauge,
    pub queue_depth: IntGauge,
    pub commands_dispatched: IntCounter,
    pub command_results_received: IntCounter,
    pub ioc_version: IntGauge,
    pub liveness_sweeps: IntCounter,
    pub liveness_demotions: IntCounter,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn build_metrics() -> Metrics {
    let registry = Registry::new();

    let connected_agents = IntGauge::new("edr_connected_agents", "Agents with a live stream").unwrap();
    let online_agents = IntGauge::new("edr_online_agents", "Agents currently ONLINE").unwrap();
    let queue_depth =
        IntGauge::new("edr_queue_depth", "Commands currently queued across all agents").unwrap();
    let commands_dispatched =
        IntCounter::new("edr_commands_dispatched_total", "Commands emitted on a stream").unwrap();
    let command_results_received = IntCounter::new(
        "edr_command_results_received_total",
        "COMMAND_RESULT frames received",
    )
    .unwrap();
    let ioc_version = IntGauge::new("edr_ioc_version", "Current IOC store version").unwrap();
    let liveness_sweeps = IntCounter::new("edr_liveness_sweeps_total", "Liveness sweeps run").unwrap();
    let liveness_demotions = IntCounter::new(
        "edr_liveness_demotions_total",
        "Agents demoted to OFFLINE by the liveness monitor",
    )
    .unwrap();

    for metric in [
        Box::new(connected_agents.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(online_agents.clone()),
        Box::new(queue_depth.clone()),
        Box::new(commands_dispatched.clone()),
        Box::new(command_results_received.clone()),
        Box::new(ioc_version.clone()),
        Box::new(liveness_sweeps.clone()),
        Box::new(liveness_demotions.clone()),
    ] {
        registry.register(metric).expect("metric names are unique");
    }

    Metrics {
        registry,
        connected_agents,
        online_agents,
        queue_depth,
        commands_dispatched,
        command_results_received,
        ioc_version,
        liveness_sweeps,
        liveness_demotions,
    }
}

pub fn init_metrics() {
    METRICS.get_or_init(build_metrics);
}

pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(build_metrics)
}

#[must_use]
pub fn render_metrics() -> String {
    let metrics = metrics();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let families = metrics.registry.gather();
    encoder.encode(&families, &mut buffer).expect("prometheus encoding");
    String::from_utf8(buffer).unwrap_or_default()
}
