mod common;

use std::time::Duration;

use edr_server::liveness::LivenessMonitor;
use edr_shared::AgentStatus;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn sweep_demotes_agents_past_the_ping_timeout() {
    let (control, _dir) = common::test_control_plane().await;

    control
        .registry
        .register(
            "agent-stale",
            "HOST".to_string(),
            "10.0.0.1".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        )
        .await
        .unwrap();
    // last_seen far enough in the past to already be beyond a 1s timeout.
    control
        .registry
        .update_status("agent-stale", AgentStatus::Online, edr_shared::now_ts() - 10, None)
        .await
        .unwrap();

    let mut monitor = LivenessMonitor::start(control.registry.clone(), Duration::from_millis(50), 1);
    tokio::time::sleep(Duration::from_millis(200)).await;
    monitor.stop().await;

    let agent = control.registry.get("agent-stale").await.unwrap();
    assert_eq!(agent.status, AgentStatus::Offline);
    assert!(agent.last_offline.is_some());
}

#[tokio::test]
#[serial]
async fn sweep_leaves_recently_seen_agents_online() {
    let (control, _dir) = common::test_control_plane().await;

    control
        .registry
        .register(
            "agent-fresh",
            "HOST".to_string(),
            "10.0.0.2".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        )
        .await
        .unwrap();
    control
        .registry
        .update_status("agent-fresh", AgentStatus::Online, edr_shared::now_ts(), None)
        .await
        .unwrap();

    let mut monitor = LivenessMonitor::start(control.registry.clone(), Duration::from_millis(50), 600);
    tokio::time::sleep(Duration::from_millis(200)).await;
    monitor.stop().await;

    let agent = control.registry.get("agent-fresh").await.unwrap();
    assert_eq!(agent.status, AgentStatus::Online);
}
