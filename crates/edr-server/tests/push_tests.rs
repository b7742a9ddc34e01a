mod common;

use edr_shared::AgentStatus;

#[tokio::test]
async fn stream_local_check_enqueues_update_when_version_lags() {
    let (control, _dir) = common::test_control_plane().await;
    control
        .registry
        .register(
            "agent-lag",
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
        .iocs
        .add_ip("203.0.113.9", "test".to_string(), edr_shared::Severity::Low)
        .await
        .unwrap();
    control.iocs.commit_version().await.unwrap();

    edr_server::push::stream_local_check(&control, "agent-lag").await;

    let queued = control.queue.drain_deliverable("agent-lag", 0).await;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].command_type, edr_shared::CommandType::UpdateIocs);
}

#[tokio::test]
async fn stream_local_check_is_a_noop_when_already_current() {
    let (control, _dir) = common::test_control_plane().await;
    control
        .registry
        .register(
            "agent-current",
            "HOST".to_string(),
            "10.0.0.1".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        )
        .await
        .unwrap();

    edr_server::push::stream_local_check(&control, "agent-current").await;
    let queued = control.queue.drain_deliverable("agent-current", 0).await;
    assert!(queued.is_empty());
}

#[tokio::test]
async fn publish_only_targets_online_agents() {
    let (control, _dir) = common::test_control_plane().await;
    control
        .registry
        .register(
            "agent-online",
            "HOST-A".to_string(),
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
        .update_status("agent-online", AgentStatus::Online, edr_shared::now_ts(), None)
        .await
        .unwrap();

    control
        .registry
        .register(
            "agent-offline",
            "HOST-B".to_string(),
            "10.0.0.2".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        )
        .await
        .unwrap();

    let (success_count, total_online) = edr_server::push::publish(&control).await;
    assert_eq!(total_online, 1);
    assert_eq!(success_count, 1);

    let queued_online = control.queue.drain_deliverable("agent-online", 0).await;
    assert_eq!(queued_online.len(), 1);
    let queued_offline = control.queue.drain_deliverable("agent-offline", 0).await;
    assert!(queued_offline.is_empty());
}
