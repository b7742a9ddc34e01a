mod common;

use edr_shared::AgentStatus;

#[tokio::test]
async fn register_with_empty_id_assigns_uuid() {
    let (control, _dir) = common::test_control_plane().await;

    let agent = control
        .registry
        .register(
            "",
            "WIN-DESKTOP-01".to_string(),
            "10.0.0.5".to_string(),
            "AA:BB:CC:DD:EE:FF".to_string(),
            "alice".to_string(),
            "Windows 11".to_string(),
            "1.2.0".to_string(),
        )
        .await
        .expect("register succeeds");

    assert!(!agent.agent_id.is_empty());
    assert_eq!(agent.hostname, "WIN-DESKTOP-01");
    assert_eq!(agent.status, AgentStatus::Registered);
    assert_eq!(agent.ioc_version, 0);
}

#[tokio::test]
async fn re_registration_overwrites_fields_but_keeps_id() {
    let (control, _dir) = common::test_control_plane().await;

    let first = control
        .registry
        .register(
            "agent-123",
            "OLD-NAME".to_string(),
            "10.0.0.1".to_string(),
            "00:00:00:00:00:01".to_string(),
            "bob".to_string(),
            "Windows 10".to_string(),
            "1.0.0".to_string(),
        )
        .await
        .unwrap();

    // Bump ioc_version the way a real push would, to show re-registration
    // doesn't reset it.
    control.registry.set_ioc_version("agent-123", 7).await.unwrap();

    let second = control
        .registry
        .register(
            "agent-123",
            "NEW-NAME".to_string(),
            "10.0.0.2".to_string(),
            "00:00:00:00:00:02".to_string(),
            "carol".to_string(),
            "Windows 11".to_string(),
            "2.0.0".to_string(),
        )
        .await
        .unwrap();

    assert_eq!(first.agent_id, second.agent_id);
    assert_eq!(second.hostname, "NEW-NAME");
    assert_eq!(second.ip_address, "10.0.0.2");
    assert_eq!(second.ioc_version, 7, "re-registration must not reset ioc_version");
}

#[tokio::test]
async fn update_status_clamps_last_seen_monotonically() {
    let (control, _dir) = common::test_control_plane().await;
    control
        .registry
        .register(
            "agent-mono",
            "HOST".to_string(),
            "10.0.0.1".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        )
        .await
        .unwrap();

    let advanced = control
        .registry
        .update_status("agent-mono", AgentStatus::Online, 1_000, None)
        .await
        .unwrap();
    assert_eq!(advanced.last_seen, 1_000);

    // An out-of-order (stale) update must not move last_seen backwards.
    let stale = control
        .registry
        .update_status("agent-mono", AgentStatus::Online, 500, None)
        .await
        .unwrap();
    assert_eq!(stale.last_seen, 1_000);
}

#[tokio::test]
async fn mark_offline_is_idempotent() {
    let (control, _dir) = common::test_control_plane().await;
    control
        .registry
        .register(
            "agent-off",
            "HOST".to_string(),
            "10.0.0.1".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        )
        .await
        .unwrap();

    control.registry.mark_offline("agent-off").await.unwrap();
    let first_offline_at = control.registry.get("agent-off").await.unwrap().last_offline;

    control.registry.mark_offline("agent-off").await.unwrap();
    let agent = control.registry.get("agent-off").await.unwrap();

    assert_eq!(agent.status, AgentStatus::Offline);
    assert!(agent.last_offline.is_some());
    assert!(agent.last_offline >= first_offline_at);
}

#[tokio::test]
async fn find_by_hostname_is_case_insensitive_substring() {
    let (control, _dir) = common::test_control_plane().await;
    control
        .registry
        .register(
            "agent-find",
            "WIN-Desktop-07".to_string(),
            "10.0.0.9".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        )
        .await
        .unwrap();

    let found = control.registry.find_by_hostname("desktop-07").await;
    assert!(found.is_some());
    assert_eq!(found.unwrap().agent_id, "agent-find");

    assert!(control.registry.find_by_hostname("no-such-host").await.is_none());
}
