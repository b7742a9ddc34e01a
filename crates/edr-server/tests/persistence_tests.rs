mod common;

use std::time::Duration;

use edr_server::persistence::JsonCollection;
use edr_shared::Agent;
use tempfile::TempDir;

#[tokio::test]
async fn force_save_then_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let collection: JsonCollection<Agent> =
        JsonCollection::load(dir.path(), "agents", Duration::from_secs(60)).await.unwrap();

    let agent = Agent::new("agent-x".to_string(), 1_000);
    collection.put("agent-x".to_string(), agent.clone()).await;
    collection.force_save().await.unwrap();

    let reloaded: JsonCollection<Agent> =
        JsonCollection::load(dir.path(), "agents", Duration::from_secs(60)).await.unwrap();
    let fetched = reloaded.get("agent-x").await.unwrap();
    assert_eq!(fetched.agent_id, "agent-x");
    assert_eq!(fetched.registration_time, 1_000);
}

#[tokio::test]
async fn missing_file_loads_as_empty_collection() {
    let dir = TempDir::new().unwrap();
    let collection: JsonCollection<Agent> =
        JsonCollection::load(dir.path(), "agents", Duration::from_secs(60)).await.unwrap();
    assert!(collection.all().await.is_empty());
}

#[tokio::test]
async fn corrupted_file_is_renamed_aside_and_recovered_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("agents.json");
    tokio::fs::write(&path, b"{ not valid json").await.unwrap();

    let collection: JsonCollection<Agent> =
        JsonCollection::load(dir.path(), "agents", Duration::from_secs(60)).await.unwrap();
    assert!(collection.all().await.is_empty());

    let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
    let mut saw_corrupted_copy = false;
    while let Some(entry) = entries.next_entry().await.unwrap() {
        if entry.file_name().to_string_lossy().contains("agents.json.corrupted.") {
            saw_corrupted_copy = true;
        }
    }
    assert!(saw_corrupted_copy, "corrupted file must be renamed aside, not deleted");
}

#[tokio::test]
async fn force_save_all_flushes_every_collection_and_commits_ioc_version() {
    let (control, _dir) = common::test_control_plane().await;
    control
        .registry
        .register(
            "agent-persist",
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
        .add_ip("198.51.100.4", "test".to_string(), edr_shared::Severity::Low)
        .await
        .unwrap();

    control.force_save_all().await.unwrap();
    assert_eq!(control.iocs.version().await, 1, "force_save_all must commit pending IOC changes");
}
