mod common;

use edr_shared::{HashType, Severity};

#[tokio::test]
async fn validate_ip_rejects_malformed_addresses() {
    assert!(edr_server::iocs::IocStore::validate_ip("192.168.1.1").is_ok());
    assert!(edr_server::iocs::IocStore::validate_ip("999.168.1.1").is_err());
    assert!(edr_server::iocs::IocStore::validate_ip("not-an-ip").is_err());
    assert!(edr_server::iocs::IocStore::validate_ip("1.2.3").is_err());
}

#[tokio::test]
async fn validate_hash_checks_exact_hex_length_per_type() {
    let md5 = "a".repeat(32);
    let sha1 = "b".repeat(40);
    let sha256 = "c".repeat(64);
    assert!(edr_server::iocs::IocStore::validate_hash(&md5, HashType::Md5).is_ok());
    assert!(edr_server::iocs::IocStore::validate_hash(&sha1, HashType::Sha1).is_ok());
    assert!(edr_server::iocs::IocStore::validate_hash(&sha256, HashType::Sha256).is_ok());
    assert!(edr_server::iocs::IocStore::validate_hash(&md5, HashType::Sha1).is_err());
    assert!(edr_server::iocs::IocStore::validate_hash("zz", HashType::Md5).is_err());
}

#[tokio::test]
async fn commit_version_is_a_noop_without_pending_changes() {
    let (control, _dir) = common::test_control_plane().await;
    assert_eq!(control.iocs.version().await, 0);
    let version = control.iocs.commit_version().await.unwrap();
    assert_eq!(version, 0, "no mutation happened, commit must not bump version");
}

#[tokio::test]
async fn adding_entries_only_bumps_version_on_explicit_commit() {
    let (control, _dir) = common::test_control_plane().await;

    control
        .iocs
        .add_ip("203.0.113.5", "known scanner".to_string(), Severity::Medium)
        .await
        .unwrap();

    assert_eq!(control.iocs.version().await, 0, "add_ip alone must not bump version");

    let version = control.iocs.commit_version().await.unwrap();
    assert_eq!(version, 1);

    let (maps, committed_version) = control.iocs.snapshot().await;
    assert_eq!(committed_version, 1);
    assert!(maps.ips.contains_key("203.0.113.5"));
}

#[tokio::test]
async fn each_commit_bumps_version_by_exactly_one() {
    let (control, _dir) = common::test_control_plane().await;

    control
        .iocs
        .add_url("http://evil.example/payload", "c2".to_string(), Severity::High)
        .await
        .unwrap();
    assert_eq!(control.iocs.commit_version().await.unwrap(), 1);

    control
        .iocs
        .add_hash(&"d".repeat(64), HashType::Sha256, "malware".to_string(), Severity::Critical)
        .await
        .unwrap();
    assert_eq!(control.iocs.commit_version().await.unwrap(), 2);
}
