use std::path::PathBuf;

use edr_server::config::Config;
use edr_server::state::ControlPlane;
use tempfile::TempDir;

/// Builds a `ControlPlane` rooted at a fresh temp directory. The directory
/// is returned alongside the plane so it stays alive for the test's
/// duration instead of being cleaned up immediately on drop.
pub async fn test_control_plane() -> (ControlPlane, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let config = Config {
        bind_addr: "127.0.0.1:0".to_string(),
        data_dir: PathBuf::from(dir.path()),
        heartbeat_interval_secs: 60,
        inactivity_timeout_secs: 180,
        ioc_recheck_interval_secs: 15,
        liveness_check_interval_secs: 60,
        ping_timeout_secs: 600,
        save_interval_secs: 60,
        tls_cert_path: None,
        tls_key_path: None,
        tls_client_ca_path: None,
        seed_demo_data: false,
    };
    let control = ControlPlane::bootstrap(config).await.expect("bootstrap control plane");
    (control, dir)
}
