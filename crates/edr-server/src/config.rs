//! Environment-driven configuration, mirroring the teacher's
//! `Config::from_env` convention: read an env var, fall back to a sane
//! default, no config file format for the server process itself.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub heartbeat_interval_secs: u64,
    pub inactivity_timeout_secs: u64,
    pub ioc_recheck_interval_secs: u64,
    pub liveness_check_interval_secs: u64,
    pub ping_timeout_secs: i64,
    pub save_interval_secs: u64,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
    pub tls_client_ca_path: Option<PathBuf>,
    pub seed_demo_data: bool,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("EDR_BIND_ADDR", "0.0.0.0:8443"),
            data_dir: PathBuf::from(env_or("EDR_DATA_DIR", "data")),
            heartbeat_interval_secs: env_parsed("EDR_HEARTBEAT_INTERVAL_SECS", 60),
            inactivity_timeout_secs: env_parsed("EDR_INACTIVITY_TIMEOUT_SECS", 180),
            ioc_recheck_interval_secs: env_parsed("EDR_IOC_RECHECK_INTERVAL_SECS", 15),
            liveness_check_interval_secs: env_parsed("EDR_LIVENESS_CHECK_INTERVAL_SECS", 60),
            ping_timeout_secs: env_parsed("EDR_PING_TIMEOUT_SECS", 600),
            save_interval_secs: env_parsed("EDR_SAVE_INTERVAL_SECS", 60),
            tls_cert_path: std::env::var("EDR_TLS_CERT_PATH").ok().map(PathBuf::from),
            tls_key_path: std::env::var("EDR_TLS_KEY_PATH").ok().map(PathBuf::from),
            tls_client_ca_path: std::env::var("EDR_TLS_CLIENT_CA_PATH").ok().map(PathBuf::from),
            seed_demo_data: std::env::var("EDR_SEED_DEMO").as_deref() == Ok("1"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
