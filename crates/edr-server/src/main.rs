use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use edr_server::config::Config;
use edr_server::state::ControlPlane;
use edr_server::{create_app, liveness::LivenessMonitor, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    telemetry::init_tracing();
    telemetry::init_metrics();

    let config = Config::from_env();
    let control = ControlPlane::bootstrap(config).await?;

    let mut liveness = LivenessMonitor::start(
        control.registry.clone(),
        Duration::from_secs(control.config.liveness_check_interval_secs),
        control.config.ping_timeout_secs,
    );

    let app = create_app(control.clone());
    let addr: SocketAddr = control
        .config
        .bind_addr
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8443)));

    match (&control.config.tls_cert_path, &control.config.tls_key_path) {
        (Some(cert_path), Some(key_path)) => {
            tracing::info!(%addr, "edr-server starting with TLS");
            let tls_config = build_rustls_config(
                cert_path,
                key_path,
                control.config.tls_client_ca_path.as_deref(),
            )?;
            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
            });
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        _ => {
            tracing::warn!(
                %addr,
                "no EDR_TLS_CERT_PATH/EDR_TLS_KEY_PATH configured, falling back to plaintext HTTP"
            );
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    control.force_save_all().await?;
    liveness.stop().await;
    Ok(())
}

/// Builds the rustls `ServerConfig` for the stream + unary-RPC transport.
/// When `client_ca_path` is set, client certificates are required and
/// verified against that CA per §6's mutual-TLS option.
fn build_rustls_config(
    cert_path: &std::path::Path,
    key_path: &std::path::Path,
    client_ca_path: Option<&std::path::Path>,
) -> anyhow::Result<axum_server::tls_rustls::RustlsConfig> {
    use rustls::server::WebPkiClientVerifier;
    use rustls::{RootCertStore, ServerConfig};

    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let server_config = if let Some(ca_path) = client_ca_path {
        let mut roots = RootCertStore::empty();
        for cert in load_certs(ca_path)? {
            roots.add(cert)?;
        }
        let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|e| anyhow::anyhow!("building client cert verifier: {e}"))?;
        ServerConfig::builder()
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key)?
    } else {
        ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?
    };

    Ok(axum_server::tls_rustls::RustlsConfig::from_config(Arc::new(
        server_config,
    )))
}

fn load_certs(path: &std::path::Path) -> anyhow::Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let bytes = std::fs::read(path)?;
    let mut reader = std::io::Cursor::new(bytes);
    Ok(rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?)
}

fn load_key(path: &std::path::Path) -> anyhow::Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let bytes = std::fs::read(path)?;
    let mut reader = std::io::Cursor::new(bytes);
    rustls_pemfile::private_key(&mut reader)?.ok_or_else(|| anyhow::anyhow!("no private key found in {path:?}"))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("received shutdown signal");
}
