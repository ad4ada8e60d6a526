//! HTTP server command implementation.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use rsrelay::config::Config;
use rsrelay::server::{self, AppState};
use rsrelay::service::RelayService;
use rsrelay::session::{InMemorySessionStore, SessionStore};
use rsrelay::sync::KeyedLocks;

pub async fn run(
    config_path: &str,
    host_override: Option<IpAddr>,
    port_override: Option<u16>,
    endpoint_override: Option<String>,
) -> Result<()> {
    let mut config = Config::load(config_path)
        .await
        .with_context(|| format!("failed to load {config_path}"))?;

    // CLI overrides config
    if let Some(host) = host_override {
        config.server.host = host.to_string();
    }
    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(endpoint) = endpoint_override {
        config.remote.endpoint = endpoint;
    }

    let relay = RelayService::new(&config).context("failed to build remote API client")?;
    info!(
        endpoint = %config.remote.base_url(),
        cookie = %config.remote.auth_cookie_name,
        "Relaying to remote API"
    );

    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let mut state = AppState::new(relay, sessions).with_api_token(config.server.api_token.clone());
    state.session_locks = KeyedLocks::with_sweeper("session_locks");
    if state.api_token.is_none() {
        warn!("No api_token configured, accepting loopback callers only");
    }

    let app = server::build_app(state, config.server.request_timeout_seconds);

    let ip: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server.host '{}'", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(addr = %addr, "Starting server");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
