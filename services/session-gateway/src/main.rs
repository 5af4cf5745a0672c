//! Session gateway
//!
//! Single-binary Rust service that:
//! 1. Fronts the identity provider's login endpoint
//! 2. Registers issued access tokens in the session cache
//! 3. Guards user lookups and logout behind a renewable bearer session

mod config;
mod error;
mod guard;
mod handlers;
mod metrics;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use directory::{MySqlDirectory, UserDirectory};
use identity::{Authenticator, IdentityClient};
use metrics_exporter_prometheus::PrometheusHandle;
use session_store::{MemoryTokenStore, RedisTokenStore, TokenStore, spawn_sweeper};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{CacheBackend, Config};
use crate::metrics::ServiceStats;

/// How long in-flight requests may take to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Long-lived clients shared by every request. Built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TokenStore>,
    pub authenticator: Arc<Authenticator>,
    pub directory: Arc<dyn UserDirectory>,
    pub stats: Arc<ServiceStats>,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/token", post(handlers::issue_token))
        .route("/auth", post(handlers::authenticate))
        .route("/encode", post(handlers::encode))
        .route("/users/{userId}", get(handlers::lookup_user))
        .route("/logout", get(handlers::logout))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.stats.clone(),
            metrics::track_requests,
        ))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Deployments keep credentials in a .env file next to the binary
    let dotenv = dotenvy::dotenv();

    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting session-gateway");
    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "ignoring unreadable environment file"),
    }

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder()?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file, using defaults and environment"),
    }
    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;

    info!(
        listen_addr = %config.server.listen_addr,
        identity_url = %config.identity.base_url,
        cache_backend = ?config.cache.backend,
        database_host = %config.database.host,
        "configuration loaded"
    );

    let store = build_token_store(&config).await?;

    // No lookups are possible without the datastore; refuse to start.
    let directory = MySqlDirectory::connect(&config.database.target())
        .await
        .context("failed to connect to user datastore")?;

    let http = reqwest::Client::builder()
        .connect_timeout(config.identity.timeout())
        .build()
        .context("failed to build HTTP client")?;
    let identity = IdentityClient::new(http, &config.identity.base_url, config.identity.timeout());

    let state = AppState {
        authenticator: Arc::new(Authenticator::new(identity, store.clone())),
        store,
        directory: Arc::new(directory),
        stats: Arc::new(ServiceStats::new()),
        prometheus,
    };

    let stats = state.stats.clone();
    let app = build_router(state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timer starts when the shutdown signal fires, not at startup.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!(
        requests_served = stats.requests_total.load(Ordering::Relaxed),
        "shutdown complete"
    );
    Ok(())
}

/// Construct the configured session cache.
///
/// An unreachable Redis is not fatal: logins keep working in degraded mode
/// (tokens are issued but not registered) and the store reconnects on its own.
async fn build_token_store(config: &Config) -> Result<Arc<dyn TokenStore>> {
    match config.cache.backend {
        CacheBackend::Memory => {
            let store = Arc::new(MemoryTokenStore::new());
            spawn_sweeper(
                store.clone(),
                Duration::from_secs(config.cache.sweep_interval_secs),
            );
            info!("using in-memory session store");
            Ok(store)
        }
        CacheBackend::Redis => {
            let store = RedisTokenStore::open(
                &config.cache.host,
                config.cache.port,
                config.cache.username.as_deref(),
                config.cache.password.as_ref().map(|p| p.expose().as_str()),
            )
            .context("failed to configure redis session store")?;
            match store.warm_up().await {
                Ok(()) => info!(host = %config.cache.host, port = config.cache.port, "connected to redis session store"),
                Err(e) => warn!(
                    host = %config.cache.host,
                    port = config.cache.port,
                    error = %e,
                    "redis unreachable at startup; sessions cannot be registered until it recovers"
                ),
            }
            Ok(Arc::new(store))
        }
    }
}

/// Health endpoint: 200 while the session store answers, 503 when it does not.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.stats.started_at.elapsed().as_secs();
    let requests = state.stats.requests_total.load(Ordering::Relaxed);
    let errors = state.stats.errors_total.load(Ordering::Relaxed);
    let store_ok = state.store.exists("__health__").await.is_ok();

    let status_code = if store_ok {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    let body = serde_json::json!({
        "status": if store_ok { "healthy" } else { "degraded" },
        "session_store": {
            "backend": state.store.backend(),
            "reachable": store_ok,
        },
        "directory": state.directory.backend(),
        "uptime_seconds": uptime,
        "requests_served": requests,
        "errors_total": errors,
    });

    (status_code, axum::Json(body))
}

/// Prometheus metrics endpoint: returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
