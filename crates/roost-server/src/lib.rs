//! Roost server
//!
//! Wires the node store, policy table, installer tasks and microkernel
//! settings into a [`BootService`] and serves it over HTTP.

pub mod api;
pub mod config;
pub mod provisioning;
pub mod store;

#[cfg(test)]
pub mod test_helpers;

pub use config::ServerConfig;
pub use provisioning::{BootError, BootService};

use anyhow::Context;
use axum::extract::MatchedPath;
use axum::Router;
use std::sync::Arc;
use store::{MemoryStore, Store};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{error, info, Level};

/// Build the boot service described by a configuration
pub fn build_service(config: &ServerConfig) -> anyhow::Result<BootService> {
    let tasks = config.task_registry()?;
    let policies = config.policy_repository(&tasks)?;
    info!(
        "{} installer tasks, {} policies",
        tasks.names().count(),
        policies.len()
    );

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    Ok(BootService::new(
        store,
        policies,
        tasks,
        config.microkernel.clone(),
        config.server_url.clone(),
    ))
}

/// Router with request tracing
pub fn app(service: Arc<BootService>) -> Router {
    api::router(service).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<axum::body::Body>| {
                let matched_path = request
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str)
                    .unwrap_or(request.uri().path());

                tracing::debug_span!(
                    "http-request",
                    method = %request.method(),
                    uri = %request.uri(),
                    matched_path = matched_path,
                )
            })
            .on_request(DefaultOnRequest::new().level(Level::DEBUG))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Run the server until Ctrl+C or SIGTERM
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let service = Arc::new(build_service(&config)?);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    info!(
        "Roost listening on http://{}, nodes reach it at {}",
        listener.local_addr().context("failed to get local address")?,
        service.server_url()
    );

    axum::serve(listener, app(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Roost stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut signal) = signal(SignalKind::terminate()) {
            signal.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
