//! Hub server assembly.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use transport::{CollectHandler, CollectServer};

use super::config::HubConfig;
use super::handlers::{
    handle_debug, handle_internal, handle_liveness, handle_receive, handle_scrape, AppState,
};
use super::middleware::TracingLayer;
use super::rpc::HubCollectHandler;
use crate::MetricHub;

/// The hub role: HTTP endpoints plus the optional collect RPC listener.
pub struct HubServer {
    config: HubConfig,
    hub: Arc<MetricHub>,
}

impl HubServer {
    pub fn new(config: HubConfig) -> Self {
        let hub = Arc::new(MetricHub::new(
            config.limit,
            Duration::from_secs(config.scrape_timeout_secs),
        ));
        Self { config, hub }
    }

    pub fn hub(&self) -> Arc<MetricHub> {
        Arc::clone(&self.hub)
    }

    /// Builds the HTTP router; exposed separately so tests can drive the
    /// routes without binding a socket.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", post(handle_receive).get(handle_scrape))
            .route("/debug", get(handle_debug))
            .route("/internal", get(handle_internal))
            .route("/", get(handle_liveness))
            .layer(TracingLayer::new())
            .with_state(AppState {
                hub: Arc::clone(&self.hub),
            })
    }

    /// Binds the listeners and serves until a fatal error. The HTTP
    /// server runs on the calling task; the RPC listener, when enabled,
    /// is raced against it so either failure stops the process.
    pub async fn run(self) -> anyhow::Result<()> {
        let router = self.router();

        let listener = TcpListener::bind(("0.0.0.0", self.config.port))
            .await
            .with_context(|| format!("failed to bind HTTP port {}", self.config.port))?;
        tracing::info!(port = self.config.port, "serving hub HTTP endpoints");

        if self.config.rpc_port != 0 {
            let rpc = CollectServer::bind(
                &format!("0.0.0.0:{}", self.config.rpc_port),
                self.config.rpc_max_message_bytes,
            )
            .await
            .with_context(|| format!("failed to bind RPC port {}", self.config.rpc_port))?;
            tracing::info!(port = self.config.rpc_port, "serving collect RPC");

            let handler: Arc<dyn CollectHandler> =
                Arc::new(HubCollectHandler::new(Arc::clone(&self.hub)));

            tokio::select! {
                result = async { axum::serve(listener, router).await } => {
                    result.context("hub HTTP server failed")
                }
                result = rpc.serve(handler) => {
                    result.context("collect RPC listener failed")?;
                    anyhow::bail!("collect RPC listener stopped unexpectedly");
                }
            }
        } else {
            axum::serve(listener, router)
                .await
                .context("hub HTTP server failed")
        }
    }
}
