//! Distributor server assembly.

use std::sync::Arc;

use anyhow::Context;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use transport::{CollectHandler, CollectServer};

use crate::distributor::{Distributor, DistributorCollectHandler};

/// Configuration for the distributor role.
#[derive(Debug, Clone)]
pub struct DistributorConfig {
    /// Port for the liveness endpoint.
    pub port: u16,
    /// Port for the collect RPC listener. Pushes arrive here only, so a
    /// zero port is a startup error.
    pub rpc_port: u16,
    /// Maximum RPC message size in bytes.
    pub rpc_max_message_bytes: usize,
    /// Label whose value partitions samples across the downstream hubs.
    pub key_label: String,
    /// Downstream hub addresses (`host:port`).
    pub hubs: Vec<String>,
}

/// The distributor role: the collect RPC listener plus a liveness
/// endpoint on the text port.
pub struct DistributorServer {
    config: DistributorConfig,
}

impl DistributorServer {
    pub fn new(config: DistributorConfig) -> Self {
        Self { config }
    }

    /// Dials the downstream hubs and serves until a fatal error. Any
    /// downstream dial failure, bind failure or forward failure stops
    /// the process.
    pub async fn run(self) -> anyhow::Result<()> {
        let config = self.config;

        anyhow::ensure!(
            config.rpc_port != 0,
            "distributor requires an RPC port; pushes arrive over RPC only"
        );
        anyhow::ensure!(
            !config.hubs.is_empty(),
            "distributor requires at least one downstream hub"
        );

        let distributor = Arc::new(
            Distributor::connect(&config.key_label, &config.hubs, config.rpc_max_message_bytes)
                .await
                .context("failed to connect to downstream hubs")?,
        );

        let rpc = CollectServer::bind(
            &format!("0.0.0.0:{}", config.rpc_port),
            config.rpc_max_message_bytes,
        )
        .await
        .with_context(|| format!("failed to bind RPC port {}", config.rpc_port))?;
        tracing::info!(port = config.rpc_port, "serving collect RPC");

        let handler: Arc<dyn CollectHandler> = Arc::new(DistributorCollectHandler::new(distributor));

        let router = Router::new().route("/", get(|| async { StatusCode::OK }));
        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .with_context(|| format!("failed to bind HTTP port {}", config.port))?;
        tracing::info!(port = config.port, "serving distributor liveness endpoint");

        tokio::select! {
            result = async { axum::serve(listener, router).await } => {
                result.context("distributor HTTP server failed")
            }
            result = rpc.serve(handler) => {
                result.context("collect RPC listener failed")?;
                anyhow::bail!("collect RPC listener stopped unexpectedly");
            }
        }
    }
}
