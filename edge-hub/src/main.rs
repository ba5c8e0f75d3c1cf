//! Process entry point for the metrics edge hub.

use clap::{Args, Parser, Subcommand};
use distributor::{DistributorConfig, DistributorServer};
use hub::server::{HubConfig, HubServer};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "edge-hub",
    about = "In-memory metrics buffer and fan-out layer for pull-based monitoring"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the buffering hub.
    Hub(HubArgs),
    /// Run the consistent-hash distributor.
    Distributor(DistributorArgs),
}

#[derive(Args, Debug)]
struct HubArgs {
    /// Port to listen on for requests.
    #[arg(long, default_value_t = HubConfig::DEFAULT_PORT)]
    port: u16,

    /// Port to listen on for RPC pushes; 0 disables the listener.
    #[arg(long = "grpc-port", default_value_t = HubConfig::DEFAULT_RPC_PORT)]
    grpc_port: u16,

    /// Max message size (bytes) for RPC receives.
    #[arg(long = "grpc-max-msg-size", default_value_t = HubConfig::DEFAULT_RPC_MAX_MESSAGE_BYTES)]
    grpc_max_msg_size: usize,

    /// Limit the total samples in the hub at one time; a push that would
    /// exceed the limit is rejected. Non-positive means no limit.
    #[arg(long, default_value_t = HubConfig::DEFAULT_LIMIT, allow_hyphen_values = true)]
    limit: i64,

    /// Timeout for scrape rendering, in seconds.
    #[arg(long = "scrape-timeout", default_value_t = HubConfig::DEFAULT_SCRAPE_TIMEOUT_SECS)]
    scrape_timeout: u64,
}

#[derive(Args, Debug)]
struct DistributorArgs {
    /// Port for the liveness endpoint.
    #[arg(long, default_value_t = 9091)]
    port: u16,

    /// Port to listen on for RPC pushes.
    #[arg(long = "grpc-port", default_value_t = 0)]
    grpc_port: u16,

    /// Max message size (bytes) for RPC receives and forwards.
    #[arg(long = "grpc-max-msg-size", default_value_t = transport::DEFAULT_MAX_MESSAGE_BYTES)]
    grpc_max_msg_size: usize,

    /// Label whose value partitions samples across the downstream hubs.
    #[arg(long = "key-label", default_value = "")]
    key_label: String,

    /// Downstream hub address (`host:port`); repeat for each hub.
    #[arg(long = "edge-hub")]
    edge_hub: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Hub(args) => {
            HubServer::new(HubConfig {
                port: args.port,
                rpc_port: args.grpc_port,
                rpc_max_message_bytes: args.grpc_max_msg_size,
                limit: args.limit,
                scrape_timeout_secs: args.scrape_timeout,
            })
            .run()
            .await
        }
        Command::Distributor(args) => {
            DistributorServer::new(DistributorConfig {
                port: args.port,
                rpc_port: args.grpc_port,
                rpc_max_message_bytes: args.grpc_max_msg_size,
                key_label: args.key_label,
                hubs: args.edge_hub,
            })
            .run()
            .await
        }
    }
}
