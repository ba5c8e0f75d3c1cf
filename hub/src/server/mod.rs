//! HTTP and RPC server for the hub role.
//!
//! Exposes the push endpoint, the draining scrape endpoint, the debug
//! report, the self-metric registry and a liveness probe, plus the
//! collect RPC listener when enabled.

mod config;
mod error;
mod handlers;
mod middleware;
mod rpc;
mod server;

pub use config::HubConfig;
pub use rpc::HubCollectHandler;
pub use server::HubServer;
