//! Hub server configuration.

/// Configuration for the hub role.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Port for the text endpoints.
    pub port: u16,
    /// Port for the collect RPC listener; 0 disables it.
    pub rpc_port: u16,
    /// Maximum RPC message size in bytes.
    pub rpc_max_message_bytes: usize,
    /// Maximum buffered samples; zero or negative means unlimited.
    pub limit: i64,
    /// Maximum render wall time for a scrape, in seconds.
    pub scrape_timeout_secs: u64,
}

impl HubConfig {
    pub const DEFAULT_PORT: u16 = 9091;
    pub const DEFAULT_RPC_PORT: u16 = 0;
    pub const DEFAULT_RPC_MAX_MESSAGE_BYTES: usize = transport::DEFAULT_MAX_MESSAGE_BYTES;
    pub const DEFAULT_LIMIT: i64 = -1;
    pub const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 10;
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            port: Self::DEFAULT_PORT,
            rpc_port: Self::DEFAULT_RPC_PORT,
            rpc_max_message_bytes: Self::DEFAULT_RPC_MAX_MESSAGE_BYTES,
            limit: Self::DEFAULT_LIMIT,
            scrape_timeout_secs: Self::DEFAULT_SCRAPE_TIMEOUT_SECS,
        }
    }
}
