//! Self-metrics for the hub.
//!
//! Two gauges are exported: `hub_size` (samples currently buffered) and
//! `hub_limit` (configured admission limit, 0 when unlimited). The
//! registry is owned by the hub instance; there is no global state.

use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

pub struct Metrics {
    registry: Registry,
    hub_size: Gauge,
    hub_limit: Gauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let hub_size = Gauge::default();
        registry.register(
            "hub_size",
            "Number of datapoints in hub",
            hub_size.clone(),
        );

        let hub_limit = Gauge::default();
        registry.register(
            "hub_limit",
            "Maximum number of datapoints in hub",
            hub_limit.clone(),
        );

        Self {
            registry,
            hub_size,
            hub_limit,
        }
    }

    pub fn set_size(&self, size: usize) {
        self.hub_size.set(size as i64);
    }

    pub fn size(&self) -> i64 {
        self.hub_size.get()
    }

    /// Records the configured limit; unlimited is exported as 0.
    pub fn set_limit(&self, limit: i64) {
        self.hub_limit.set(limit.max(0));
    }

    /// Encodes the registry to Prometheus text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}
