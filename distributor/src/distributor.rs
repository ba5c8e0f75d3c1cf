//! Fan-out orchestration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use transport::proto::{Metric, MetricFamilies, MetricFamily};
use transport::{CollectClient, CollectError, CollectHandler};

use crate::error::{DistributorError, Result};
use crate::ring::HashRing;

/// Routes each pushed sample to exactly one downstream hub by the value
/// of the configured key label, then forwards the repartitioned batches
/// over long-lived channels. The ring and the channels are immutable
/// after construction, so concurrent pushes share them freely.
#[derive(Debug)]
pub struct Distributor {
    key_label: String,
    clients: HashMap<String, CollectClient>,
    ring: HashRing,
}

impl Distributor {
    /// Opens one channel per downstream hub and builds the ring. A dial
    /// failure is fatal at startup.
    pub async fn connect(
        key_label: impl Into<String>,
        hubs: &[String],
        max_frame_bytes: usize,
    ) -> Result<Self> {
        let mut clients = HashMap::new();
        for hub in hubs {
            let client = CollectClient::connect(hub, max_frame_bytes)
                .await
                .map_err(|source| DistributorError::Dial {
                    hub: hub.clone(),
                    source,
                })?;
            clients.insert(hub.clone(), client);
        }

        tracing::info!(nodes = ?hubs, "distributor ring built");
        Ok(Self {
            key_label: key_label.into(),
            clients,
            ring: HashRing::new(hubs),
        })
    }

    /// Partitions one push and forwards each hub's share as a single RPC.
    ///
    /// A sample whose key has no ring position is dropped with a log
    /// line. A downstream failure aborts the remaining sends and is
    /// fatal at the process level.
    pub async fn collect(&self, families: MetricFamilies) -> Result<()> {
        tracing::debug!(families = families.families.len(), "received push");

        let mut fan_out: HashMap<&str, HashMap<String, MetricFamily>> = HashMap::new();

        for family in &families.families {
            for metric in &family.metric {
                let key = key_label_value(metric, &self.key_label);
                let Some(hub) = self.ring.node(&key) else {
                    tracing::warn!(
                        family = %family.name,
                        key = %key,
                        "no ring position found for sample, dropping"
                    );
                    continue;
                };

                fan_out
                    .entry(hub)
                    .or_default()
                    .entry(family.name.clone())
                    .and_modify(|aggregated| aggregated.metric.push(metric.clone()))
                    .or_insert_with(|| MetricFamily {
                        name: family.name.clone(),
                        help: family.help.clone(),
                        kind: family.kind,
                        metric: vec![metric.clone()],
                    });
            }
        }

        for (hub, families) in fan_out {
            let batch = MetricFamilies {
                families: families.into_values().collect(),
            };
            tracing::debug!(hub, families = batch.families.len(), "forwarding batch");

            let client = self.clients.get(hub).expect("channel exists for ring member");
            client
                .collect(&batch)
                .await
                .map_err(|source| DistributorError::Forward {
                    hub: hub.to_string(),
                    source,
                })?;
        }

        Ok(())
    }
}

fn key_label_value(metric: &Metric, key_label: &str) -> String {
    metric
        .label
        .iter()
        .find(|label| label.name == key_label)
        .map(|label| label.value.clone())
        .unwrap_or_default()
}

/// Collect RPC handler for the distributor role. Forward failures are
/// reported as fatal, stopping the RPC listener.
pub struct DistributorCollectHandler {
    distributor: Arc<Distributor>,
}

impl DistributorCollectHandler {
    pub fn new(distributor: Arc<Distributor>) -> Self {
        Self { distributor }
    }
}

#[async_trait]
impl CollectHandler for DistributorCollectHandler {
    async fn collect(&self, families: MetricFamilies) -> std::result::Result<(), CollectError> {
        self.distributor
            .collect(families)
            .await
            .map_err(|err| CollectError::Fatal {
                message: err.to_string(),
            })
    }
}
