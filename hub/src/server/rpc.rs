//! Collect RPC handler for the hub.

use std::sync::Arc;

use async_trait::async_trait;
use prost::Message;
use transport::proto::MetricFamilies;
use transport::{convert, CollectError, CollectHandler};

use crate::error::HubError;
use crate::MetricHub;

/// Feeds RPC pushes into the hub with the same admission semantics as
/// the text endpoint.
pub struct HubCollectHandler {
    hub: Arc<MetricHub>,
}

impl HubCollectHandler {
    pub fn new(hub: Arc<MetricHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CollectHandler for HubCollectHandler {
    async fn collect(&self, families: MetricFamilies) -> Result<(), CollectError> {
        let received_bytes = families.encoded_len();
        let batch = convert::batch_from_proto(families);

        self.hub
            .receive_families(batch, received_bytes)
            .map_err(|err| {
                let code = match err {
                    HubError::Parse(_) => 400,
                    HubError::Overfill { .. } => 406,
                };
                CollectError::Rejected {
                    code,
                    message: err.to_string(),
                }
            })
    }
}
