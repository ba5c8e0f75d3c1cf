//! Consistent-hash fan-out of metric pushes across downstream hubs.
//!
//! Each incoming sample is routed to exactly one downstream hub by the
//! value of a configured key label; repartitioned batches are forwarded
//! over long-lived collect RPC channels.

mod distributor;
mod error;
mod ring;
mod server;

pub use distributor::{Distributor, DistributorCollectHandler};
pub use error::{DistributorError, Result};
pub use ring::HashRing;
pub use server::{DistributorConfig, DistributorServer};
