//! Length-prefixed RPC transport for metric pushes.
//!
//! One unary method is exposed: `Collect(MetricFamilies) -> CollectAck`.
//! Frames are prost-encoded messages behind a 4-byte big-endian length
//! prefix; the maximum frame size is the configured RPC message cap.
//! Clients open one connection at startup and reuse it for the process
//! lifetime.

pub mod convert;
pub mod proto;

mod client;
mod error;
mod server;

pub use client::CollectClient;
pub use error::{Result, TransportError};
pub use server::{CollectError, CollectHandler, CollectServer};

/// Default maximum RPC message size: 1 GiB, matching the hub's frame cap.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024 * 1024;

pub(crate) fn codec(max_frame_bytes: usize) -> tokio_util::codec::LengthDelimitedCodec {
    tokio_util::codec::LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_bytes)
        .new_codec()
}
