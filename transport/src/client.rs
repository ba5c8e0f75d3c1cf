//! Client side of the `Collect` RPC.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use prost::Message;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::{Result, TransportError};
use crate::proto::{CollectAck, MetricFamilies};

/// A long-lived channel to one collect endpoint.
///
/// The connection is opened once and reused for every push; concurrent
/// callers are serialized on the channel, so one in-flight request is on
/// the wire at a time.
pub struct CollectClient {
    addr: String,
    framed: Mutex<Framed<TcpStream, LengthDelimitedCodec>>,
}

impl std::fmt::Debug for CollectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectClient").field("addr", &self.addr).finish()
    }
}

impl CollectClient {
    /// Connects to the endpoint. Fails fast: the caller decides whether a
    /// dial failure is fatal.
    pub async fn connect(addr: &str, max_frame_bytes: usize) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            addr: addr.to_string(),
            framed: Mutex::new(Framed::new(stream, crate::codec(max_frame_bytes))),
        })
    }

    /// The remote address this client was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Sends one batch of families and awaits the acknowledgement.
    pub async fn collect(&self, families: &MetricFamilies) -> Result<()> {
        let mut framed = self.framed.lock().await;

        framed
            .send(Bytes::from(families.encode_to_vec()))
            .await?;

        let frame = framed
            .next()
            .await
            .ok_or(TransportError::ConnectionClosed)??;
        let ack = CollectAck::decode(frame.freeze())?;

        if ack.code != 0 {
            return Err(TransportError::Rejected {
                code: ack.code,
                message: ack.error,
            });
        }
        Ok(())
    }
}
