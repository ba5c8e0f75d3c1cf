//! Server side of the `Collect` RPC.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use prost::Message;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TransportError};
use crate::proto::{CollectAck, MetricFamilies};

/// Error returned by a [`CollectHandler`].
#[derive(Debug)]
pub enum CollectError {
    /// The push was refused; the connection stays open and the client
    /// receives the code and message in the ack.
    Rejected { code: i32, message: String },
    /// The handler cannot continue; the server stops accepting and
    /// [`CollectServer::serve`] returns an error.
    Fatal { message: String },
}

/// Receives decoded pushes from the RPC listener.
#[async_trait]
pub trait CollectHandler: Send + Sync + 'static {
    async fn collect(&self, families: MetricFamilies) -> std::result::Result<(), CollectError>;
}

/// Accept loop for the `Collect` RPC. Each connection is served on its
/// own task; frames beyond the configured cap close the connection.
pub struct CollectServer {
    listener: TcpListener,
    max_frame_bytes: usize,
}

impl CollectServer {
    pub async fn bind(addr: &str, max_frame_bytes: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            max_frame_bytes,
        })
    }

    /// The bound address, useful when binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves connections until a handler reports a fatal error.
    pub async fn serve(self, handler: Arc<dyn CollectHandler>) -> Result<()> {
        let shutdown = CancellationToken::new();
        let fatal: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let message = fatal
                        .lock()
                        .unwrap()
                        .take()
                        .unwrap_or_else(|| "collect handler failed".to_string());
                    return Err(TransportError::Fatal(message));
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    tracing::debug!(%peer, "accepted collect connection");
                    tokio::spawn(serve_connection(
                        stream,
                        Arc::clone(&handler),
                        self.max_frame_bytes,
                        shutdown.clone(),
                        Arc::clone(&fatal),
                    ));
                }
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    handler: Arc<dyn CollectHandler>,
    max_frame_bytes: usize,
    shutdown: CancellationToken,
    fatal: Arc<Mutex<Option<String>>>,
) {
    let mut framed = Framed::new(stream, crate::codec(max_frame_bytes));

    while let Some(frame) = framed.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!("closing collect connection: {}", err);
                return;
            }
        };

        let ack = match MetricFamilies::decode(frame.freeze()) {
            Err(err) => CollectAck {
                code: 400,
                error: format!("error decoding families: {}", err),
            },
            Ok(families) => match handler.collect(families).await {
                Ok(()) => CollectAck::default(),
                Err(CollectError::Rejected { code, message }) => CollectAck {
                    code,
                    error: message,
                },
                Err(CollectError::Fatal { message }) => {
                    tracing::error!("fatal collect handler error: {}", message);
                    let _ = framed
                        .send(Bytes::from(
                            CollectAck {
                                code: 500,
                                error: message.clone(),
                            }
                            .encode_to_vec(),
                        ))
                        .await;
                    fatal.lock().unwrap().get_or_insert(message);
                    shutdown.cancel();
                    return;
                }
            },
        };

        if let Err(err) = framed.send(Bytes::from(ack.encode_to_vec())).await {
            tracing::warn!("failed to send collect ack: {}", err);
            return;
        }
    }
}
