pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors surfaced by the RPC client and server.
#[derive(Debug)]
pub enum TransportError {
    Io(std::io::Error),
    Decode(prost::DecodeError),
    /// The peer closed the connection before answering.
    ConnectionClosed,
    /// The remote refused the push; carries the ack's code and message.
    Rejected { code: i32, message: String },
    /// A handler reported an unrecoverable error and the server stopped.
    Fatal(String),
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(err) => Some(err),
            TransportError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Io(err) => write!(f, "I/O error: {}", err),
            TransportError::Decode(err) => write!(f, "frame decode error: {}", err),
            TransportError::ConnectionClosed => write!(f, "connection closed by peer"),
            TransportError::Rejected { code, message } => {
                write!(f, "push rejected with code {}: {}", code, message)
            }
            TransportError::Fatal(message) => write!(f, "fatal handler error: {}", message),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err)
    }
}

impl From<prost::DecodeError> for TransportError {
    fn from(err: prost::DecodeError) -> Self {
        TransportError::Decode(err)
    }
}
