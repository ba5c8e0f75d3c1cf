use transport::TransportError;

pub type Result<T> = std::result::Result<T, DistributorError>;

/// Errors surfaced by the distributor.
#[derive(Debug)]
pub enum DistributorError {
    /// A downstream channel could not be opened at startup.
    Dial {
        hub: String,
        source: TransportError,
    },
    /// A downstream push failed on an established channel.
    Forward {
        hub: String,
        source: TransportError,
    },
}

impl std::error::Error for DistributorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DistributorError::Dial { source, .. } => Some(source),
            DistributorError::Forward { source, .. } => Some(source),
        }
    }
}

impl std::fmt::Display for DistributorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributorError::Dial { hub, source } => {
                write!(f, "error connecting to {}: {}", hub, source)
            }
            DistributorError::Forward { hub, source } => {
                write!(f, "error sending to {}: {}", hub, source)
            }
        }
    }
}
