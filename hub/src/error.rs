use exposition::ParseError;

pub type Result<T> = std::result::Result<T, HubError>;

/// Errors surfaced to the caller of a push.
#[derive(Debug)]
pub enum HubError {
    /// The pushed payload was not valid text exposition.
    Parse(ParseError),
    /// Admitting the push would exceed the configured sample limit.
    Overfill {
        incoming: usize,
        limit: usize,
        current: usize,
    },
}

impl std::error::Error for HubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HubError::Parse(err) => Some(err),
            HubError::Overfill { .. } => None,
        }
    }
}

impl std::fmt::Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubError::Parse(err) => write!(f, "error parsing metrics: {}", err),
            HubError::Overfill {
                incoming,
                limit,
                current,
            } => write!(
                f,
                "not accepting push of size {}: would overfill hub limit of {}, current hub size: {}",
                incoming, limit, current
            ),
        }
    }
}

impl From<ParseError> for HubError {
    fn from(err: ParseError) -> Self {
        HubError::Parse(err)
    }
}
