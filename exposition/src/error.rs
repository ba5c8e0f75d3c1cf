/// Error produced when a pushed payload is not valid text exposition.
///
/// Every variant carries the 1-based line number of the offending input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Syntax { line: usize, message: String },
    InvalidValue { line: usize, token: String },
    InvalidTimestamp { line: usize, token: String },
    InvalidUtf8,
}

impl std::error::Error for ParseError {}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Syntax { line, message } => {
                write!(f, "text format parsing error in line {}: {}", line, message)
            }
            ParseError::InvalidValue { line, token } => {
                write!(
                    f,
                    "text format parsing error in line {}: invalid value {:?}",
                    line, token
                )
            }
            ParseError::InvalidTimestamp { line, token } => {
                write!(
                    f,
                    "text format parsing error in line {}: invalid timestamp {:?}",
                    line, token
                )
            }
            ParseError::InvalidUtf8 => write!(f, "payload is not valid UTF-8"),
        }
    }
}

/// Error produced when a family cannot be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    EmptyFamilyName,
}

impl std::error::Error for RenderError {}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::EmptyFamilyName => write!(f, "metric family has an empty name"),
        }
    }
}
