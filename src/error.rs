//! Error types for pingsink

use std::fmt;

/// Result type alias for pingsink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for pingsink
#[derive(Debug)]
pub enum Error {
    /// Configuration errors (fatal at construction)
    Config(String),
    /// Connection-level HTTP failures
    Http(reqwest::Error),
    /// Backend answered with a status outside the expected set
    UnexpectedStatus { status: u16, body: String },
    /// Backend response could not be decoded
    ResponseParse(String),
    /// Serialization errors
    Serialization(String),
    /// IO errors
    Io(std::io::Error),
    /// Internal error
    Internal(String),
}

impl Error {
    /// True for failures raised by the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::UnexpectedStatus { .. })
    }

    /// HTTP status carried by the error, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::UnexpectedStatus { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::UnexpectedStatus { status, body } => {
                write!(f, "InfluxDB responded with status {}: {}", status, body)
            }
            Error::ResponseParse(msg) => write!(f, "Response parse error: {}", msg),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Config(format!("invalid backend URL: {}", e))
    }
}
