use thiserror::Error;

/// Type alias for Result with ReportError
pub type Result<T> = std::result::Result<T, ReportError>;

/// Error types for the tenant groups report
#[derive(Error, Debug)]
pub enum ReportError {
    /// No active account; the user must log in first
    #[error("Please log in first")]
    AuthRequired,

    /// Interactive sign-in was rejected, cancelled or failed
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    /// Graph API returned a non-success status
    #[error("Graph API call failed: {status} {status_text}")]
    ApiError {
        status: u16,
        status_text: String,
        /// Raw response body, kept for diagnostics
        body: String,
    },

    /// Response declared JSON but the body did not parse
    #[error("Failed to parse Graph API response: {0}")]
    ParseError(String),

    /// Missing or invalid user input
    #[error("{0}")]
    ValidationError(String),

    /// Network-related error (connection refused, TLS, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ReportError {
    /// HTTP status carried by an API error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ReportError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the error means the user has to sign in (again)
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ReportError::AuthRequired | ReportError::ApiError { status: 401, .. }
        )
    }
}

impl From<hyper_util::client::legacy::Error> for ReportError {
    fn from(error: hyper_util::client::legacy::Error) -> Self {
        ReportError::NetworkError(format!("Connection error: {}", error))
    }
}

impl From<hyper::Error> for ReportError {
    fn from(error: hyper::Error) -> Self {
        ReportError::NetworkError(error.to_string())
    }
}

impl From<hyper::http::Error> for ReportError {
    fn from(error: hyper::http::Error) -> Self {
        ReportError::NetworkError(format!("Invalid request: {}", error))
    }
}
