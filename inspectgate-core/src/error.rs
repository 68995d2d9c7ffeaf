//! Error types for InspectGate.
//!
//! Only configuration, initialization and proxying fail with an error.
//! Malformed request input (bad `Accept` values, unparseable client IPs) is
//! resolved by the default policy of the component reading it.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for InspectGate operations.
pub type Result<T> = std::result::Result<T, InspectError>;

/// Unified error type for InspectGate operations.
///
/// # Example
///
/// ```
/// use inspectgate_core::error::{InspectError, Result};
///
/// fn require_status(status: u16) -> Result<u16> {
///     if !(100..=599).contains(&status) {
///         return Err(InspectError::ConfigError(format!("invalid status {status}")));
///     }
///     Ok(status)
/// }
///
/// assert!(require_status(403).is_ok());
/// assert!(require_status(42).is_err());
/// ```
#[derive(Debug, Error)]
pub enum InspectError {
    /// A configured block template could not be read.
    #[error("Failed to load block template {}: {source}", path.display())]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error (missing or invalid values).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The process-wide blocking service was initialized twice.
    #[error("Blocking service already initialized")]
    AlreadyInitialized,

    /// The process-wide blocking service was used before initialization.
    #[error("Blocking service not initialized")]
    NotInitialized,

    /// The host could not provide a buffer for the block body.
    #[error("Failed to allocate response buffer")]
    BufferAllocation,

    /// The host rejected the block response headers.
    #[error("Failed to write response headers: {0}")]
    HeaderWrite(String),

    /// Upstream connection failed.
    #[error("Upstream connection failed: {0}")]
    UpstreamConnectionFailed(String),

    /// Upstream request timed out.
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// Request body too large.
    #[error("Request body too large: {size} bytes (max: {max} bytes)")]
    BodyTooLarge {
        /// Actual body size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// Failed to read request or response body.
    #[error("Body read error: {0}")]
    BodyReadError(String),

    /// HTTP client error (from reqwest).
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    /// Invalid HTTP header value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl InspectError {
    /// HTTP status code to answer the client with.
    pub fn status_code(&self) -> hyper::StatusCode {
        use hyper::StatusCode;

        match self {
            Self::TemplateLoad { .. }
            | Self::ConfigError(_)
            | Self::AlreadyInitialized
            | Self::NotInitialized
            | Self::BufferAllocation
            | Self::HeaderWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamConnectionFailed(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyReadError(_) => StatusCode::BAD_REQUEST,
            Self::HttpClientError(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidHeader(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Returns a user-friendly error message suitable for HTTP responses.
    ///
    /// Internal details (paths, upstream addresses) are not exposed.
    pub fn user_message(&self) -> &str {
        match self {
            Self::TemplateLoad { .. }
            | Self::ConfigError(_)
            | Self::AlreadyInitialized
            | Self::NotInitialized
            | Self::BufferAllocation
            | Self::HeaderWrite(_) => "Internal server error",
            Self::UpstreamConnectionFailed(_) => "Service unavailable",
            Self::UpstreamTimeout(_) => "Gateway timeout",
            Self::BodyTooLarge { .. } => "Request body too large",
            Self::BodyReadError(_) => "Bad request",
            Self::HttpClientError(_) => "Bad gateway",
            Self::InvalidHeader(_) => "Bad request",
        }
    }

    /// Returns true if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}
