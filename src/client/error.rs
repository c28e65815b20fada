//! Normalized request failures
//!
//! Every failed call surfaces as exactly one [`ApiError`] variant. Display
//! text is the user-facing notice the UI shows as-is.

use reqwest::StatusCode;
use thiserror::Error;

/// Shown for timeouts and network failures
pub const CONNECTION_MESSAGE: &str =
    "The connection took too long. Please check your network and try again.";

/// Shown for HTTP 429
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please wait a moment and try again.";

/// Shown when a failed response carries no parseable body
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid response from the server.";

/// Shown after session teardown on HTTP 401
pub const UNAUTHORIZED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Errors returned by [`ApiClient`](super::ApiClient)
#[derive(Debug, Error)]
pub enum ApiError {
    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// Timeout, DNS or connection failure
    #[error("{}", CONNECTION_MESSAGE)]
    Connection {
        timed_out: bool,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP 429
    #[error("{}", RATE_LIMITED_MESSAGE)]
    RateLimited {
        /// Seconds from the `Retry-After` header, when sent
        retry_after: Option<u64>,
    },

    /// HTTP 401; the session has been torn down
    #[error("{message}")]
    Unauthorized { message: String },

    /// Error status with an empty or non-JSON body, or an undecodable success body
    #[error("{}", INVALID_RESPONSE_MESSAGE)]
    InvalidResponse { status: StatusCode },

    /// Any other error status
    #[error("{message}")]
    Status {
        status: StatusCode,
        message: String,
        body: serde_json::Value,
    },

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// HTTP status of the failed response, if one was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::InvalidResponse { status } | Self::Status { status, .. } => Some(*status),
            Self::Cancelled | Self::Connection { .. } | Self::InvalidRequest(_) => None,
        }
    }

    /// Text to show the user
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Whether retrying later might succeed
    ///
    /// Nothing in this crate retries; the caller decides.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::RateLimited { .. })
    }
}
