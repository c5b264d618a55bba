//! Error types for the Azure Resource Manager backend.

use thiserror::Error;

use crate::backend::RequestError;

/// Errors raised by the Azure backend.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AzureBackendError {
    /// Raised when the credential file is missing or incomplete.
    #[error("credential error: {0}")]
    Credentials(String),
    /// Raised when a request fails validation before being sent.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Raised when the token endpoint rejects the service principal.
    #[error("authentication failed: {message}")]
    Auth {
        /// Description returned by the token endpoint.
        message: String,
    },
    /// Raised when ARM answers with a non-success status.
    #[error("{method} {url} returned {status}: {code} {message}")]
    Http {
        /// HTTP method of the failed call.
        method: String,
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// ARM error code (for example `ResourceNotFound`).
        code: String,
        /// ARM error message.
        message: String,
    },
    /// Raised when the connection itself fails.
    #[error("transport error calling {url}: {message}")]
    Transport {
        /// Request URL.
        url: String,
        /// Error reported by the HTTP client.
        message: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Request URL.
        url: String,
        /// Decoder message.
        message: String,
    },
    /// Raised when a long-running operation ends in `Failed` or `Canceled`.
    #[error("operation on {resource} ended in state {status}: {message}")]
    OperationFailed {
        /// Resource the operation applied to.
        resource: String,
        /// Terminal status reported by ARM.
        status: String,
        /// Error message reported by ARM, if any.
        message: String,
    },
    /// Raised when a long-running operation does not finish in time.
    #[error("timeout waiting for operation on {resource}")]
    Timeout {
        /// Resource the operation applied to.
        resource: String,
    },
}

impl AzureBackendError {
    /// HTTP status when the error came from an ARM response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<RequestError> for AzureBackendError {
    fn from(value: RequestError) -> Self {
        Self::Validation(value.to_string())
    }
}
