//! MetaKube client errors

use thiserror::Error;

/// Errors that can occur when interacting with the MetaKube API
#[derive(Debug, Error)]
pub enum MetaKubeError {
    /// HTTP request/response error (connection refused, timeout, TLS, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// MetaKube API returned an error status not covered by a dedicated variant
    #[error("MetaKube API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message extracted from the error payload, or the raw body
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (invalid token, expired, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Caller is not allowed to access the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Concurrent modification or a resource that is still being processed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A successful reply whose body does not match the expected model
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl MetaKubeError {
    /// Build the error matching an HTTP status and a response body
    pub fn from_status(status: u16, path: &str, body: &str) -> Self {
        let message = format!("{} - {}", path, error_message(body));
        match status {
            401 => MetaKubeError::Authentication(message),
            403 => MetaKubeError::Forbidden(message),
            404 => MetaKubeError::NotFound(message),
            409 => MetaKubeError::Conflict(message),
            400 | 422 => MetaKubeError::InvalidRequest(message),
            _ => MetaKubeError::Api { status, message },
        }
    }

    /// HTTP-like status code of the error, if it has one
    pub fn status(&self) -> Option<u16> {
        match self {
            MetaKubeError::Http(e) => e.status().map(|s| s.as_u16()),
            MetaKubeError::Api { status, .. } => Some(*status),
            MetaKubeError::Authentication(_) => Some(401),
            MetaKubeError::Forbidden(_) => Some(403),
            MetaKubeError::NotFound(_) => Some(404),
            MetaKubeError::Conflict(_) => Some(409),
            MetaKubeError::InvalidRequest(_) => Some(400),
            MetaKubeError::Serialization(_) | MetaKubeError::InvalidResponse(_) => None,
        }
    }

    /// Network failures, conflicts and server side errors may resolve on retry
    pub fn is_transient(&self) -> bool {
        match self {
            MetaKubeError::Http(_) | MetaKubeError::Conflict(_) => true,
            MetaKubeError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// True for 404 replies
    pub fn is_not_found(&self) -> bool {
        matches!(self, MetaKubeError::NotFound(_))
    }

    /// True for 403 replies
    pub fn is_forbidden(&self) -> bool {
        matches!(self, MetaKubeError::Forbidden(_))
    }

    /// True for 409 replies
    pub fn is_conflict(&self) -> bool {
        matches!(self, MetaKubeError::Conflict(_))
    }
}

/// Extract the human readable message from an API error body.
///
/// Falls back to the raw body when it is not an `ErrorResponse`.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<crate::models::ErrorResponse>(body) {
        Ok(resp) if !resp.error.message.is_empty() => {
            if resp.error.details.is_empty() {
                resp.error.message
            } else {
                format!("{}: {}", resp.error.message, resp.error.details.join(", "))
            }
        }
        _ => body.trim().chars().take(500).collect(),
    }
}
