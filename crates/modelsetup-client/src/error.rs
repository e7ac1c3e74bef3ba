//! API client error types.

use thiserror::Error;

use crate::client::{HttpMethod, RestResponse};

/// Result alias for API client operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP status the server uses to reject a write as invalid (validation failure).
pub const UNPROCESSABLE_ENTITY: u16 = 422;

/// Errors raised by [`crate::client::ApiClient`] and other [`crate::EntityApi`] implementations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("{method} {uri} returned HTTP {}: {}", response.status, response.body_or_empty())]
    Http {
        method: HttpMethod,
        uri: String,
        response: RestResponse,
    },

    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("{method} {uri} failed: {source}")]
    Transport {
        method: HttpMethod,
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be decoded.
    #[error("failed to parse response from {uri}: {message}")]
    Parse { uri: String, message: String },

    /// The verb cannot be used to write an entity.
    #[error("unsupported write method: {0}")]
    UnsupportedMethod(HttpMethod),

    /// The client could not be constructed.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    /// HTTP status of the failed response, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { response, .. } => Some(response.status),
            _ => None,
        }
    }

    /// Whether the server rejected the request as invalid (422).
    ///
    /// Create calls that race with another writer surface this way.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.status() == Some(UNPROCESSABLE_ENTITY)
    }

    /// Whether the server answered 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// The failed response, if the server answered.
    #[must_use]
    pub fn response(&self) -> Option<&RestResponse> {
        match self {
            ApiError::Http { response, .. } => Some(response),
            _ => None,
        }
    }
}
