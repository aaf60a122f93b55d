//! Error types for the request runtime.
//!
//! # Design
//! `ApiError` is the only error produced from an HTTP response: the server
//! answered, but with a status the call does not accept. Everything else
//! (cancellation, connection failures, token resolution, bad input) gets its
//! own `ClientError` variant so callers can tell an API failure apart from a
//! request that never completed.

use std::error::Error as StdError;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Boxed error carried by transport and token-resolver failures.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Discriminator carried in `ApiError::name`.
pub const API_ERROR_NAME: &str = "ApiError";

/// Message used when neither the call nor the client configures an override
/// for the failing status.
pub const GENERIC_ERROR_MESSAGE: &str = "Generic Error";

/// Errors returned by `ApiClient` requests.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request was cancelled before it settled.
    #[error("Request aborted")]
    Aborted,

    /// The server answered with a status the call does not accept.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The network exchange could not complete.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// The configured token resolver failed.
    #[error("failed to resolve access token: {0}")]
    TokenResolution(#[source] BoxError),

    /// The client configuration was rejected at construction.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    /// The call site produced a request that cannot be sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ClientError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, ClientError::Aborted)
    }

    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ClientError::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Structured error for HTTP-level request failures.
///
/// Serializes as `{ name, message, url, status, statusText, body }`, in that
/// order. Fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    name: &'static str,
    message: String,
    url: String,
    status: u16,
    status_text: String,
    body: Value,
}

impl ApiError {
    pub fn new(
        message: impl Into<String>,
        url: impl Into<String>,
        status: u16,
        status_text: impl Into<String>,
        body: Value,
    ) -> Self {
        Self {
            name: API_ERROR_NAME,
            message: message.into(),
            url: url.into(),
            status,
            status_text: status_text.into(),
            body,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn body(&self) -> &Value {
        &self.body
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for ApiError {}
