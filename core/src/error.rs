//! Error types for the sendwithus client.
//!
//! # Design
//! Transport failures, unreadable bodies and non-success statuses all become
//! an `ApiError` carrying a numeric code (0 when no response arrived) and a
//! message. For HTTP failures the message is the raw response body, never
//! re-parsed. JSON decoding failures are kept apart as `Error::Decode` so
//! callers can tell "the service said no" from "the service said something
//! we could not read".

use thiserror::Error;

use crate::http::TransportError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// A failed round-trip: status code plus message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("status code: {code}, error: {message}")]
pub struct ApiError {
    code: u16,
    message: String,
}

impl ApiError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// HTTP status of the response, or 0 if none was received.
    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::new(err.code(), err.to_string())
    }
}

/// Errors returned by `Client` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure, body-read failure or a status of 300 and above.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The response body did not match the expected structure.
    #[error(transparent)]
    Decode(serde_json::Error),

    /// The request payload could not be serialized to JSON.
    #[error("failed to encode request body: {0}")]
    Encode(serde_json::Error),
}

impl Error {
    /// The `ApiError` behind this error, if it came from the transport path.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Error::Api(err.into())
    }
}
