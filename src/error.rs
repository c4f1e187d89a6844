//! Error handling types shared by the decoder, the assembler and the HTTP layer.

use crate::engine::EngineError;
use std::fmt;

/// A specialized Result type for request handling.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Every invalid value found while decoding a request, coalesced into one error.
///
/// Each message is already prefixed with the parameter it came from
/// (`pageSize: must be between 1 and 100`). Display joins them with `; `.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .messages.join("; "))]
pub struct ValidationError {
    messages: Vec<String>,
}

impl ValidationError {
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

/// Why a stored document is no longer served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoneReason {
    Deleted,
    Invisible,
}

impl fmt::Display for GoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deleted => f.write_str("Deleted"),
            Self::Invisible => f.write_str("Invisible"),
        }
    }
}

/// Errors surfaced to API clients.
///
/// Redirects are not errors; see [`crate::api::Outcome`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{resource} not found for identifier {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("{resource} {id} is no longer available: {reason}")]
    Gone {
        resource: &'static str,
        id: String,
        reason: GoneReason,
    },

    #[error("search engine failure: {0}")]
    Upstream(#[from] EngineError),
}

impl ApiError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Gone { .. } => 410,
            Self::Upstream(_) => 500,
        }
    }

    /// Short label used in the error envelope.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Bad Request",
            Self::NotFound { .. } => "Not Found",
            Self::Gone { .. } => "Gone",
            Self::Upstream(_) => "Internal Server Error",
        }
    }

    /// Client-facing description. Upstream failures carry none.
    pub fn description(&self) -> Option<String> {
        match self {
            Self::Upstream(_) => None,
            other => Some(other.to_string()),
        }
    }
}
