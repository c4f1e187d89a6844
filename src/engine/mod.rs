//! Search engine access.
//!
//! [`Connection`] is the seam between request handling and the engine. The
//! HTTP implementation lives in [`http`]; [`resilient::ResilientClient`] wraps
//! any connection with credential refresh and a single retry.

pub mod http;
pub mod resilient;

use crate::query::{GetRequest, SearchRequest};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

pub use resilient::ResilientClient;

/// Failures talking to the engine.
///
/// Cloneable so one refresh outcome can be handed to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine answered with a non-success status.
    #[error("engine responded with status {status}: {reason}")]
    Response { status: u16, reason: String },

    /// The request never produced a response.
    #[error("engine request failed: {message}")]
    Transport { status: Option<u16>, message: String },

    #[error("could not decode engine response: {0}")]
    Decode(String),

    /// A replacement connection could not be built.
    #[error("could not refresh engine connection: {0}")]
    Refresh(String),
}

impl EngineError {
    /// The HTTP status the failure carried, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Transport { status, .. } => *status,
            Self::Decode(_) | Self::Refresh(_) => None,
        }
    }

    /// Whether the engine rejected our credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// One live connection to the engine.
///
/// Calls return raw JSON; typed decoding happens in [`ResilientClient`].
pub trait Connection: Send + Sync + 'static {
    fn search<'a>(&'a self, request: &'a SearchRequest) -> BoxFuture<'a, Result<Value, EngineError>>;

    fn get<'a>(&'a self, request: &'a GetRequest) -> BoxFuture<'a, Result<Value, EngineError>>;

    fn cluster_health(&self) -> BoxFuture<'_, Result<Value, EngineError>>;

    /// Release resources. Called once the connection has been replaced.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// Builds fresh connections, reading current credentials each time.
pub trait ConnectionFactory: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn Connection>, EngineError>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub hits: Hits,
    #[serde(default)]
    pub aggregations: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hits {
    pub total: Option<Total>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

impl Hits {
    pub fn total(&self) -> u64 {
        match self.total {
            Some(Total::Count(count) | Total::Tracked { value: count }) => count,
            None => self.hits.len() as u64,
        }
    }
}

/// `hits.total` is a bare number on older engines and an object on newer ones.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum Total {
    Count(u64),
    Tracked { value: u64 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetResponse {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub found: bool,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}
