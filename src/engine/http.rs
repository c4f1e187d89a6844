//! Elasticsearch over HTTP.

use crate::engine::{Connection, ConnectionFactory, EngineError};
use crate::query::{GetRequest, SearchRequest};
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest engine error body kept in an [`EngineError`].
const MAX_REASON_LEN: usize = 512;

/// Where the engine API key comes from.
///
/// Resolved on every connect, so a rotated key file is picked up by the next
/// refresh.
#[derive(Debug, Clone)]
pub enum Credentials {
    ApiKey(String),
    ApiKeyFile(PathBuf),
    /// No authentication, for local clusters.
    Anonymous,
}

impl Credentials {
    pub async fn resolve(&self) -> Result<Option<String>, EngineError> {
        let key = match self {
            Self::ApiKey(key) => key.trim().to_string(),
            Self::ApiKeyFile(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|err| {
                    EngineError::Refresh(format!("cannot read API key from {}: {err}", path.display()))
                })?
                .trim()
                .to_string(),
            Self::Anonymous => return Ok(None),
        };

        if key.is_empty() {
            return Err(EngineError::Refresh("API key is empty".to_string()));
        }
        Ok(Some(key))
    }
}

/// A connection authenticated with one API key.
#[derive(Debug)]
pub struct ElasticConnection {
    client: reqwest::Client,
    node: Url,
}

impl ElasticConnection {
    pub fn new(node: Url, api_key: Option<&str>) -> Result<Self, EngineError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(&format!("ApiKey {key}"))
                .map_err(|err| EngineError::Refresh(format!("invalid API key: {err}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| EngineError::Refresh(err.to_string()))?;

        Ok(Self { client, node })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, EngineError> {
        let mut url = self.node.clone();
        url.path_segments_mut()
            .map_err(|()| EngineError::Transport {
                status: None,
                message: format!("{} cannot be a base URL", self.node),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, EngineError> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let mut reason = response.text().await.unwrap_or_default();
            if reason.len() > MAX_REASON_LEN {
                let cut = (0..=MAX_REASON_LEN)
                    .rev()
                    .find(|at| reason.is_char_boundary(*at))
                    .unwrap_or(0);
                reason.truncate(cut);
            }
            return Err(EngineError::Response {
                status: status.as_u16(),
                reason,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| EngineError::Decode(err.to_string()))
    }
}

fn transport(err: reqwest::Error) -> EngineError {
    EngineError::Transport {
        status: err.status().map(|status| status.as_u16()),
        message: err.to_string(),
    }
}

impl Connection for ElasticConnection {
    fn search<'a>(&'a self, request: &'a SearchRequest) -> BoxFuture<'a, Result<Value, EngineError>> {
        async move {
            let url = self.url(&[&request.index, "_search"])?;
            tracing::debug!(index = %request.index, "Engine search");
            self.send(self.client.post(url).json(&request.body)).await
        }
        .boxed()
    }

    fn get<'a>(&'a self, request: &'a GetRequest) -> BoxFuture<'a, Result<Value, EngineError>> {
        async move {
            let mut url = self.url(&[&request.index, "_doc", &request.id])?;
            url.query_pairs_mut()
                .append_pair("_source_includes", &request.source.join(","));
            tracing::debug!(index = %request.index, id = %request.id, "Engine get");
            self.send(self.client.get(url)).await
        }
        .boxed()
    }

    fn cluster_health(&self) -> BoxFuture<'_, Result<Value, EngineError>> {
        async move {
            let url = self.url(&["_cluster", "health"])?;
            self.send(self.client.get(url)).await
        }
        .boxed()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        // reqwest releases pooled connections when the client drops.
        async {}.boxed()
    }
}

/// Builds [`ElasticConnection`]s for one cluster node.
#[derive(Debug, Clone)]
pub struct ElasticConnector {
    node: Url,
    credentials: Credentials,
}

impl ElasticConnector {
    pub const fn new(node: Url, credentials: Credentials) -> Self {
        Self { node, credentials }
    }
}

impl ConnectionFactory for ElasticConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn Connection>, EngineError>> {
        async move {
            let key = self.credentials.resolve().await?;
            let connection = ElasticConnection::new(self.node.clone(), key.as_deref())?;
            tracing::debug!(node = %self.node, "Built engine connection");
            Ok(Arc::new(connection) as Arc<dyn Connection>)
        }
        .boxed()
    }
}
