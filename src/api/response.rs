//! Response envelopes.

use crate::api::pagination::PageLinks;
use crate::error::ApiError;
use crate::query::buckets::Aggregation;
use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A page of search results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultList {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    pub links: PageLinks,
    pub results: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<BTreeMap<&'static str, Aggregation>>,
}

impl ResultList {
    pub fn new(
        links: PageLinks,
        results: Vec<Value>,
        aggregations: Option<BTreeMap<&'static str, Aggregation>>,
    ) -> Self {
        Self {
            kind: "ResultList",
            links,
            results,
            aggregations,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(rename = "type")]
    kind: &'static str,
    error_type: &'static str,
    http_status: u16,
    label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl From<&ApiError> for ErrorBody {
    fn from(err: &ApiError) -> Self {
        Self {
            kind: "Error",
            error_type: "http",
            http_status: err.status(),
            label: err.label(),
            description: err.description(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Upstream(err) => tracing::error!(error = %err, "Engine request failed"),
            other => tracing::debug!(status = other.status(), error = %other, "Request rejected"),
        }
        let status = StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

/// A successful response: either a body or a redirect elsewhere.
#[derive(Debug)]
pub enum Outcome<T> {
    Found(T),
    Redirect(String),
}

impl<T: Serialize> IntoResponse for Outcome<T> {
    fn into_response(self) -> Response {
        match self {
            Self::Found(body) => Json(body).into_response(),
            Self::Redirect(location) => match HeaderValue::from_str(&location) {
                Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
                Err(err) => {
                    tracing::error!(error = %err, "Unrepresentable redirect location");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            },
        }
    }
}
