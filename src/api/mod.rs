//! HTTP surface.

mod images;
mod management;
pub mod pagination;
pub mod response;
mod search;
mod works;

use crate::config::Config;
use crate::engine::ResilientClient;
use crate::params::{Images, Works};
use crate::query::color::{ColorMetric, NormalizedRgb};
use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use std::sync::Arc;
use tokio::time::Instant;

pub use response::{Outcome, ResultList};

/// Shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client: Arc<ResilientClient>,
    pub metric: Arc<dyn ColorMetric>,
}

impl AppState {
    pub fn new(config: Arc<Config>, client: Arc<ResilientClient>) -> Self {
        Self {
            config,
            client,
            metric: Arc::new(NormalizedRgb),
        }
    }

    #[must_use]
    pub fn with_metric(mut self, metric: Arc<dyn ColorMetric>) -> Self {
        self.metric = metric;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/works", get(search::list::<Works>))
        .route("/works/{id}", get(works::work))
        .route("/images", get(search::list::<Images>))
        .route("/images/{id}", get(images::image))
        .route("/management/healthcheck", get(management::healthcheck))
        .route("/management/clusterhealth", get(management::cluster_health))
        .route("/management/_workTypes", get(management::work_types))
        .route("/_searchTemplates", get(management::search_templates))
        .route("/_elasticConfig", get(management::elastic_config))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Handled request"
    );
    response
}
