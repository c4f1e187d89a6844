//! Operational endpoints.

use crate::api::AppState;
use crate::error::Result;
use crate::params::{Images, Resource, Works};
use crate::query::request::type_tally;
use axum::Json;
use axum::extract::State;
use serde_json::{Map, Value, json};

pub(crate) async fn healthcheck(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "config": {
            "pipelineDate": state.config.pipeline_date,
            "worksIndex": state.config.works_index,
            "imagesIndex": state.config.images_index,
        }
    }))
}

pub(crate) async fn cluster_health(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(state.client.cluster_health().await?))
}

/// Number of stored works per lifecycle type (`Visible`, `Redirected`, ...).
pub(crate) async fn work_types(State(state): State<AppState>) -> Result<Json<Map<String, Value>>> {
    let response = state
        .client
        .search(&type_tally(Works::index(&state.config)))
        .await?;

    let tally = response
        .aggregations
        .as_ref()
        .and_then(|aggs| aggs.get("workTypes"))
        .and_then(|agg| agg.get("buckets"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|bucket| {
            let key = bucket.get("key")?.as_str()?;
            let count = bucket.get("doc_count")?.as_u64()?;
            Some((key.to_string(), json!(count)))
        })
        .collect();

    Ok(Json(tally))
}

/// The indices this deployment reads from.
pub(crate) async fn elastic_config(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "worksIndex": Works::index(&state.config),
        "imagesIndex": Images::index(&state.config),
        "pipelineDate": state.config.pipeline_date,
    }))
}

/// The relevance templates queries are rendered from.
pub(crate) async fn search_templates() -> Json<Value> {
    Json(json!({
        "templates": {
            Works::PATH: Works::relevance_template(),
            Images::PATH: Images::relevance_template(),
        }
    }))
}
