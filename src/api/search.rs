//! List endpoints, shared by both resources.

use crate::api::AppState;
use crate::api::pagination::page_links;
use crate::api::response::ResultList;
use crate::error::Result;
use crate::params::{RawParams, Resource, decode_search};
use crate::query::buckets;
use crate::query::request;
use crate::query::reshape::{gate_includes, take_display};
use axum::Json;
use axum::extract::{OriginalUri, State};

pub(crate) async fn list<R: Resource>(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<ResultList>> {
    let params = RawParams::parse(uri.query());
    let spec = decode_search::<R>(&params, &state.config.limits)?;

    let request = request::build(&spec, R::index(&state.config), state.metric.as_ref());
    tracing::debug!(
        resource = R::PATH,
        filters = spec.filters.len(),
        aggregations = spec.aggregations.len(),
        "Searching"
    );
    let response = state.client.search(&request).await?;

    let total = response.hits.total();
    let results = response
        .hits
        .hits
        .into_iter()
        .filter_map(|hit| take_display(hit.source))
        .map(|mut display| {
            gate_includes(&mut display, &spec.includes);
            display
        })
        .collect();

    let aggregations = response
        .aggregations
        .map(|aggs| buckets::parse_all(&aggs, &spec.aggregations))
        .filter(|parsed| !parsed.is_empty());

    let links = page_links(&state.config.public_root_url, &uri, spec.pagination, total);
    Ok(Json(ResultList::new(links, results, aggregations)))
}
