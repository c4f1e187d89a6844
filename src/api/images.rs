//! Single-image lookup.

use crate::api::AppState;
use crate::api::response::Outcome;
use crate::engine::EngineError;
use crate::error::{ApiError, Result};
use crate::params::registry::ImageInclude;
use crate::params::{Images, RawParams, Resource, decode_item};
use crate::query::GetRequest;
use crate::query::request::similar_features;
use crate::query::reshape::{IMAGE_SOURCE, StoredImage, gate_includes, image_summary, take_display};
use axum::extract::{OriginalUri, Path, State};
use serde_json::Value;

pub(crate) async fn image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Result<Outcome<Value>> {
    let spec = decode_item::<Images>(&RawParams::parse(uri.query()))?;

    let request = GetRequest {
        index: Images::index(&state.config).to_string(),
        id: id.clone(),
        source: IMAGE_SOURCE,
    };
    let response = match state.client.get(&request).await {
        Ok(response) if response.found => response,
        Ok(_) => return Err(ApiError::not_found(Images::LABEL, id)),
        Err(err) if err.is_not_found() => return Err(ApiError::not_found(Images::LABEL, id)),
        Err(err) => return Err(err.into()),
    };

    let stored: StoredImage = match response.source {
        Some(source) => serde_json::from_value(source)
            .map_err(|err| ApiError::Upstream(EngineError::Decode(err.to_string())))?,
        None => StoredImage::default(),
    };
    let Some(mut display) = stored.display else {
        return Err(ApiError::not_found(Images::LABEL, id));
    };
    gate_includes(&mut display, &spec.includes);

    if spec.includes.contains(&ImageInclude::WithSimilarFeatures) {
        let features = stored
            .vector_values
            .and_then(|vectors| vectors.features)
            .unwrap_or_default();
        let similar = if features.is_empty() {
            Vec::new()
        } else {
            let request = similar_features(Images::index(&state.config), &id, &features);
            state
                .client
                .search(&request)
                .await?
                .hits
                .hits
                .into_iter()
                .filter_map(|hit| take_display(hit.source))
                .filter_map(|display| image_summary(&display))
                .collect()
        };
        if let Some(fields) = display.as_object_mut() {
            fields.insert("withSimilarFeatures".to_string(), Value::Array(similar));
        }
    }

    Ok(Outcome::Found(display))
}
