//! Single-work lookup with lifecycle handling.

use crate::api::AppState;
use crate::api::pagination::public_url;
use crate::api::response::Outcome;
use crate::engine::EngineError;
use crate::error::{ApiError, Result};
use crate::params::{RawParams, Resource, Works, decode_item};
use crate::query::GetRequest;
use crate::query::reshape::{StoredWork, WORK_SOURCE, WorkState, gate_includes};
use axum::extract::{OriginalUri, Path, State};
use serde_json::Value;

pub(crate) async fn work(
    State(state): State<AppState>,
    Path(id): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Result<Outcome<Value>> {
    let spec = decode_item::<Works>(&RawParams::parse(uri.query()))?;

    let request = GetRequest {
        index: Works::index(&state.config).to_string(),
        id: id.clone(),
        source: WORK_SOURCE,
    };
    let stored: StoredWork = match state.client.get(&request).await {
        Ok(response) if response.found => response
            .source
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| ApiError::Upstream(EngineError::Decode(err.to_string())))?
            .unwrap_or_default(),
        Ok(_) => return Err(ApiError::not_found(Works::LABEL, id)),
        Err(err) if err.is_not_found() => return Err(ApiError::not_found(Works::LABEL, id)),
        Err(err) => return Err(err.into()),
    };

    match stored.state() {
        WorkState::Visible(mut display) => {
            gate_includes(&mut display, &spec.includes);
            Ok(Outcome::Found(display))
        }
        WorkState::Redirected(target) => {
            let mut location = public_url(&state.config.public_root_url, Works::PATH, uri.query());
            if let Ok(mut segments) = location.path_segments_mut() {
                segments.push(&target);
            }
            tracing::debug!(%id, %target, "Redirecting work");
            Ok(Outcome::Redirect(location.to_string()))
        }
        WorkState::Gone(reason) => Err(ApiError::Gone {
            resource: Works::LABEL,
            id,
            reason,
        }),
        WorkState::Missing => Err(ApiError::not_found(Works::LABEL, id)),
    }
}
