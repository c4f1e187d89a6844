//! Shaping stored documents into response bodies.

use crate::error::GoneReason;
use crate::params::registry::Registered;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// Stored fields read when fetching a single work.
pub const WORK_SOURCE: &[&str] = &["display", "type", "redirectTo"];

/// Stored fields read when fetching a single image.
pub const IMAGE_SOURCE: &[&str] = &["display", "vectorValues.features"];

/// A work document as stored, limited to [`WORK_SOURCE`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWork {
    #[serde(rename = "type")]
    pub state: Option<String>,
    pub redirect_to: Option<String>,
    pub display: Option<Value>,
}

/// What to serve for a stored work.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkState {
    Visible(Value),
    Redirected(String),
    Gone(GoneReason),
    /// Nothing servable, including redirects without a target.
    Missing,
}

impl StoredWork {
    pub fn state(self) -> WorkState {
        match self.state.as_deref() {
            Some("Redirected") => self
                .redirect_to
                .filter(|id| !id.is_empty())
                .map_or(WorkState::Missing, WorkState::Redirected),
            Some("Deleted") => WorkState::Gone(GoneReason::Deleted),
            Some("Invisible") => WorkState::Gone(GoneReason::Invisible),
            _ => self.display.map_or(WorkState::Missing, WorkState::Visible),
        }
    }
}

/// An image document as stored, limited to [`IMAGE_SOURCE`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub display: Option<Value>,
    pub vector_values: Option<VectorValues>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VectorValues {
    pub features: Option<Vec<f64>>,
}

/// The `display` document out of a stored `_source`.
pub fn take_display(source: Option<Value>) -> Option<Value> {
    match source {
        Some(Value::Object(mut fields)) => fields.remove("display"),
        _ => None,
    }
}

/// Remove every optional include the client did not ask for.
///
/// Include names are dotted paths into the display document. Missing paths
/// are ignored.
pub fn gate_includes<I: Registered>(display: &mut Value, requested: &BTreeSet<I>) {
    for include in I::ALL {
        if !requested.contains(include) {
            remove_path(display, include.name());
        }
    }
}

fn remove_path(value: &mut Value, path: &str) {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };

    let mut target = value;
    for segment in parents.into_iter().flat_map(|p| p.split('.')) {
        match target.get_mut(segment) {
            Some(next) => target = next,
            None => return,
        }
    }
    if let Some(object) = target.as_object_mut() {
        object.remove(leaf);
    }
}

/// Summary of a neighbouring image for `withSimilarFeatures`.
pub fn image_summary(display: &Value) -> Option<Value> {
    let mut summary = serde_json::Map::new();
    for key in ["id", "thumbnail", "locations", "aspectRatio", "averageColor", "type"] {
        if let Some(value) = display.get(key) {
            summary.insert(key.to_string(), value.clone());
        }
    }
    summary.contains_key("id").then_some(Value::Object(summary))
}
