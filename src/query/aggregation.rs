//! Aggregation requests.
//!
//! Each requested aggregation becomes a container named after
//! [`AggregationParams::container`]:
//!
//! ```text
//! {container}          filter: paired filters except this aggregation's own
//!   nested             terms over the field, top `size` by count
//!   nestedSelf         the same terms restricted to the selected values,
//!                      with zero counts kept
//! {container}Global    global scope
//!   nestedSelf         labels for selected values nothing else matched
//! ```
//!
//! The self aggregations guarantee every selected value comes back as a
//! bucket even when it falls outside the top `size`.

use crate::params::registry::{AggregationField, AggregationParams, BucketShape, FilterField};
use crate::query::filter::{CompiledFilters, FilterSpec, Values};
use serde_json::{Map, Value, json};

pub const NESTED: &str = "nested";
pub const NESTED_SELF: &str = "nestedSelf";
pub const TERMS: &str = "terms";
pub const LABELS: &str = "labels";

pub fn global_name(params: &AggregationParams) -> String {
    format!("{}Global", params.container)
}

/// An aggregation to compute, with the filter on its own field if present.
#[derive(Debug)]
pub struct AggregationRequest<'a, F: FilterField> {
    pub aggregation: F::Aggregation,
    pub paired: Option<&'a FilterSpec<F>>,
}

impl<'a, F: FilterField> AggregationRequest<'a, F> {
    pub fn pair(aggregation: F::Aggregation, filters: &'a [FilterSpec<F>]) -> Self {
        Self {
            aggregation,
            paired: filters
                .iter()
                .find(|filter| filter.paired() == Some(aggregation)),
        }
    }

    fn selected(&self) -> Option<&Values> {
        self.paired.and_then(FilterSpec::selected_values)
    }
}

/// Build the `aggs` object for a search request.
pub fn build<F: FilterField>(
    requests: &[AggregationRequest<'_, F>],
    filters: &CompiledFilters<F::Aggregation>,
) -> Map<String, Value> {
    let mut aggs = Map::new();

    for request in requests {
        let params = request.aggregation.params();
        let selected = request.selected();

        let mut inner = Map::new();
        inner.insert(NESTED.to_string(), nested(&params, None));
        if let Some(values) = selected {
            inner.insert(NESTED_SELF.to_string(), nested(&params, Some(values)));
        }

        let clauses = filters.for_aggregation(request.aggregation);
        aggs.insert(
            params.container.to_string(),
            json!({
                "filter": { "bool": { "filter": clauses } },
                "aggs": inner,
            }),
        );

        if let Some(values) = selected {
            aggs.insert(
                global_name(&params),
                json!({
                    "global": {},
                    "aggs": { NESTED_SELF: nested(&params, Some(values)) },
                }),
            );
        }
    }

    aggs
}

fn nested(params: &AggregationParams, selected: Option<&Values>) -> Value {
    let key_field = match params.shape {
        BucketShape::LabeledId => format!("{}.id", params.path),
        BucketShape::LabelOnly => format!("{}.label", params.path),
    };

    let mut terms = json!({
        "field": key_field,
        "size": params.size,
        "order": [{ "_count": "desc" }, { "_key": "asc" }],
    });
    if let Some(values) = selected {
        terms["include"] = json!(values.as_slice());
        terms["min_doc_count"] = json!(0);
    }

    let mut body = json!({ TERMS: terms });
    if params.shape == BucketShape::LabeledId {
        body["aggs"] = json!({
            LABELS: { "terms": { "field": format!("{}.label", params.path), "size": 1 } }
        });
    }

    json!({
        "nested": { "path": params.path },
        "aggs": { TERMS: body },
    })
}
