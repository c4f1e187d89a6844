//! Filter representation and compilation to engine clauses.
//!
//! Filters split two ways once compiled. Unpaired filters narrow both the
//! hits and every aggregation, so they go in the main query. Paired filters
//! narrow the hits through the post-filter and every aggregation except
//! their own, which keeps a facet's counts stable while it is being used.

use crate::params::registry::{FieldKind, FilterField};
use crate::query::color::Rgb;
use chrono::NaiveDate;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Include,
    Exclude,
}

/// A non-empty list of filter values without duplicates, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Values(Vec<String>);

impl Values {
    /// Returns `None` when no values remain after dropping duplicates and
    /// empty strings.
    pub fn new(values: impl IntoIterator<Item = String>) -> Option<Self> {
        let mut unique: Vec<String> = Vec::new();
        for value in values {
            if !value.is_empty() && !unique.contains(&value) {
                unique.push(value);
            }
        }
        (!unique.is_empty()).then_some(Self(unique))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// One decoded filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec<F> {
    Terms {
        field: F,
        mode: Mode,
        values: Values,
    },
    /// Inclusive date bounds; at least one is present.
    Range {
        field: F,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    Color {
        field: F,
        color: Rgb,
    },
}

impl<F: FilterField> FilterSpec<F> {
    pub fn field(&self) -> F {
        match self {
            Self::Terms { field, .. } | Self::Range { field, .. } | Self::Color { field, .. } => {
                *field
            }
        }
    }

    pub fn paired(&self) -> Option<F::Aggregation> {
        self.field().paired()
    }

    /// Values a paired aggregation should always report, even at zero count.
    pub fn selected_values(&self) -> Option<&Values> {
        match self {
            Self::Terms {
                mode: Mode::Include,
                values,
                ..
            } => Some(values),
            _ => None,
        }
    }

    /// The boolean clause for this filter. Color filters score instead of
    /// matching and have none.
    pub fn clause(&self) -> Option<Value> {
        match self {
            Self::Terms {
                field,
                mode: Mode::Include,
                values,
            } => Some(match (field.kind(), values.as_slice()) {
                (FieldKind::Single, [value]) => json!({ "term": { field.path(): { "value": value } } }),
                (_, values) => json!({ "terms": { field.path(): values } }),
            }),
            Self::Terms {
                field,
                mode: Mode::Exclude,
                values,
            } => Some(json!({
                "bool": {
                    "must_not": [{ "terms": { field.path(): values.as_slice() } }]
                }
            })),
            Self::Range { field, from, to } => {
                let mut bounds = serde_json::Map::new();
                if let Some(from) = from {
                    bounds.insert("gte".to_string(), json!(from.format("%Y-%m-%d").to_string()));
                }
                if let Some(to) = to {
                    bounds.insert("lte".to_string(), json!(to.format("%Y-%m-%d").to_string()));
                }
                Some(json!({ "range": { field.path(): bounds } }))
            }
            Self::Color { .. } => None,
        }
    }
}

/// Filters compiled and partitioned by pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilters<A> {
    /// Clauses from unpaired filters.
    pub unpaired: Vec<Value>,
    /// Clauses from paired filters, with the aggregation each one skips.
    pub paired: Vec<(A, Value)>,
    pub color: Option<Rgb>,
}

impl<A: Copy + PartialEq> CompiledFilters<A> {
    pub fn compile<F>(filters: &[FilterSpec<F>]) -> Self
    where
        F: FilterField<Aggregation = A>,
    {
        let mut compiled = Self {
            unpaired: Vec::new(),
            paired: Vec::new(),
            color: None,
        };

        for filter in filters {
            if let FilterSpec::Color { color, .. } = filter {
                compiled.color = Some(*color);
                continue;
            }
            let Some(clause) = filter.clause() else {
                continue;
            };
            match filter.paired() {
                Some(aggregation) => compiled.paired.push((aggregation, clause)),
                None => compiled.unpaired.push(clause),
            }
        }

        compiled
    }

    /// Post-filter over every paired clause, if there are any.
    pub fn post_filter(&self) -> Option<Value> {
        if self.paired.is_empty() {
            return None;
        }
        let clauses: Vec<&Value> = self.paired.iter().map(|(_, clause)| clause).collect();
        Some(json!({ "bool": { "filter": clauses } }))
    }

    /// Paired clauses that still apply to `aggregation`.
    pub fn for_aggregation(&self, aggregation: A) -> Vec<Value> {
        self.paired
            .iter()
            .filter(|(paired, _)| *paired != aggregation)
            .map(|(_, clause)| clause.clone())
            .collect()
    }
}
