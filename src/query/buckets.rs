//! Turning raw aggregation results into response buckets.

use crate::params::registry::{AggregationField, BucketShape};
use crate::query::aggregation::{LABELS, NESTED, NESTED_SELF, TERMS, global_name};
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketData {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub data: BucketData,
    pub count: u64,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    pub buckets: Vec<Bucket>,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug)]
struct RawBucket {
    key: String,
    count: u64,
    label: Option<String>,
}

/// Parse every requested aggregation present in `aggs`, keyed by response key.
pub fn parse_all<A: AggregationField>(
    aggs: &Map<String, Value>,
    requested: &[A],
) -> BTreeMap<&'static str, Aggregation> {
    requested
        .iter()
        .filter_map(|aggregation| Some((aggregation.response_key(), parse(aggs, *aggregation)?)))
        .collect()
}

/// Merge the main, self and global results for one aggregation.
///
/// Buckets from the main aggregation win. Selected values missing from it
/// are added from the self aggregation, and any bucket still lacking a label
/// takes it from the global aggregation. Buckets are ordered by count
/// descending, then id ascending. Malformed buckets are dropped.
pub fn parse<A: AggregationField>(aggs: &Map<String, Value>, aggregation: A) -> Option<Aggregation> {
    let params = aggregation.params();
    let container = aggs.get(params.container)?;

    let main = raw_buckets(container.pointer(&format!("/{NESTED}")), params.shape);
    let selected = raw_buckets(container.pointer(&format!("/{NESTED_SELF}")), params.shape);
    let global_labels: HashMap<String, String> = raw_buckets(
        aggs.get(&global_name(&params))
            .and_then(|global| global.get(NESTED_SELF)),
        params.shape,
    )
    .into_iter()
    .filter_map(|bucket| Some((bucket.key, bucket.label?)))
    .collect();

    let mut merged: Vec<RawBucket> = Vec::with_capacity(main.len() + selected.len());
    for bucket in main.into_iter().chain(selected) {
        if !merged.iter().any(|seen| seen.key == bucket.key) {
            merged.push(bucket);
        }
    }

    let mut buckets: Vec<Bucket> = merged
        .into_iter()
        .map(|raw| {
            let label = raw
                .label
                .or_else(|| global_labels.get(&raw.key).cloned())
                .unwrap_or_else(|| raw.key.clone());
            Bucket {
                data: BucketData {
                    id: raw.key,
                    label,
                    kind: params.bucket_type,
                },
                count: raw.count,
                kind: "AggregationBucket",
            }
        })
        .collect();
    buckets.sort_by(|a, b| {
        (Reverse(a.count), &a.data.id).cmp(&(Reverse(b.count), &b.data.id))
    });

    Some(Aggregation {
        buckets,
        kind: "Aggregation",
    })
}

fn raw_buckets(nested: Option<&Value>, shape: BucketShape) -> Vec<RawBucket> {
    let Some(buckets) = nested
        .and_then(|nested| nested.pointer(&format!("/{TERMS}/buckets")))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    buckets
        .iter()
        .filter_map(|bucket| {
            let key = bucket.get("key")?.as_str().filter(|key| !key.is_empty())?;
            let count = bucket.get("doc_count")?.as_u64()?;
            let label = match shape {
                BucketShape::LabelOnly => Some(key.to_string()),
                BucketShape::LabeledId => bucket
                    .pointer(&format!("/{LABELS}/buckets/0/key"))
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            };
            Some(RawBucket {
                key: key.to_string(),
                count,
                label,
            })
        })
        .collect()
}
