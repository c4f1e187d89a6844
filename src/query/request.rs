//! Assembly of complete engine search requests.

use crate::params::decode::{SearchSpec, SortSpec};
use crate::params::registry::{Resource, SortField};
use crate::query::aggregation::{self, AggregationRequest};
use crate::query::color::{self, ColorMetric};
use crate::query::filter::CompiledFilters;
use crate::query::template;
use serde_json::{Map, Value, json};

/// Stable tie-breaker applied after every other sort.
pub const ID_SORT_FIELD: &str = "query.id";

/// Field holding each image's feature vector.
pub const FEATURES_FIELD: &str = "vectorValues.features";

/// Number of neighbours returned for `withSimilarFeatures`.
pub const SIMILAR_IMAGES: u32 = 10;

/// A search to run against one index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub index: String,
    pub body: Value,
}

/// A single document to fetch by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub index: String,
    pub id: String,
    pub source: &'static [&'static str],
}

/// Build the engine request for a decoded list request.
///
/// Matching works this way. Visibility and unpaired filters are hard filters
/// on the query, and the text query (when present) is a scored clause.
/// With a color the text query becomes a hard filter requiring every term,
/// and the score comes from the color metric alone. Paired filters go to the post-filter.
pub fn build<R: Resource>(spec: &SearchSpec<R>, index: &str, metric: &dyn ColorMetric) -> SearchRequest {
    let filters = CompiledFilters::compile(&spec.filters);

    let mut must = Vec::new();
    let mut filter = Vec::new();
    if R::VISIBLE_ONLY {
        filter.push(json!({ "term": { "type": { "value": "Visible" } } }));
    }
    filter.extend(filters.unpaired.iter().cloned());

    let text = spec
        .query
        .as_deref()
        .map(|query| template::render(R::relevance_template(), query));
    let query = match (text, filters.color) {
        (Some(mut text), Some(rgb)) => {
            template::require_all_terms(&mut text);
            filter.push(text);
            color::scoring_clause(metric, rgb, bool_query(must, filter))
        }
        (None, Some(rgb)) => color::scoring_clause(metric, rgb, bool_query(must, filter)),
        (Some(text), None) => {
            must.push(text);
            bool_query(must, filter)
        }
        (None, None) => bool_query(must, filter),
    };

    let scored = spec.query.is_some() || filters.color.is_some();
    let mut body = json!({
        "query": query,
        "from": spec.pagination.from(),
        "size": spec.pagination.page_size,
        "_source": R::SOURCE,
        "track_total_hits": true,
        "sort": sort(spec.sort, scored),
    });

    if let Some(post_filter) = filters.post_filter() {
        body["post_filter"] = post_filter;
    }

    let requests: Vec<_> = spec
        .aggregations
        .iter()
        .map(|aggregation| AggregationRequest::pair(*aggregation, &spec.filters))
        .collect();
    let aggs = aggregation::build(&requests, &filters);
    if !aggs.is_empty() {
        body["aggs"] = Value::Object(aggs);
    }

    SearchRequest {
        index: index.to_string(),
        body,
    }
}

fn bool_query(must: Vec<Value>, filter: Vec<Value>) -> Value {
    let mut clauses = Map::new();
    if !must.is_empty() {
        clauses.insert("must".to_string(), Value::Array(must));
    }
    if !filter.is_empty() {
        clauses.insert("filter".to_string(), Value::Array(filter));
    }
    if clauses.is_empty() {
        return json!({ "match_all": {} });
    }
    json!({ "bool": clauses })
}

/// The sort chain: relevance when scoring, then the explicit sort, then id.
fn sort<S: SortField>(explicit: Option<SortSpec<S>>, scored: bool) -> Vec<Value> {
    let mut chain = Vec::with_capacity(3);
    if scored {
        chain.push(json!({ "_score": { "order": "desc" } }));
    }
    if let Some(SortSpec { field, order }) = explicit {
        chain.push(json!({ field.path(): { "order": order.as_str(), "missing": "_last" } }));
    }
    chain.push(json!({ ID_SORT_FIELD: { "order": "asc" } }));
    chain
}

/// Nearest neighbours of an image by feature vector, excluding the image itself.
pub fn similar_features(index: &str, id: &str, features: &[f64]) -> SearchRequest {
    SearchRequest {
        index: index.to_string(),
        body: json!({
            "query": {
                "script_score": {
                    "query": {
                        "bool": {
                            "filter": [{ "exists": { "field": FEATURES_FIELD } }],
                            "must_not": [{ "ids": { "values": [id] } }]
                        }
                    },
                    "script": {
                        "source": "cosineSimilarity(params.query_vector, 'vectorValues.features') + 1.0",
                        "params": { "query_vector": features }
                    }
                }
            },
            "size": SIMILAR_IMAGES,
            "_source": ["display"],
        }),
    }
}

/// Counts of stored documents per lifecycle type.
pub fn type_tally(index: &str) -> SearchRequest {
    SearchRequest {
        index: index.to_string(),
        body: json!({
            "size": 0,
            "track_total_hits": true,
            "aggs": { "workTypes": { "terms": { "field": "type", "size": 10 } } }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::decode::{Limits, RawParams, decode_search};
    use crate::params::registry::{Images, Works};
    use crate::query::color::NormalizedRgb;
    use assert2::{check, let_assert};

    fn works(query: &str) -> Value {
        let_assert!(Ok(spec) = decode_search::<Works>(&RawParams::parse(Some(query)), &Limits::default()));
        build(&spec, "works-indexed-test", &NormalizedRgb).body
    }

    fn images(query: &str) -> Value {
        let_assert!(Ok(spec) = decode_search::<Images>(&RawParams::parse(Some(query)), &Limits::default()));
        build(&spec, "images-indexed-test", &NormalizedRgb).body
    }

    #[test]
    fn default_request() {
        let body = works("");
        check!(body["query"] == json!({ "bool": { "filter": [{ "term": { "type": { "value": "Visible" } } }] } }));
        check!(body["from"] == 0);
        check!(body["size"] == 10);
        check!(body["track_total_hits"] == true);
        check!(body["_source"] == json!(["display", "type"]));
        check!(body["sort"] == json!([{ "query.id": { "order": "asc" } }]));
        check!(body.get("post_filter").is_none());
        check!(body.get("aggs").is_none());
    }

    #[test]
    fn pagination_offsets() {
        let body = works("page=3&pageSize=25");
        check!(body["from"] == 50);
        check!(body["size"] == 25);
    }

    #[test]
    fn text_queries_score_and_sort_by_relevance() {
        let body = works("query=bats");
        check!(body["query"]["bool"]["must"][0]["bool"]["should"][1]["multi_match"]["query"] == "bats");
        check!(body["sort"] == json!([{ "_score": { "order": "desc" } }, { "query.id": { "order": "asc" } }]));
    }

    #[test]
    fn relevance_outranks_an_explicit_sort() {
        let body = works("query=bats&sort=production.dates&sortOrder=desc");
        check!(
            body["sort"]
                == json!([
                    { "_score": { "order": "desc" } },
                    { "filterableValues.production.dates.range.from": { "order": "desc", "missing": "_last" } },
                    { "query.id": { "order": "asc" } }
                ])
        );
    }

    #[test]
    fn explicit_sort_without_a_query() {
        let body = works("sort=production.dates");
        check!(
            body["sort"]
                == json!([
                    { "filterableValues.production.dates.range.from": { "order": "asc", "missing": "_last" } },
                    { "query.id": { "order": "asc" } }
                ])
        );
    }

    #[test]
    fn color_scores_before_an_explicit_sort() {
        let body = images("color=e02020&sort=source.production.dates");
        check!(body["sort"][0] == json!({ "_score": { "order": "desc" } }));
        check!(body["sort"][1]["filterableValues.source.production.dates.range.from"]["order"] == "asc");
    }

    #[test]
    fn paired_filters_go_to_the_post_filter() {
        let body = works("subjects.label=%22PATCH%20CLAMPING%22&identifiers=b1234");
        check!(
            body["post_filter"]
                == json!({ "bool": { "filter": [{ "terms": { "filterableValues.subjects.label": ["PATCH CLAMPING"] } }] } })
        );
        check!(body["query"]["bool"]["filter"][1] == json!({ "terms": { "query.identifiers.value": ["b1234"] } }));
    }

    #[test]
    fn aggregations_skip_their_own_filter() {
        let body = works("workType=a&languages=eng&aggregations=workType,languages,genres");
        let clauses = |container: &str| body["aggs"][container]["filter"]["bool"]["filter"].clone();

        check!(clauses("format") == json!([{ "terms": { "filterableValues.languages.id": ["eng"] } }]));
        check!(clauses("languages") == json!([{ "terms": { "filterableValues.format.id": ["a"] } }]));
        check!(clauses("genres").as_array().map(Vec::len) == Some(2));
    }

    #[test]
    fn images_are_not_restricted_to_visible() {
        let body = images("");
        check!(body["query"] == json!({ "match_all": {} }));
    }

    #[test]
    fn color_scores_and_text_filters() {
        let body = images("color=ff0000&query=cats");
        let script_score = &body["query"]["script_score"];
        check!(script_score["script"]["params"]["query_vector"] == json!([1.0, 0.0, 0.0]));
        check!(script_score["query"]["bool"].get("must").is_none());
        check!(script_score["query"]["bool"]["filter"][0]["bool"]["should"][1]["multi_match"]["query"] == "cats");
        check!(body["sort"][0] == json!({ "_score": { "order": "desc" } }));
    }

    #[test]
    fn color_text_filter_requires_every_term() {
        let body = images("color=e02020&query=abc123%20zebra");
        let_assert!(Some(filters) = body.pointer("/query/script_score/query/bool/filter").and_then(Value::as_array));
        let_assert!(Some(clauses) = filters[0].pointer("/bool/should").and_then(Value::as_array));
        check!(!clauses.is_empty());
        for clause in clauses {
            check!(clause["multi_match"]["query"] == "abc123 zebra");
            check!(clause["multi_match"]["operator"] == "and");
        }
    }

    #[test]
    fn text_without_color_keeps_the_template_operators() {
        let body = images("query=abc123%20zebra");
        check!(body["query"]["bool"]["must"][0]["bool"]["should"][0]["multi_match"]["operator"] == "or");
    }

    #[test]
    fn similar_features_exclude_self() {
        let request = similar_features("images", "abc", &[0.1, 0.2]);
        check!(request.body["query"]["script_score"]["query"]["bool"]["must_not"][0]["ids"]["values"] == json!(["abc"]));
        check!(request.body["size"] == 10);
    }
}
