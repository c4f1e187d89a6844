//! Relevance query templates.
//!
//! Templates are JSON documents in which every string equal to `{{query}}`
//! is replaced by the user's search terms. Substitution happens on the parsed
//! value, so the terms never need escaping.

use serde_json::Value;
use std::sync::LazyLock;

const PLACEHOLDER: &str = "{{query}}";

pub static WORKS: LazyLock<Value> = LazyLock::new(|| {
    serde_json::from_str(include_str!("../../resources/works_query.json"))
        .expect("works query template is valid JSON")
});

pub static IMAGES: LazyLock<Value> = LazyLock::new(|| {
    serde_json::from_str(include_str!("../../resources/images_query.json"))
        .expect("images query template is valid JSON")
});

/// Instantiate a template with the given search terms.
pub fn render(template: &Value, query: &str) -> Value {
    let mut rendered = template.clone();
    substitute(&mut rendered, query);
    rendered
}

/// Make every `operator` in a rendered template `and`, so each clause only
/// matches documents containing all of the search terms.
pub fn require_all_terms(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(require_all_terms),
        Value::Object(map) => {
            for (key, item) in map.iter_mut() {
                if key == "operator" {
                    *item = Value::String("and".to_string());
                } else {
                    require_all_terms(item);
                }
            }
        }
        _ => {}
    }
}

fn substitute(value: &mut Value, query: &str) {
    match value {
        Value::String(s) if s == PLACEHOLDER => *s = query.to_string(),
        Value::Array(items) => items.iter_mut().for_each(|item| substitute(item, query)),
        Value::Object(map) => map.values_mut().for_each(|item| substitute(item, query)),
        _ => {}
    }
}
