//! Page counts and public prev/next links.
//!
//! Links point at the public root rather than whatever host served the
//! request: scheme, host, port and base path come from the configured root
//! and the request path is appended to it.

use crate::params::decode::PaginationSpec;
use axum::http::Uri;
use serde::Serialize;
use url::Url;
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLinks {
    pub page_size: u32,
    pub total_pages: u64,
    pub total_results: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<String>,
}

/// `path` (and `query`) under the public root.
pub fn public_url(root: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = root.clone();
    let base = root.path().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    url.set_path(&format!("{base}/{path}"));
    url.set_query(query.filter(|query| !query.is_empty()));
    url.set_fragment(None);
    url
}

pub fn page_links(root: &Url, uri: &Uri, pagination: PaginationSpec, total_results: u64) -> PageLinks {
    let total_pages = total_results.div_ceil(u64::from(pagination.page_size));
    let page = u64::from(pagination.page);

    let link = |target: u64| {
        (target >= 1 && target <= total_pages).then(|| with_page(root, uri, target))
    };

    PageLinks {
        page_size: pagination.page_size,
        total_pages,
        total_results,
        prev_page: link(page.saturating_sub(1)),
        next_page: link(page + 1),
    }
}

/// The public form of `uri` with its `page` parameter set to `page`.
///
/// The first `page` keeps its position in the query and any repeats are
/// dropped; without one, `page` is appended. The query is re-encoded as
/// form data.
fn with_page(root: &Url, uri: &Uri, page: u64) -> String {
    let page = page.to_string();
    let mut replaced = false;
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, value) in form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes()).into_owned() {
        if key != "page" {
            pairs.push((key, value));
        } else if !replaced {
            replaced = true;
            pairs.push((key, page.clone()));
        }
    }
    if !replaced {
        pairs.push(("page".to_string(), page));
    }

    let mut url = public_url(root, uri.path(), None);
    url.query_pairs_mut().extend_pairs(pairs);
    url.to_string()
}
