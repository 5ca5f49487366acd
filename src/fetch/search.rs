// src/fetch/search.rs
//! Preprint search API (arXiv Atom export).

use url::Url;

use crate::config::SearchSource;

/// Source label stamped on every search result.
pub const SEARCH_SOURCE_NAME: &str = "ArXiv";

/// Query URL for the newest submissions matching `search.query`.
pub fn query_url(search: &SearchSource) -> Result<String, url::ParseError> {
    let mut url = Url::parse(&search.endpoint)?;
    url.query_pairs_mut()
        .append_pair("search_query", &search.query)
        .append_pair("start", "0")
        .append_pair("max_results", &search.max_results.to_string())
        .append_pair("sortBy", "submittedDate")
        .append_pair("sortOrder", "descending");
    Ok(url.into())
}
