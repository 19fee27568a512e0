//! Object ID enumeration via the search endpoint.

use super::http_client::HttpClient;
use crate::config::ScrapeConfig;
use crate::error::FetchResult;
use crate::model::ObjectId;
use serde_json::Value;

/// Query the search endpoint once and return the ordered object IDs.
///
/// A missing or null `objectIDs` list is an empty result. Transport errors,
/// non-200 statuses and malformed JSON are returned to the caller, which
/// treats them as fatal.
pub async fn fetch_object_ids(
    http: &HttpClient,
    config: &ScrapeConfig,
    limit: Option<usize>,
) -> FetchResult<Vec<ObjectId>> {
    let json = http
        .get_json(
            &config.endpoints.search_url,
            &config.query.params(),
            config.timeouts.search_ms,
        )
        .await?;
    Ok(parse_object_ids(&json, limit))
}

/// Extract `objectIDs` from a search response, truncated to `limit`.
pub fn parse_object_ids(v: &Value, limit: Option<usize>) -> Vec<ObjectId> {
    let mut ids: Vec<ObjectId> = v
        .get("objectIDs")
        .and_then(|ids| ids.as_array())
        .map(|arr| arr.iter().filter_map(|id| id.as_u64()).collect())
        .unwrap_or_default();

    if let Some(limit) = limit {
        ids.truncate(limit);
    }
    ids
}
