//! Object metadata from the JSON API.

use super::http_client::HttpClient;
use crate::config::ScrapeConfig;
use crate::error::FetchResult;
use crate::model::{ApiRecord, ObjectId};

/// Fetch metadata for one object.
///
/// Callers collapse any error to `ApiRecord::default()`.
pub async fn fetch_api_record(
    http: &HttpClient,
    config: &ScrapeConfig,
    object_id: ObjectId,
) -> FetchResult<ApiRecord> {
    let url = config.endpoints.object_api_url(object_id);
    let json = http.get_json(&url, &[], config.timeouts.api_ms).await?;
    Ok(ApiRecord::from_json(&json))
}
