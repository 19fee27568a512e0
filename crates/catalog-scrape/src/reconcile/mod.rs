//! Field reconciliation for one object.
//!
//! Three independent sources feed a record: the JSON API, the rendered page
//! (through a `PageInspector`) and the raw page HTML for the long
//! description. Each source call returns a `FetchResult`; the caller decides
//! how a failure degrades. `merge::reconcile` is the pure merge step.

pub mod merge;
pub mod page;

pub use merge::{description_url, reconcile};

use crate::acquisition::api::fetch_api_record;
use crate::acquisition::description::fetch_long_description;
use crate::acquisition::http_client::HttpClient;
use crate::config::ScrapeConfig;
use crate::error::FetchResult;
use crate::model::{ApiRecord, ObjectId, PageData, Record};
use crate::renderer::PageInspector;
use std::sync::Arc;

/// Source access for reconciliation, bound to one configuration.
#[derive(Clone)]
pub struct Reconciler {
    config: Arc<ScrapeConfig>,
    http: HttpClient,
}

impl Reconciler {
    pub fn new(config: Arc<ScrapeConfig>, http: HttpClient) -> Self {
        Self { config, http }
    }

    pub async fn api_record(&self, object_id: ObjectId) -> FetchResult<ApiRecord> {
        fetch_api_record(&self.http, &self.config, object_id).await
    }

    pub async fn page_data(
        &self,
        inspector: &mut dyn PageInspector,
        object_id: ObjectId,
    ) -> FetchResult<PageData> {
        page::scrape_page(inspector, &self.config, object_id).await
    }

    pub async fn long_description(&self, url: &str) -> FetchResult<String> {
        fetch_long_description(&self.http, url, self.config.timeouts.description_ms).await
    }

    pub fn merge(
        &self,
        object_id: ObjectId,
        api: &ApiRecord,
        page: &PageData,
        long_description: &str,
    ) -> Record {
        reconcile(
            object_id,
            api,
            page,
            long_description,
            &self.config.catalog_fields,
            self.config.max_additional_images,
        )
    }
}
