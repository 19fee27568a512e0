//! Batch orchestration: enumerate, scrape each object, checkpoint, finish.
//!
//! A run moves through `Init -> Enumerating -> Processing -> Finalizing ->
//! Done`. Objects are handled strictly one after another on a single page
//! session. Every boundary failure inside an object degrades to an empty
//! default; anything else that goes wrong for an object becomes a placeholder
//! row. Only enumeration and workbook saves can end a run early.

use crate::acquisition::http_client::HttpClient;
use crate::acquisition::search::fetch_object_ids;
use crate::assets::{AssetResolver, ImagePlan};
use crate::config::{clamp_offset, RunOptions, ScrapeConfig};
use crate::error::{FetchResult, HarvestError};
use crate::model::{ApiRecord, ObjectId, PageData, Record};
use crate::progress::{self, DataSource, ProgressEventKind, ProgressSender};
use crate::reconcile::{description_url, Reconciler};
use crate::renderer::PageInspector;
use crate::sink::{load_thumbnail, TabularSink};
use futures::FutureExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Init,
    Enumerating,
    Processing,
    Finalizing,
    Done,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total_ids: usize,
    pub start_offset: usize,
    /// Rows written, placeholders included.
    pub processed: usize,
    pub placeholders: usize,
    /// Degradation count per source.
    pub degraded: BTreeMap<DataSource, usize>,
    pub checkpoints: usize,
    pub output: PathBuf,
    pub elapsed_ms: u64,
}

/// Everything gathered for one object, ready for the sink.
struct ScrapedObject {
    record: Record,
    plan: ImagePlan,
    /// Thumbnail PNG bytes, already decoded and resized.
    thumbnail: Option<Vec<u8>>,
}

/// Drives one harvest run.
pub struct Harvester {
    config: Arc<ScrapeConfig>,
    options: RunOptions,
    /// Enumeration client; a failed search is never retried.
    search_http: HttpClient,
    reconciler: Reconciler,
    assets: AssetResolver,
    progress: Option<ProgressSender>,
    seq: u64,
    phase: RunPhase,
    summary: RunSummary,
}

impl Harvester {
    pub fn new(config: ScrapeConfig, options: RunOptions) -> Self {
        let config = Arc::new(config);
        let http = HttpClient::new(config.http_retries);
        let reconciler = Reconciler::new(config.clone(), http.clone());
        let assets = AssetResolver::new(options.image_root.clone(), http, &config);

        Self {
            config,
            options,
            search_http: HttpClient::new(0),
            reconciler,
            assets,
            progress: None,
            seq: 0,
            phase: RunPhase::Init,
            summary: RunSummary::default(),
        }
    }

    /// Send progress events to `tx` during the run.
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!("phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn emit(&mut self, event: ProgressEventKind) {
        progress::emit(&self.progress, &mut self.seq, event);
    }

    /// Collapse a failed boundary call to `fallback`, logging and reporting
    /// the failure.
    fn degrade<T>(
        &mut self,
        object_id: ObjectId,
        source: DataSource,
        result: FetchResult<T>,
        fallback: impl FnOnce() -> T,
    ) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(object_id, source = %source, "{source} data unavailable: {e}");
                *self.summary.degraded.entry(source).or_default() += 1;
                self.emit(ProgressEventKind::Degraded {
                    object_id,
                    source,
                    message: e.to_string(),
                });
                fallback()
            }
        }
    }

    /// Run the whole batch, using `inspector` for every object page.
    ///
    /// The inspector is closed before returning, on success or failure.
    pub async fn run(
        &mut self,
        mut inspector: Box<dyn PageInspector>,
    ) -> Result<RunSummary, HarvestError> {
        let started = Instant::now();
        self.summary = RunSummary {
            output: self.options.output.clone(),
            ..RunSummary::default()
        };

        // Init
        if let Err(e) = tokio::fs::create_dir_all(&self.options.image_root).await {
            warn!(
                "cannot create image root {}: {e}",
                self.options.image_root.display()
            );
        }
        let mut sink = match TabularSink::create(&self.options.output, &self.config) {
            Ok(sink) => sink,
            Err(e) => {
                close_inspector(inspector).await;
                return Err(HarvestError::Sink(e));
            }
        };

        self.enter(RunPhase::Enumerating);
        let fetched = fetch_object_ids(&self.search_http, &self.config, self.options.limit).await;
        let ids = match fetched {
            Ok(ids) => ids,
            Err(e) => {
                close_inspector(inspector).await;
                return Err(HarvestError::Enumeration(e));
            }
        };
        let total = ids.len();
        let offset = clamp_offset(self.options.start_offset, total);
        let remaining = total - offset;
        self.summary.total_ids = total;
        self.summary.start_offset = offset;
        info!("found {total} object IDs, starting at offset {offset} ({remaining} to scrape)");
        self.emit(ProgressEventKind::Enumerated {
            total_ids: total,
            offset,
            remaining,
        });

        self.enter(RunPhase::Processing);
        let processed = self
            .process_all(&ids[offset..], offset, total, inspector.as_mut(), &mut sink)
            .await;
        if let Err(e) = processed {
            close_inspector(inspector).await;
            return Err(e);
        }

        self.enter(RunPhase::Finalizing);
        close_inspector(inspector).await;
        save(&mut sink)?;
        self.summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "saved {} rows to {} ({} placeholders)",
            self.summary.processed,
            sink.path().display(),
            self.summary.placeholders
        );
        self.emit(ProgressEventKind::RunComplete {
            processed: self.summary.processed,
            elapsed_ms: self.summary.elapsed_ms,
        });

        self.enter(RunPhase::Done);
        Ok(self.summary.clone())
    }

    async fn process_all(
        &mut self,
        ids: &[ObjectId],
        offset: usize,
        total: usize,
        inspector: &mut dyn PageInspector,
        sink: &mut TabularSink,
    ) -> Result<(), HarvestError> {
        for (idx, &object_id) in ids.iter().enumerate() {
            let index = offset + idx + 1;
            info!("[{index}/{total}] scraping {object_id}");
            self.emit(ProgressEventKind::ObjectStarted {
                index,
                total,
                object_id,
            });

            let scraped = AssertUnwindSafe(self.scrape_object(inspector, object_id))
                .catch_unwind()
                .await;
            let written = match scraped {
                Ok(obj) => match sink.append(&obj.record, &obj.plan, obj.thumbnail.as_deref()) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(object_id, "row write failed: {e}");
                        false
                    }
                },
                Err(_) => {
                    warn!(object_id, "scrape aborted");
                    false
                }
            };
            if !written {
                sink.append_placeholder(object_id)
                    .map_err(HarvestError::Sink)?;
                self.summary.placeholders += 1;
            }

            self.summary.processed += 1;
            let processed = self.summary.processed;
            info!("processed {processed}/{}", ids.len());
            self.emit(ProgressEventKind::ObjectFinished {
                processed,
                total: ids.len(),
                object_id,
                placeholder: !written,
            });

            let save_every = self.options.save_every;
            if save_every > 0 && processed % save_every == 0 {
                save(sink)?;
                self.summary.checkpoints += 1;
                info!("checkpoint: {} rows saved", sink.data_rows());
                self.emit(ProgressEventKind::CheckpointSaved {
                    rows: sink.data_rows(),
                });
            }

            if !self.config.pacing.is_zero() {
                tokio::time::sleep(self.config.pacing).await;
            }
        }
        Ok(())
    }

    /// Gather and merge every source for one object.
    async fn scrape_object(
        &mut self,
        inspector: &mut dyn PageInspector,
        object_id: ObjectId,
    ) -> ScrapedObject {
        let api = self.reconciler.api_record(object_id).await;
        let api = self.degrade(object_id, DataSource::Api, api, ApiRecord::default);

        let page = self.reconciler.page_data(inspector, object_id).await;
        let page_url = self.config.endpoints.object_page_url(object_id);
        let page = self.degrade(object_id, DataSource::Page, page, || {
            PageData::empty(page_url)
        });

        let url = description_url(&api, &page).to_string();
        let description = self.reconciler.long_description(&url).await;
        let description =
            self.degrade(object_id, DataSource::Description, description, String::new);

        let record = self.reconciler.merge(object_id, &api, &page, &description);
        let plan = self.assets.plan(&record);
        let image = self.assets.ensure_primary(&plan).await;
        let image = self.degrade(object_id, DataSource::Image, image, || None);
        // Decoding downloaded bytes stays inside the per-object guard.
        let thumbnail = image.and_then(|path| {
            load_thumbnail(&path, self.config.thumbnail_px)
                .map_err(|e| warn!(object_id, "unusable thumbnail {}: {e}", path.display()))
                .ok()
        });

        ScrapedObject {
            record,
            plan,
            thumbnail,
        }
    }
}

fn save(sink: &mut TabularSink) -> Result<(), HarvestError> {
    sink.save().map_err(|source| HarvestError::Checkpoint {
        path: sink.path().to_path_buf(),
        source,
    })
}

async fn close_inspector(inspector: Box<dyn PageInspector>) {
    if let Err(e) = inspector.close().await {
        warn!("closing browser session failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoints;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Inspector with no browser behind it: every navigation fails.
    struct Offline;

    #[async_trait]
    impl PageInspector for Offline {
        async fn navigate(&mut self, _url: &str, _timeout_ms: u64) -> FetchResult<()> {
            Err(FetchError::browser("offline"))
        }
        async fn title(&self) -> FetchResult<String> {
            Ok(String::new())
        }
        async fn discovered_image_urls(&self) -> FetchResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn click_labeled_tab(&mut self, _label: &str, _timeout_ms: u64) -> FetchResult<bool> {
            Ok(false)
        }
        async fn section_text(&self, _heading: &str) -> FetchResult<String> {
            Ok(String::new())
        }
        async fn close(self: Box<Self>) -> FetchResult<()> {
            Ok(())
        }
    }

    fn harvester(server: &MockServer, dir: &tempfile::TempDir) -> Harvester {
        let config = ScrapeConfig {
            endpoints: Endpoints::with_base(&server.uri()),
            ..ScrapeConfig::default()
        }
        .without_delays();
        let options = RunOptions {
            output: dir.path().join("out.xlsx"),
            image_root: dir.path().join("images"),
            start_offset: 0,
            limit: None,
            save_every: 25,
        };
        Harvester::new(config, options)
    }

    #[tokio::test]
    async fn test_degraded_sources_counted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"objectIDs": [1, 2]})))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut h = harvester(&server, &dir);
        let (tx, mut rx) = progress::channel();
        h = h.with_progress(tx);

        let summary = h.run(Box::new(Offline)).await.unwrap();
        assert_eq!(h.phase(), RunPhase::Done);
        assert_eq!(summary.total_ids, 2);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.placeholders, 0);
        assert_eq!(summary.degraded[&DataSource::Api], 2);
        assert_eq!(summary.degraded[&DataSource::Page], 2);
        assert!(dir.path().join("out.xlsx").exists());

        let first = rx.try_recv().unwrap().event;
        assert_eq!(
            first,
            ProgressEventKind::Enumerated {
                total_ids: 2,
                offset: 0,
                remaining: 2
            }
        );
    }

    #[tokio::test]
    async fn test_enumeration_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut h = harvester(&server, &dir);
        let err = h.run(Box::new(Offline)).await.unwrap_err();
        assert!(matches!(err, HarvestError::Enumeration(_)));
        assert_eq!(h.phase(), RunPhase::Enumerating);
        assert!(!dir.path().join("out.xlsx").exists());
    }

    #[tokio::test]
    async fn test_unwritable_output_is_checkpoint_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"objectIDs": []})))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut h = harvester(&server, &dir);
        h.options.output = dir.path().join("missing").join("out.xlsx");
        let err = h.run(Box::new(Offline)).await.unwrap_err();
        assert!(matches!(err, HarvestError::Checkpoint { .. }));
    }

    #[tokio::test]
    async fn test_enumeration_never_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = ScrapeConfig {
            endpoints: Endpoints::with_base(&server.uri()),
            http_retries: 3,
            ..ScrapeConfig::default()
        }
        .without_delays();
        let mut h = Harvester::new(config, harvester(&server, &dir).options);
        let err = h.run(Box::new(Offline)).await.unwrap_err();
        assert!(matches!(
            err,
            HarvestError::Enumeration(FetchError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_undecodable_image_keeps_row() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"objectIDs": [5]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/objects/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "objectID": 5,
                "title": "Saber",
                "primaryImage": format!("{}/img/5.jpg", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/5.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xff\xd8 cut short".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut h = harvester(&server, &dir);
        let summary = h.run(Box::new(Offline)).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.placeholders, 0);
        assert!(!summary.degraded.contains_key(&DataSource::Image));
        assert!(dir.path().join("images").join("5").join("5_1.jpg").exists());

        let file = std::fs::File::open(dir.path().join("out.xlsx")).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert!(archive.by_name("xl/drawings/drawing1.xml").is_err());
    }
}
