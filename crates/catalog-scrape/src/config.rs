//! Configuration: scrape constants and operator-supplied run options.
//!
//! `ScrapeConfig` carries everything the reconciler, resolver and sink need
//! (endpoints, tab labels, column list, limits, timeouts). `RunOptions`
//! carries the per-run settings an operator may override from the
//! environment or the command line.

use crate::model::{CatalogField, ObjectId, Panel};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the image storage root.
pub const ENV_IMAGE_ROOT: &str = "IMAGE_ROOT_DIR";
/// Environment variable naming the output workbook.
pub const ENV_OUTPUT: &str = "OUTPUT_XLSX";
/// Environment variable holding the resume offset.
pub const ENV_START_OFFSET: &str = "START_OFFSET";

pub const DEFAULT_IMAGE_ROOT: &str = "downloaded_images";
pub const DEFAULT_OUTPUT: &str = "met_swords_full.xlsx";
pub const DEFAULT_SAVE_EVERY: usize = 25;

/// Remote endpoints for search, metadata and object pages.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub search_url: String,
    /// Object metadata endpoint; the ID is appended as a path segment.
    pub object_api_base: String,
    /// Object detail page; the ID is appended as a path segment.
    pub object_page_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            search_url: "https://collectionapi.metmuseum.org/public/collection/v1/search".into(),
            object_api_base: "https://collectionapi.metmuseum.org/public/collection/v1/objects"
                .into(),
            object_page_base: "https://www.metmuseum.org/art/collection/search".into(),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at one host, using the default path layout.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            search_url: format!("{base}/search"),
            object_api_base: format!("{base}/objects"),
            object_page_base: format!("{base}/art"),
        }
    }

    pub fn object_api_url(&self, id: ObjectId) -> String {
        format!("{}/{id}", self.object_api_base.trim_end_matches('/'))
    }

    pub fn object_page_url(&self, id: ObjectId) -> String {
        format!("{}/{id}", self.object_page_base.trim_end_matches('/'))
    }
}

/// Fixed filters sent with the search request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub term: String,
    pub department_id: u32,
    pub has_images: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            term: "sword".into(),
            department_id: 4,
            has_images: true,
        }
    }
}

impl SearchQuery {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("hasImages", self.has_images.to_string()),
            ("departmentId", self.department_id.to_string()),
            ("q", self.term.clone()),
        ]
    }
}

/// Per-call timeouts, in milliseconds.
#[derive(Debug, Clone)]
pub struct Timeouts {
    pub search_ms: u64,
    pub api_ms: u64,
    pub description_ms: u64,
    pub image_ms: u64,
    pub navigation_ms: u64,
    pub tab_click_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            search_ms: 30_000,
            api_ms: 20_000,
            description_ms: 20_000,
            image_ms: 20_000,
            navigation_ms: 90_000,
            tab_click_ms: 5_000,
        }
    }
}

/// A panel and the visible label of the tab that reveals it.
#[derive(Debug, Clone)]
pub struct TabSpec {
    pub panel: Panel,
    pub label: String,
}

impl TabSpec {
    pub fn new(panel: Panel) -> Self {
        Self {
            panel,
            label: panel.default_label().to_string(),
        }
    }
}

/// Scrape constants shared by the reconciler, resolver and sink.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub endpoints: Endpoints,
    pub query: SearchQuery,
    pub timeouts: Timeouts,
    /// Tabs clicked on each object page, in order.
    pub tabs: Vec<TabSpec>,
    /// Substring identifying the heading of the details section.
    pub section_heading: String,
    /// Lines dropped from panel text in addition to the tab labels.
    pub ignored_lines: Vec<String>,
    /// Catalog columns, in output order.
    pub catalog_fields: Vec<CatalogField>,
    pub max_additional_images: usize,
    pub image_extensions: Vec<String>,
    pub default_image_extension: String,
    /// Thumbnail footprint in pixels (square).
    pub thumbnail_px: u32,
    pub sheet_name: String,
    /// Wait after page load before reading the DOM.
    pub load_settle: Duration,
    /// Wait after a tab click for client-side re-render.
    pub tab_settle: Duration,
    /// Delay after each object.
    pub pacing: Duration,
    /// Retries for transient HTTP failures. Zero disables retry.
    pub http_retries: u32,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            query: SearchQuery::default(),
            timeouts: Timeouts::default(),
            tabs: vec![
                TabSpec::new(Panel::Overview),
                TabSpec::new(Panel::Signatures),
                TabSpec::new(Panel::Provenance),
                TabSpec::new(Panel::References),
            ],
            section_heading: "Artwork Details".into(),
            ignored_lines: vec!["Artwork Details".into(), "Object Information".into()],
            catalog_fields: CatalogField::ALL.to_vec(),
            max_additional_images: 8,
            image_extensions: ["jpg", "jpeg", "png", "gif", "tif", "tiff", "bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_image_extension: "jpg".into(),
            thumbnail_px: 150,
            sheet_name: "Met Swords".into(),
            load_settle: Duration::from_millis(1500),
            tab_settle: Duration::from_millis(800),
            pacing: Duration::from_millis(500),
            http_retries: 0,
        }
    }
}

impl ScrapeConfig {
    /// Configuration with every wait set to zero, for fixtures and dry runs.
    pub fn without_delays(mut self) -> Self {
        self.load_settle = Duration::ZERO;
        self.tab_settle = Duration::ZERO;
        self.pacing = Duration::ZERO;
        self
    }

    /// Lines removed from panel text: the fixed labels plus every tab label.
    pub fn panel_noise(&self) -> Vec<&str> {
        self.ignored_lines
            .iter()
            .map(String::as_str)
            .chain(self.tabs.iter().map(|t| t.label.as_str()))
            .collect()
    }
}

/// Operator-supplied settings for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output: PathBuf,
    pub image_root: PathBuf,
    /// IDs skipped from the start of the search result.
    pub start_offset: usize,
    /// Cap on IDs taken from the search result.
    pub limit: Option<usize>,
    /// Objects between checkpoint saves.
    pub save_every: usize,
}

impl RunOptions {
    /// Resolve options: explicit value, then environment, then default.
    pub fn resolve(
        output: Option<PathBuf>,
        image_root: Option<PathBuf>,
        start_offset: Option<usize>,
    ) -> Self {
        let output = output
            .or_else(|| std::env::var(ENV_OUTPUT).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
        let image_root = image_root
            .or_else(|| std::env::var(ENV_IMAGE_ROOT).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_ROOT));
        let start_offset = start_offset
            .unwrap_or_else(|| parse_offset(std::env::var(ENV_START_OFFSET).ok().as_deref()));

        Self {
            output,
            image_root,
            start_offset,
            limit: None,
            save_every: DEFAULT_SAVE_EVERY,
        }
    }
}

/// Parse a resume offset. Missing, malformed and negative values become 0.
pub fn parse_offset(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(|n| n.max(0) as usize)
        .unwrap_or(0)
}

/// Clamp a resume offset to `[0, total]`.
pub fn clamp_offset(offset: usize, total: usize) -> usize {
    offset.min(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset(None), 0);
        assert_eq!(parse_offset(Some("90")), 90);
        assert_eq!(parse_offset(Some(" 12 ")), 12);
        assert_eq!(parse_offset(Some("-5")), 0);
        assert_eq!(parse_offset(Some("ninety")), 0);
    }

    #[test]
    fn test_clamp_offset() {
        assert_eq!(clamp_offset(0, 10), 0);
        assert_eq!(clamp_offset(4, 10), 4);
        assert_eq!(clamp_offset(25, 10), 10);
    }

    #[test]
    fn test_explicit_options_win() {
        let opts = RunOptions::resolve(
            Some(PathBuf::from("out.xlsx")),
            Some(PathBuf::from("imgs")),
            Some(3),
        );
        assert_eq!(opts.output, PathBuf::from("out.xlsx"));
        assert_eq!(opts.image_root, PathBuf::from("imgs"));
        assert_eq!(opts.start_offset, 3);
        assert_eq!(opts.save_every, DEFAULT_SAVE_EVERY);
    }

    #[test]
    fn test_endpoint_urls() {
        let ep = Endpoints::with_base("http://127.0.0.1:9000/");
        assert_eq!(ep.search_url, "http://127.0.0.1:9000/search");
        assert_eq!(ep.object_api_url(7), "http://127.0.0.1:9000/objects/7");
        assert_eq!(ep.object_page_url(7), "http://127.0.0.1:9000/art/7");

        let met = Endpoints::default();
        assert_eq!(
            met.object_page_url(22506),
            "https://www.metmuseum.org/art/collection/search/22506"
        );
    }

    #[test]
    fn test_search_params_order() {
        let params = SearchQuery::default().params();
        assert_eq!(params[0], ("hasImages", "true".to_string()));
        assert_eq!(params[1], ("departmentId", "4".to_string()));
        assert_eq!(params[2], ("q", "sword".to_string()));
    }

    #[test]
    fn test_panel_noise_includes_tab_labels() {
        let config = ScrapeConfig::default();
        let noise = config.panel_noise();
        assert!(noise.contains(&"Object Information"));
        assert!(noise.contains(&"Signatures, Inscriptions, and Markings"));
        assert_eq!(noise.len(), 6);
    }
}
