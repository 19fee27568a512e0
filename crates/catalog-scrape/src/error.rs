//! Error types for the harvest pipeline.
//!
//! `FetchError` covers every boundary call (HTTP, browser, filesystem) and is
//! collapsed to a default at the call site. `HarvestError` is reserved for the
//! few failures that end a run.

use std::path::PathBuf;

/// Failure of a single boundary call.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("browser: {0}")]
    Browser(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Shorthand for browser-side failures reported as strings by the driver.
    pub fn browser(message: impl std::fmt::Display) -> Self {
        Self::Browser(message.to_string())
    }
}

/// Failure while writing or persisting the workbook.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("spreadsheet: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("image: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures that abort a harvest run.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("object ID enumeration failed: {0}")]
    Enumeration(#[source] FetchError),

    #[error("failed to save workbook to {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: SinkError,
    },

    #[error("failed to write row: {0}")]
    Sink(#[source] SinkError),
}

pub type FetchResult<T> = Result<T, FetchError>;
