// Copyright 2026 Catalog Scrape Contributors
// SPDX-License-Identifier: Apache-2.0

//! Catalog Scrape: harvest a museum collection into a spreadsheet.
//!
//! The search endpoint yields object IDs; for each one the JSON API, the
//! rendered object page and the raw page HTML are reconciled into a single
//! record, the primary image is downloaded, and a row with an embedded
//! thumbnail is appended to an XLSX workbook that is checkpointed as the run
//! progresses.

pub mod acquisition;
pub mod assets;
pub mod cli;
pub mod config;
pub mod error;
pub mod harvest;
pub mod model;
pub mod progress;
pub mod reconcile;
pub mod renderer;
pub mod sink;

pub use config::{RunOptions, ScrapeConfig};
pub use error::{FetchError, HarvestError, SinkError};
pub use harvest::{Harvester, RunPhase, RunSummary};
pub use model::{ApiRecord, CatalogField, CellValue, ObjectId, PageData, Record};
pub use renderer::PageInspector;
