// Copyright 2026 Catalog Scrape Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for harvest telemetry.
//!
//! The harvester emits `ProgressEvent`s as it works through the ID list.
//! They flow through a `tokio::sync::broadcast` channel to any subscriber
//! (the CLI progress bar, tests). With no subscriber, events are dropped.

use crate::model::ObjectId;
use serde::{Deserialize, Serialize};

/// A progress event emitted during a harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Monotonically increasing sequence number.
    pub seq: u64,
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// The search returned `total_ids`; work starts at `offset`.
    Enumerated {
        total_ids: usize,
        offset: usize,
        remaining: usize,
    },
    /// Object `index` (1-based, counted from the start of the full list)
    /// is being scraped.
    ObjectStarted {
        index: usize,
        total: usize,
        object_id: ObjectId,
    },
    /// A row was written for the object.
    ObjectFinished {
        processed: usize,
        total: usize,
        object_id: ObjectId,
        placeholder: bool,
    },
    /// A source failed and its data fell back to the empty default.
    Degraded {
        object_id: ObjectId,
        source: DataSource,
        message: String,
    },
    /// The workbook was written to disk with `rows` data rows.
    CheckpointSaved { rows: usize },
    /// The run finished and the final save succeeded.
    RunComplete { processed: usize, elapsed_ms: u64 },
}

/// A per-object data source that can degrade independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataSource {
    Api,
    Page,
    Description,
    Image,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api => write!(f, "API"),
            Self::Page => write!(f, "Page"),
            Self::Description => write!(f, "Description"),
            Self::Image => write!(f, "Image"),
        }
    }
}

pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a progress broadcast channel.
///
/// A slow subscriber may lag and miss events; the harvest never blocks on it.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, ignoring send errors (no receivers listening).
pub fn emit(tx: &Option<ProgressSender>, seq: &mut u64, event: ProgressEventKind) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(ProgressEvent { seq: *seq, event });
    }
}
