// Copyright 2026 Catalog Scrape Contributors
// SPDX-License-Identifier: Apache-2.0

//! `catalog-scrape run`: harvest the collection into a workbook.

use crate::config::{RunOptions, ScrapeConfig, DEFAULT_SAVE_EVERY};
use crate::harvest::{Harvester, RunSummary};
use crate::progress::{self, ProgressEventKind, ProgressReceiver};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{BrowserInspector, NoopRenderer, Renderer};
use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Output workbook [env: OUTPUT_XLSX] [default: met_swords_full.xlsx]
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    /// Image storage root [env: IMAGE_ROOT_DIR] [default: downloaded_images]
    #[arg(long)]
    pub image_root: Option<PathBuf>,
    /// Skip this many IDs from the start of the search result [env: START_OFFSET]
    #[arg(long)]
    pub offset: Option<usize>,
    /// Take at most this many IDs from the search result
    #[arg(long)]
    pub limit: Option<usize>,
    /// Save the workbook after every N objects
    #[arg(long, default_value_t = DEFAULT_SAVE_EVERY, value_parser = positive)]
    pub save_every: usize,
    /// Pause between objects, in milliseconds
    #[arg(long, default_value = "500")]
    pub delay_ms: u64,
    /// Search term
    #[arg(long)]
    pub query: Option<String>,
    /// Department ID to search in
    #[arg(long)]
    pub department: Option<u32>,
    /// Retries for transient HTTP failures (5xx, 429, transport)
    #[arg(long, default_value = "0")]
    pub retries: u32,
}

impl RunArgs {
    /// Scrape constants with this invocation's overrides applied.
    pub fn scrape_config(&self) -> ScrapeConfig {
        let mut config = ScrapeConfig::default();
        config.pacing = Duration::from_millis(self.delay_ms);
        config.http_retries = self.retries;
        if let Some(term) = &self.query {
            config.query.term = term.clone();
        }
        if let Some(department) = self.department {
            config.query.department_id = department;
        }
        config
    }

    /// Run options: flag, then environment, then default.
    pub fn run_options(&self) -> RunOptions {
        let mut options =
            RunOptions::resolve(self.output.clone(), self.image_root.clone(), self.offset);
        options.limit = self.limit;
        options.save_every = self.save_every;
        options
    }
}

fn positive(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("expected a positive integer, got '{raw}'")),
    }
}

/// Execute a harvest run.
pub async fn run(args: RunArgs, json: bool, quiet: bool) -> Result<()> {
    let config = args.scrape_config();
    let options = args.run_options();
    info!(
        "output {} | images {} | offset {}",
        options.output.display(),
        options.image_root.display(),
        options.start_offset
    );

    // The inspector owns the renderer; the harvester closes both when finalizing.
    let renderer: Arc<dyn Renderer> = match ChromiumRenderer::launch().await {
        Ok(renderer) => Arc::new(renderer),
        Err(e) => {
            warn!("{e}; continuing in HTTP-only mode");
            Arc::new(NoopRenderer)
        }
    };
    let inspector = BrowserInspector::open(renderer).await;

    let (tx, rx) = progress::channel();
    let show_progress = !json && !quiet && std::io::stderr().is_terminal();
    let bar = show_progress.then(|| tokio::spawn(drive_progress_bar(rx)));

    let mut harvester = Harvester::new(config, options).with_progress(tx);
    let result = harvester.run(Box::new(inspector)).await;
    drop(harvester);

    if let Some(task) = bar {
        let _ = task.await;
    }

    let summary = result.context("harvest failed")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !quiet {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("  Objects found:   {}", summary.total_ids);
    println!("  Started at:      {}", summary.start_offset);
    println!("  Rows written:    {}", summary.processed);
    println!("  Placeholders:    {}", summary.placeholders);
    for (source, count) in &summary.degraded {
        println!("  {source:<16} {count} degraded");
    }
    println!("  Checkpoints:     {}", summary.checkpoints);
    println!("  Saved to:        {}", summary.output.display());
}

fn make_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] {pos}/{len} objects ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Render progress events until the harvester drops its sender.
async fn drive_progress_bar(mut rx: ProgressReceiver) {
    let pb = make_progress_bar();
    loop {
        let event = match rx.recv().await {
            Ok(event) => event.event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };
        match event {
            ProgressEventKind::Enumerated { remaining, .. } => {
                pb.set_length(remaining as u64);
                pb.set_message("scraping");
            }
            ProgressEventKind::ObjectStarted {
                index,
                total,
                object_id,
            } => pb.set_message(format!("[{index}/{total}] {object_id}")),
            ProgressEventKind::ObjectFinished { processed, .. } => {
                pb.set_position(processed as u64)
            }
            ProgressEventKind::CheckpointSaved { rows } => {
                pb.println(format!("  checkpoint: {rows} rows saved"))
            }
            ProgressEventKind::Degraded { .. } => {}
            ProgressEventKind::RunComplete { processed, .. } => {
                pb.finish_with_message(format!("done: {processed} rows"));
                return;
            }
        }
    }
    pb.abandon();
}
