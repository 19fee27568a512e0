//! Environment readiness check.

use crate::config::{RunOptions, ScrapeConfig, ENV_IMAGE_ROOT, ENV_OUTPUT, ENV_START_OFFSET};
use crate::renderer::chromium::{find_chromium, ENV_CHROMIUM_PATH};
use anyhow::Result;
use serde_json::json;
use std::path::Path;

/// Report Chromium availability and the resolved run settings.
pub async fn run(json: bool) -> Result<()> {
    let options = RunOptions::resolve(None, None, None);
    let config = ScrapeConfig::default();
    let chromium = find_chromium();
    let output_dir_ok = parent_exists(&options.output);

    if json {
        let report = json!({
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "output": options.output.display().to_string(),
            "output_dir_exists": output_dir_ok,
            "image_root": options.image_root.display().to_string(),
            "start_offset": options.start_offset,
            "search_url": config.endpoints.search_url,
            "mode": if chromium.is_some() { "browser" } else { "http-only" },
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Catalog Scrape Doctor");
    println!("=====================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome or set {ENV_CHROMIUM_PATH}; \
             runs will be HTTP-only and page panels will be empty."
        ),
    }

    if output_dir_ok {
        println!("[OK] Output:      {} ({ENV_OUTPUT})", options.output.display());
    } else {
        println!(
            "[!!] Output directory does not exist: {} ({ENV_OUTPUT})",
            options.output.display()
        );
    }
    println!(
        "[OK] Image root:  {} ({ENV_IMAGE_ROOT})",
        options.image_root.display()
    );
    println!(
        "[OK] Offset:      {} ({ENV_START_OFFSET})",
        options.start_offset
    );
    println!("     Search:      {}", config.endpoints.search_url);

    println!();
    if chromium.is_some() && output_dir_ok {
        println!("Status: READY");
    } else if output_dir_ok {
        println!("Status: READY (HTTP-only)");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}

fn parent_exists(path: &Path) -> bool {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.is_dir(),
        _ => true,
    }
}
