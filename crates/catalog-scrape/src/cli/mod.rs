//! CLI subcommand implementations for the catalog-scrape binary.

pub mod doctor;
pub mod run_cmd;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level follows `--verbose` and
/// `--quiet`. Logs go to stderr so `--json` output on stdout stays clean.
pub fn init_tracing(verbose: bool, quiet: bool, json: bool) {
    let default = if verbose {
        "catalog_scrape=debug"
    } else if quiet {
        "catalog_scrape=warn"
    } else {
        "catalog_scrape=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}
