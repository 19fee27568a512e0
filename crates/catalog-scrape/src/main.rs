// Copyright 2026 Catalog Scrape Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use catalog_scrape::cli;
use catalog_scrape::cli::run_cmd::RunArgs;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(
    name = "catalog-scrape",
    about = "Harvest a museum collection into a spreadsheet with thumbnails",
    version,
    after_help = "Run 'catalog-scrape <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search, scrape every object and write the workbook
    Run(RunArgs),
    /// Check environment and show resolved settings
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_tracing(cli.verbose, cli.quiet, cli.json);

    let result = match cli.command {
        Commands::Run(args) => cli::run_cmd::run(args, cli.json, cli.quiet).await,
        Commands::Doctor => cli::doctor::run(cli.json).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "catalog-scrape", &mut std::io::stdout());
            Ok(())
        }
    };

    // 0=success, 1=error
    if let Err(e) = &result {
        if cli.json {
            println!(
                "{}",
                serde_json::json!({ "error": true, "message": format!("{e:#}") })
            );
        } else if !cli.quiet {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
