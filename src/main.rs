use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wics::harness::{HarnessOptions, run_harness};
use wics::pipeline::{BuildOptions, ValidateOptions, build_feed, validate_config};

#[derive(Parser, Debug)]
#[command(name = "wics", about = "Scrape events pages into an ICS calendar feed")]
struct Cli {
    /// Feed configuration file; built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured output path.
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch the configured pages and write the calendar file (the default).
    Build,
    /// Check that the configuration parses, including selectors and zone.
    Validate,
    /// Build twice and report whether event identifiers are stable.
    Harness {
        #[arg(long, default_value = "data/harness")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Build) {
        Commands::Build => {
            let report = build_feed(&BuildOptions {
                config_path: cli.config,
                out_path: cli.out,
            })?;

            info!(
                pages = report.pages_fetched,
                cards = report.cards_seen,
                skipped = report.cards_skipped,
                duplicates = report.duplicates,
                "build summary"
            );
            println!(
                "Wrote: {} ({} bytes, {} events)",
                report.output_path, report.bytes_written, report.events_written
            );
        }
        Commands::Validate => {
            let messages = validate_config(&ValidateOptions {
                config_path: cli.config,
            })?;
            for line in messages {
                println!("{line}");
            }
        }
        Commands::Harness { out_dir } => {
            let report = run_harness(&HarnessOptions {
                config_path: cli.config,
                out_dir,
            })?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}
