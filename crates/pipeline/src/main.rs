//! `reserve-market` command line tool.
//!
//! Runs the full pipeline over a directory of portal CSV exports and writes
//! the priced minute table as CSV.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use reserve_core::{PipelineConfig, ReserveType};
use reserve_ingestion::CsvSource;
use reserve_pipeline::{write_csv, ReservePipeline, RunSummary};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reserve-market")]
#[command(about = "Approximate 1-minute reserve calls and their marginal work prices", long_about = None)]
struct Cli {
    /// Directory holding needs.csv, calls_<source>_<type>.csv and auctions_<type>.csv
    #[arg(short = 'd', long)]
    source_dir: PathBuf,

    /// First day (YYYY-MM-DD)
    #[arg(short, long)]
    start: NaiveDate,

    /// Last day, inclusive (YYYY-MM-DD)
    #[arg(short, long)]
    end: NaiveDate,

    /// Transmission operator, e.g. 50hertz, amprion, tennet, transnetbw
    #[arg(long, default_value = "netzregelverbund")]
    source_id: String,

    /// Reserve type (SRL or MRL)
    #[arg(short, long, default_value = "SRL")]
    reserve_type: ReserveType,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output CSV path; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Field separator of the exports
    #[arg(long, default_value_t = ';')]
    delimiter: char,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let delimiter = u8::try_from(cli.delimiter).context("Delimiter must be a single-byte character")?;
    let source = CsvSource::new(cli.source_dir.clone()).with_delimiter(delimiter);
    let pipeline = ReservePipeline::new(source, config).context("Invalid configuration")?;
    let minutes = pipeline
        .run(cli.start, cli.end, &cli.source_id, cli.reserve_type)
        .with_context(|| format!("Pipeline run {}..={} failed", cli.start, cli.end))?;

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(&minutes, BufWriter::new(file))?;
        }
        None => write_csv(&minutes, io::stdout().lock())?,
    }

    let summary = RunSummary::from_minutes(&minutes);
    summary.log();
    if let Some(path) = &cli.summary {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write summary {}", path.display()))?;
    }

    Ok(())
}
