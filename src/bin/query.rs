//! Timefind Query
//!
//! Lists the data files of a data source that hold records in a time range.

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use timefind::logging::{self, LogFormat};
use timefind::{parse_timestamp, Configuration, Index, ProcessorRegistry};

#[derive(Parser)]
#[command(name = "timefind")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find data files covering a time range")]
struct Cli {
    /// Data source name or alias, looked up among the discovered configurations
    #[arg(short, long, required_unless_present = "config")]
    source: Option<String>,

    /// Path to the data source configuration
    #[arg(short, long, conflicts_with = "source")]
    config: Option<PathBuf>,

    /// Start of the range (RFC 3339, "YYYY-MM-DD HH:MM:SS", "YYYY-MM-DD" or Unix seconds)
    #[arg(long)]
    start: String,

    /// End of the range (default: now)
    #[arg(long)]
    end: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Verbose progress messages
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One path per line
    Text,
    /// JSON array of records
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, LogFormat::Pretty);

    let start = parse_time(&cli.start)?;
    let end = match &cli.end {
        Some(end) => parse_time(end)?,
        None => Utc::now(),
    };
    if start > end {
        bail!("start {} is after end {}", start.to_rfc3339(), end.to_rfc3339());
    }

    let config = match (&cli.config, &cli.source) {
        (Some(path), _) => Configuration::load(path)?,
        (None, Some(source)) => find_source(source)?,
        (None, None) => bail!("either --source or --config is required"),
    };

    let registry = ProcessorRegistry::with_builtins()?;
    let index = Index::open(Arc::new(config), &registry)?;

    let records = index
        .find_logs(&start, &end)
        .with_context(|| format!("querying {:?}", index.location()))?;

    tracing::debug!("{} files between {} and {}", records.len(), start, end);

    match cli.format {
        OutputFormat::Text => {
            for record in &records {
                println!("{}", record.path);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}

fn parse_time(text: &str) -> anyhow::Result<DateTime<Utc>> {
    parse_timestamp(text).ok_or_else(|| anyhow!("unrecognized time: {:?}", text))
}

/// Load the discovered configuration answering to `source`
fn find_source(source: &str) -> anyhow::Result<Configuration> {
    for path in Configuration::discover(&Configuration::default_dirs()) {
        match Configuration::load(&path) {
            Ok(config) if config.answers_to(source) => return Ok(config),
            Ok(_) => {}
            Err(e) => tracing::warn!("{}", e),
        }
    }
    bail!("no configuration found for data source {:?}", source)
}
