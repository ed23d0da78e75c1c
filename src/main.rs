//! Timefind Indexer
//!
//! Brings the index of every configured data source up to date:
//! load configuration → open index → update → write out.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use timefind::logging::{self, LogFormat};
use timefind::{Configuration, Index, ProcessorRegistry};

#[derive(Parser)]
#[command(name = "timefind-indexer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Index time-stamped data files by the time range they cover")]
struct Cli {
    /// Path to a data source configuration (can be used multiple times).
    /// Defaults to every configuration in $TIMEFIND_CONFIG_DIR,
    /// ~/.config/timefind and /etc/timefind
    #[arg(short, long = "config", value_name = "PATH")]
    configs: Vec<PathBuf>,

    /// Verbose progress messages
    #[arg(short, long)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    tracing::info!("timefind-indexer v{}", env!("CARGO_PKG_VERSION"));

    let configs = if cli.configs.is_empty() {
        Configuration::discover(&Configuration::default_dirs())
    } else {
        cli.configs
    };

    if configs.is_empty() {
        bail!("no configuration (-c/--config) found");
    }

    let registry = ProcessorRegistry::with_builtins().context("building processor registry")?;
    tracing::debug!("Registered processors: {:?}", registry.types());

    let mut failed = 0usize;
    for path in &configs {
        if let Err(e) = index_source(path, &registry) {
            tracing::error!("{:#}", e);
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} data sources failed", failed, configs.len());
    }

    Ok(())
}

/// Update and persist the index of one data source
fn index_source(path: &Path, registry: &ProcessorRegistry) -> anyhow::Result<()> {
    let config = Configuration::load(path)?;
    let name = config.name.clone();
    tracing::info!("Indexing data source {} ({:?})", name, path);

    let mut index = Index::open(Arc::new(config), registry)
        .with_context(|| format!("{}: opening index", name))?;

    index
        .update()
        .with_context(|| format!("{}: updating index", name))?;

    index
        .write_out()
        .with_context(|| format!("{}: writing index to {:?}", name, index.location()))?;

    tracing::info!("{}: {}", name, index.stats());
    Ok(())
}
