mod cli;

use std::{
    fs::{self, OpenOptions},
    path::Path,
    str::FromStr,
    sync::Mutex,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use salesmart::{connect, export, staging, Config, Pipeline, QualityReport, Report};
use serde::Serialize;
use tracing_subscriber::{
    prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_FILTER: &str = "error,salesmart=info,salesmart_store=info";
const VERBOSE_FILTER: &str = "error,salesmart=debug,salesmart_store=debug";
const LOG_FILE: &str = "salesmart.log";

/// Logs to stderr and appends the same events to `LOG_FILE` in `logs`.
fn init_tracing(cli: &Cli, logs: &Path) -> Result<()> {
    let env_filter = if cli.verbose {
        EnvFilter::from_str(VERBOSE_FILTER)?
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::from_str(DEFAULT_FILTER))?
    };

    fs::create_dir_all(logs).with_context(|| format!("failed to create {}", logs.display()))?;

    let path = logs.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(env_filter)
        .init();

    Ok(())
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.database_url.to_owned() {
        config.database.url = url;
    }

    init_tracing(&cli, &config.data_paths.logs)?;

    match cli.command {
        Commands::Setup => setup(config).await,
        Commands::Run { source } => {
            let pipeline = open(config).await?;
            print(&pipeline.run(source.as_deref()).await?)
        }
        Commands::Sync { source } => {
            let pipeline = open(config).await?;
            print(&pipeline.synchronize(source.as_deref()).await?)
        }
        Commands::Validate { source } => validate(&config, source.as_deref()),
        Commands::Export { dir } => {
            let dir = dir.unwrap_or_else(|| config.data_paths.warehouse.to_owned());
            let pipeline = open(config).await?;
            let report = export(pipeline.warehouse(), &dir).await?;
            print(&report)?;

            if !report.failed.is_empty() {
                bail!("{} tables could not be exported", report.failed.len());
            }

            Ok(())
        }
        Commands::Report => {
            let pipeline = open(config).await?;
            print(&Report::from_warehouse(pipeline.warehouse()).await?)
        }
    }
}

async fn open(config: Config) -> Result<Pipeline> {
    let warehouse = connect(&config.database.url, config.database.max_connections).await?;

    Ok(Pipeline::new(warehouse, config))
}

async fn setup(config: Config) -> Result<()> {
    let paths = &config.data_paths;
    for dir in [&paths.raw, &paths.processed, &paths.warehouse] {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        tracing::debug!(dir = %dir.display(), "data directory ready");
    }

    let pipeline = open(config).await?;
    print(&pipeline.warehouse().counts().await?)
}

fn validate(config: &Config, source: Option<&Path>) -> Result<()> {
    let source = match source {
        Some(source) => source.to_owned(),
        None => staging::find_csv(&config.data_paths.raw)?,
    };

    let rows = staging::read_csv(&source, &config.data_quality.required_columns)?;
    let report = QualityReport::check(&rows, &config.data_quality);
    print(&report)?;

    if !report.is_clean() {
        bail!("{} has data quality issues", source.display());
    }

    Ok(())
}
