#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the ward air quality mapper.
//!
//! `map` runs a single refresh cycle and writes the region table as JSON,
//! `watch` keeps refreshing on the deployment's interval until Ctrl+C,
//! and `deployments` lists the registered deployments.

use std::path::{Path, PathBuf};
use std::time::Duration;

use aqi_map_mapper::{
    AqiRefresher, BoundarySource, ConfigError, DeploymentConfig, PublishedTable, RegionMapper,
    StationSource, TableSnapshot, registry,
};
use aqi_map_region_models::TableSummary;
use clap::{Args, Parser, Subcommand};

/// Map live air quality readings onto ward boundaries.
#[derive(Parser)]
#[command(name = "aqi_map")]
#[command(about = "Map live air quality readings onto ward boundaries")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run one refresh cycle and write the region table.
    Map {
        #[command(flatten)]
        deployment: DeploymentArgs,

        /// Write JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Refresh on an interval until interrupted.
    Watch {
        #[command(flatten)]
        deployment: DeploymentArgs,

        /// Override the deployment's refresh interval.
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Rewrite this JSON file after every successful cycle.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List registered deployments.
    Deployments,
}

/// Selects and adjusts the deployment to run.
#[derive(Args)]
struct DeploymentArgs {
    /// Registered deployment id.
    #[arg(long, default_value = "riverside")]
    deployment: String,

    /// Load a deployment TOML file instead of a registered deployment.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read boundaries from this `GeoJSON` file.
    #[arg(long)]
    boundaries: Option<PathBuf>,

    /// Read stations from this JSON file.
    #[arg(long)]
    stations: Option<PathBuf>,
}

impl DeploymentArgs {
    fn load(&self) -> Result<DeploymentConfig, ConfigError> {
        let mut deployment = match &self.config {
            Some(path) => DeploymentConfig::load(path)?,
            None => registry::find_deployment(&self.deployment)?,
        };
        if let Some(path) = &self.boundaries {
            deployment.boundaries = BoundarySource::File { path: path.clone() };
        }
        if let Some(path) = &self.stations {
            deployment.stations = StationSource::File { path: path.clone() };
        }
        Ok(deployment)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Map { deployment, output } => {
            let refresher = build_refresher(&deployment.load()?).await?;
            let published = refresher.refresh().await?;
            print_summary(&published.table.summary(), published.unresolved.len());
            write_table(&published, output.as_deref())?;
        }
        Commands::Watch {
            deployment,
            interval_secs,
            output,
        } => {
            let deployment = deployment.load()?;
            let interval =
                interval_secs.map_or_else(|| deployment.refresh_interval(), Duration::from_secs);
            let refresher = build_refresher(&deployment).await?;

            log::info!("Watching {} every {interval:?}", deployment.name);
            refresher
                .run(interval, shutdown_signal(), |snapshot| {
                    report_cycle(snapshot, output.as_deref());
                })
                .await;
        }
        Commands::Deployments => {
            for deployment in registry::all_deployments() {
                println!(
                    "{:<16} {} (every {}s)",
                    deployment.id, deployment.name, deployment.refresh_interval_secs
                );
            }
        }
    }

    Ok(())
}

async fn build_refresher(
    deployment: &DeploymentConfig,
) -> Result<AqiRefresher, Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let regions = deployment.load_boundaries(&client).await?;
    log::info!(
        "Loaded {} regions for deployment {}",
        regions.len(),
        deployment.id
    );

    Ok(AqiRefresher::new(
        RegionMapper::new(deployment.mapper.clone()),
        regions,
        deployment.station_feed(&client),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

fn report_cycle(snapshot: &TableSnapshot, output: Option<&Path>) {
    let Some(published) = &snapshot.published else {
        return;
    };
    if snapshot.is_stale {
        eprintln!(
            "Data may be outdated: serving table from {}",
            published.computed_at
        );
        return;
    }

    print_summary(&published.table.summary(), published.unresolved.len());
    if let Some(path) = output {
        if let Err(e) = write_table(published, Some(path)) {
            log::error!("Failed to write {}: {e}", path.display());
        }
    }
}

fn print_summary(summary: &TableSummary, unresolved: usize) {
    eprintln!(
        "{} regions: {} direct, {} estimated, {} retained, {unresolved} unresolved",
        summary.regions, summary.direct, summary.estimated, summary.retained
    );
    if let (Some(worst), Some(region)) = (summary.worst_aqi, &summary.worst_region) {
        eprintln!("Worst: {worst} in region {region}");
    }
}

fn write_table(
    published: &PublishedTable,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(published)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            log::info!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
