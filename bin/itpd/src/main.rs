//! ---
//! itp_section: "01-core-functionality"
//! itp_subsection: "binary"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Binary entrypoint for the ITP monitor daemon."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use itp_common::{init_tracing, AppConfig, StoreBackend};
use itp_core::{ItpMonitor, ServiceContext};
use itp_metrics::{spawn_http_server, DaemonMetrics};
use tokio::signal;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    author,
    version = concat!("ITP monitor ", env!("CARGO_PKG_VERSION")),
    about = "Thermal substation telemetry generator and consumption analyzer",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", global = true, help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the daemon until Ctrl-C")]
    Run {
        #[arg(long, help = "Start the telemetry generator regardless of configuration")]
        generate: bool,
    },
    #[command(about = "Analyze consumption for one building and print the report")]
    Analyze {
        #[arg(long, value_name = "UUID")]
        building: Uuid,
        #[arg(long, value_name = "N", help = "Window length in days [default: from config]")]
        days: Option<u32>,
        #[arg(long, value_name = "DIR", help = "Also export the report into this directory")]
        output: Option<PathBuf>,
    },
    #[command(about = "Create the demo buildings when the store is empty")]
    Seed,
    #[command(about = "Write synthetic history for every building")]
    Backfill {
        #[arg(long, value_name = "N", help = "Days of history [default: from config]")]
        days: Option<u32>,
    },
    #[command(about = "Show per-kind record counts for one building")]
    Inspect {
        #[arg(long, value_name = "UUID")]
        building: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/itpd.toml"));
    candidates.push(PathBuf::from("configs/example.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    init_tracing("itpd", &config.logging)?;
    match &loaded.source {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using defaults"),
    }

    let command = cli.command.unwrap_or(Commands::Run { generate: false });
    if !matches!(command, Commands::Run { .. }) && config.store.backend == StoreBackend::Memory {
        warn!("memory store selected; this command only sees data created in this process");
    }

    let monitor = ItpMonitor::new(ServiceContext::from_config(config)?)?;
    match command {
        Commands::Run { generate } => run_daemon(&monitor, generate).await?,
        Commands::Analyze {
            building,
            days,
            output,
        } => {
            let days = days.unwrap_or(monitor.context().config().analyzer.default_window_days);
            let analysis = monitor
                .analyze(building, days)
                .await
                .with_context(|| format!("analysis of building {building} failed"))?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            if let Some(dir) = output {
                let path = analysis.exporter().export(&dir)?;
                info!(path = %path.display(), "analysis report exported");
            }
        }
        Commands::Seed => {
            let created = monitor.seed_demo_buildings().await?;
            println!("Created {created} demo buildings");
        }
        Commands::Backfill { days } => {
            let days = days.unwrap_or(monitor.context().config().seed.history_days);
            let summary = monitor.backfill(days).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Inspect { building } => {
            let store = monitor.context().store();
            let record = store
                .find_building(building)
                .await?
                .with_context(|| format!("building {building} not found"))?;
            let counts = monitor.record_counts(building).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "building": record,
                    "records": counts,
                }))?
            );
        }
    }

    Ok(())
}

async fn run_daemon(monitor: &ItpMonitor, generate: bool) -> Result<()> {
    let context = monitor.context();
    let config = context.config();
    let registry = context.registry();
    let daemon_metrics = DaemonMetrics::new(&registry)?;
    daemon_metrics.inc_start();
    let profile = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };
    daemon_metrics.set_build_info(env!("CARGO_PKG_VERSION"), profile);

    let metrics_server = if config.metrics.enabled {
        let server = spawn_http_server(registry, config.metrics.listen)?;
        info!(address = %server.addr(), "metrics exporter enabled");
        Some(server)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    monitor.fill_initial_data().await;
    if generate || config.generator.start_on_boot {
        monitor.start_generator();
    } else {
        info!("telemetry generator not started; pass --generate or set generator.start_on_boot");
    }

    info!("daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    monitor.stop_generator().await;

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    Ok(())
}
