//! pcc-harness - drive a PCC-managed fleet and verify it converges.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pcc_client::PccClient;
use pcc_harness::config::HarnessConfig;
use pcc_harness::stats::{DockerCli, StatsCollector};
use pcc_harness::{Harness, Phase};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "pcc-harness", version, about)]
struct Cli {
    /// Harness configuration file.
    #[arg(short, long, env = "PCC_HARNESS_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Phases to run (repeatable). Defaults to all of them.
    #[arg(long = "phase", value_enum)]
    phases: Vec<Phase>,

    /// Run identifier, used in generated resource names.
    #[arg(long)]
    identifier: Option<String>,

    /// Log filter when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,

    /// Disable container stats collection.
    #[arg(long)]
    no_stats: bool,
}

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let (json, plain) = if cli.log_json {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = HarnessConfig::load(&cli.config)?;
    let gateway = config.gateway_config()?;
    info!(
        base_url = %gateway.base_url,
        invaders = config.invaders.len(),
        servers = config.servers.len(),
        dry_run = config.dry_run,
        "Configuration loaded"
    );

    let client = PccClient::connect(&gateway).context("Failed to create PCC client")?;
    let identifier = cli
        .identifier
        .unwrap_or_else(|| chrono::Local::now().format("%Y%m%d%H%M%S").to_string());

    let stats_config = config.docker_stats.clone();
    let mut harness = Harness::new(client, config, identifier);
    if stats_config.enabled && !cli.no_stats {
        let stats = StatsCollector::spawn(
            DockerCli,
            stats_config.output_file(),
            stats_config.period(),
        )
        .await
        .context("Failed to start stats collector")?;
        harness = harness.with_stats(stats);
    }

    harness.run(&cli.phases).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!("Starting pcc-harness");
    if let Err(e) = run(cli).await {
        error!(error = %format!("{e:#}"), "Harness failed");
        std::process::exit(1);
    }

    info!("All phases passed");
    Ok(())
}
