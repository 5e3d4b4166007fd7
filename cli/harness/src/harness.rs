//! Phase orchestration.

use anyhow::{Context, Result};
use clap::ValueEnum;
use pcc_client::PccClient;
use pcc_id::NodeId;
use tracing::{info, warn};

use crate::ceph::CephLifecycle;
use crate::config::HarnessConfig;
use crate::inventory::Inventory;
use crate::network;
use crate::reimage;
use crate::stats::StatsHandle;

/// A top-level harness phase. Phases always run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Phase {
    /// Push MAAS info and reimage every server.
    Reimage,
    /// Configure interfaces and wait for them to come up.
    Network,
    /// Run the enabled Ceph lifecycle steps.
    Ceph,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Self::Reimage, Self::Network, Self::Ceph];

    /// Name recorded at stats phase boundaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reimage => "reimageAllBrownNodes",
            Self::Network => "configServerInterfaces",
            Self::Ceph => "ceph",
        }
    }
}

/// Sorted, de-duplicated phases; all of them when none are given.
pub fn plan(requested: &[Phase]) -> Vec<Phase> {
    if requested.is_empty() {
        return Phase::ALL.to_vec();
    }
    let mut phases = requested.to_vec();
    phases.sort();
    phases.dedup();
    phases
}

pub struct Harness {
    client: PccClient,
    config: HarnessConfig,
    identifier: String,
    stats: Option<StatsHandle>,
}

impl Harness {
    pub fn new(client: PccClient, config: HarnessConfig, identifier: impl Into<String>) -> Self {
        Self {
            client,
            config,
            identifier: identifier.into(),
            stats: None,
        }
    }

    /// Record phase boundaries through a running stats collector.
    pub fn with_stats(mut self, stats: StatsHandle) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Run `phases` in order, stopping at the first failure.
    ///
    /// The stats collector is stopped whether or not the phases succeed.
    pub async fn run(mut self, phases: &[Phase]) -> Result<()> {
        let result = self.run_phases(&plan(phases)).await;

        if let Some(stats) = self.stats.take() {
            if let Err(e) = stats.stop().await {
                warn!(error = %e, "Failed to stop stats collector");
            }
        }

        result
    }

    async fn run_phases(&self, phases: &[Phase]) -> Result<()> {
        let inventory = Inventory::discover(&self.client)
            .await
            .context("node discovery failed")?;

        for &phase in phases {
            if self.config.dry_run {
                info!(phase = phase.label(), "Dry run, skipping phase");
                continue;
            }

            self.enter(phase).await;
            info!(phase = phase.label(), "Starting phase");
            match phase {
                Phase::Reimage => self.reimage(&inventory).await,
                Phase::Network => self.network(&inventory).await,
                Phase::Ceph => self.ceph(&inventory).await,
            }
            .with_context(|| format!("phase {} failed", phase.label()))?;
            info!(phase = phase.label(), "Phase complete");
        }

        Ok(())
    }

    async fn enter(&self, phase: Phase) {
        if let Some(stats) = &self.stats {
            if let Err(e) = stats.change_phase(phase.label()).await {
                warn!(error = %e, phase = phase.label(), "Failed to record stats phase");
            }
        }
    }

    async fn reimage(&self, inventory: &Inventory) -> Result<()> {
        reimage::update_maas_info(&self.client, &self.config, inventory).await?;
        let deployed = reimage::reimage_all(&self.client, &self.config, inventory).await?;
        info!(nodes = deployed.len(), "Reimage requested");
        Ok(())
    }

    async fn network(&self, inventory: &Inventory) -> Result<()> {
        let timeouts = &self.config.timeouts;

        let index = network::configure_interfaces(&self.client, &self.config, inventory).await?;
        network::verify_interfaces(&self.client, &index, timeouts.interface_ready())
            .await
            .context("interfaces did not become ready")?;
        network::verify_network_up(&self.client, &index, timeouts.network_up())
            .await
            .context("network did not come up")?;
        Ok(())
    }

    async fn ceph(&self, inventory: &Inventory) -> Result<()> {
        let servers = self
            .config
            .servers
            .iter()
            .map(|server| inventory.node_id(&server.host_ip))
            .collect::<Result<Vec<NodeId>, _>>()?;

        let timeouts = &self.config.timeouts;
        let mut lifecycle = CephLifecycle::new(&self.client, self.config.ceph.clone(), servers)
            .with_settle(timeouts.settle())
            .with_event_tick(timeouts.poll_interval());

        lifecycle.validate(&self.identifier).await?;
        lifecycle.run().await?;
        Ok(())
    }
}
