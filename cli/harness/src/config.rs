//! Harness configuration.
//!
//! Loaded from a JSON file describing the server, the fleet and the Ceph
//! layout to exercise. `PCC_URL` and `PCC_TOKEN` override the connection
//! settings from the file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use pcc_client::GatewayConfig;
use pcc_converge::PollSchedule;
use pcc_id::ClusterId;
use serde::Deserialize;

/// Default PCC API port.
const DEFAULT_PORT: u16 = 9999;

/// Default stats output file.
const DEFAULT_STATS_FILE: &str = "container-stats.txt";

/// Default seconds between two stats samples.
const DEFAULT_STATS_PERIOD: u16 = 30;

/// Top-level harness configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarnessConfig {
    /// PCC server address.
    #[serde(default)]
    pub pcc_ip: String,

    #[serde(default = "default_port")]
    pub pcc_port: u16,

    /// Full base URL; takes precedence over `pcc_ip`/`pcc_port`.
    #[serde(default)]
    pub pcc_url: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    /// Accept the server's self-signed certificate.
    #[serde(default = "default_true")]
    pub insecure_tls: bool,

    /// Skip every phase that mutates the fleet.
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub invaders: Vec<NodeSpec>,

    #[serde(default)]
    pub servers: Vec<NodeSpec>,

    #[serde(default)]
    pub docker_stats: DockerStatsConfig,

    #[serde(default)]
    pub ceph: CephConfiguration,

    #[serde(default)]
    pub reimage: ReimageConfig,

    #[serde(default)]
    pub timeouts: Timeouts,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

impl HarnessConfig {
    /// Load the config file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        let config = Self::from_json(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;

        Ok(config.with_overrides(
            std::env::var("PCC_URL").ok(),
            std::env::var("PCC_TOKEN").ok(),
        ))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.timeouts.validate().context("Invalid timeouts")?;
        Ok(config)
    }

    /// Replace the connection settings where an override is given.
    pub fn with_overrides(mut self, url: Option<String>, token: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            self.pcc_url = Some(url);
        }
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.token = Some(token);
        }
        self
    }

    /// Base URL of the PCC API.
    pub fn base_url(&self) -> Result<String> {
        if let Some(url) = &self.pcc_url {
            return Ok(url.clone());
        }
        if self.pcc_ip.is_empty() {
            anyhow::bail!("neither pccUrl nor pccIp is configured");
        }
        Ok(format!("https://{}:{}", self.pcc_ip, self.pcc_port))
    }

    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let mut gateway = GatewayConfig::new(self.base_url()?);
        gateway.token = self.token.clone();
        gateway.insecure_tls = self.insecure_tls;
        Ok(gateway)
    }

    /// Invaders first, then servers.
    pub fn all_nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.invaders.iter().chain(self.servers.iter())
    }
}

/// A node of the fleet as the test bed describes it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeSpec {
    pub host_ip: String,
    pub bmc_ip: String,
    pub bmc_user: String,
    pub bmc_users: Vec<String>,
    pub bmc_pass: String,
    /// SSH key registered with the key manager.
    pub key_id: String,
    /// SSH key aliases installed by a reimage.
    pub key_alias: Vec<String>,
    pub net_interfaces: Vec<NetInterfaceSpec>,
}

/// Desired configuration of one interface, located by MAC address.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetInterfaceSpec {
    pub mac_addr: String,
    pub cidrs: Vec<String>,
    pub gateway: String,
    pub managed_by_pcc: bool,
    pub autoneg: String,
    pub speed: Option<u64>,
    pub mtu: Option<u64>,
}

/// Container stats sampling.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DockerStatsConfig {
    pub enabled: bool,
    pub output_file: String,
    /// Seconds between samples; 0 selects the default.
    pub period: u16,
}

impl Default for DockerStatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_file: DEFAULT_STATS_FILE.to_string(),
            period: DEFAULT_STATS_PERIOD,
        }
    }
}

impl DockerStatsConfig {
    pub fn output_file(&self) -> &str {
        if self.output_file.is_empty() {
            DEFAULT_STATS_FILE
        } else {
            &self.output_file
        }
    }

    pub fn period(&self) -> Duration {
        let secs = if self.period == 0 {
            DEFAULT_STATS_PERIOD
        } else {
            self.period
        };
        Duration::from_secs(u64::from(secs))
    }
}

/// Which Ceph lifecycle steps to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CephTests {
    #[serde(rename = "createCluster")]
    pub create_cluster: bool,
    #[serde(rename = "createPools")]
    pub create_pools: bool,
    #[serde(rename = "createFS")]
    pub create_fs: bool,
    #[serde(rename = "deleteFS")]
    pub delete_fs: bool,
    #[serde(rename = "deletePools")]
    pub delete_pools: bool,
    #[serde(rename = "deleteCluster")]
    pub delete_cluster: bool,
}

/// Ceph cluster under test.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CephConfiguration {
    /// Existing cluster to reuse; a fresh name is generated when empty.
    pub cluster_name: String,
    pub cluster_id: ClusterId,
    /// Servers to install on; 0 means all configured servers.
    pub number_of_nodes: usize,
    pub public_network: String,
    pub cluster_network: String,
    pub igw_policy: String,
    #[serde(rename = "controlCIDR")]
    pub control_cidr: String,
    pub version: String,
    pub tests: CephTests,
}

/// Parameters of a MAAS reimage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReimageConfig {
    pub image: String,
    pub locale: String,
    pub timezone: String,
    pub admin_user: String,
}

impl Default for ReimageConfig {
    fn default() -> Self {
        Self {
            image: "centos76".to_string(),
            locale: "en-US".to_string(),
            timezone: "PDT".to_string(),
            admin_user: "admin".to_string(),
        }
    }
}

/// Poll loop bounds, in seconds. A 0 selects the default.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
    pub interface_ready_secs: u64,
    pub network_up_secs: u64,
    pub poll_interval_secs: u64,
    /// Delay before the first name lookup after a create call.
    pub settle_interval_secs: u64,
    pub settle_timeout_secs: u64,
}

const DEFAULT_WAIT_SECS: u64 = 300;
const DEFAULT_POLL_SECS: u64 = 5;
const DEFAULT_SETTLE_SECS: u64 = 60;

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            interface_ready_secs: DEFAULT_WAIT_SECS,
            network_up_secs: DEFAULT_WAIT_SECS,
            poll_interval_secs: DEFAULT_POLL_SECS,
            settle_interval_secs: DEFAULT_POLL_SECS,
            settle_timeout_secs: DEFAULT_SETTLE_SECS,
        }
    }
}

fn secs_or(value: u64, default: u64) -> Duration {
    Duration::from_secs(if value == 0 { default } else { value })
}

impl Timeouts {
    pub fn poll_interval(&self) -> Duration {
        secs_or(self.poll_interval_secs, DEFAULT_POLL_SECS)
    }

    pub fn interface_ready(&self) -> PollSchedule {
        PollSchedule::new(
            secs_or(self.interface_ready_secs, DEFAULT_WAIT_SECS),
            self.poll_interval(),
        )
    }

    pub fn network_up(&self) -> PollSchedule {
        PollSchedule::new(
            secs_or(self.network_up_secs, DEFAULT_WAIT_SECS),
            self.poll_interval(),
        )
    }

    pub fn settle(&self) -> PollSchedule {
        PollSchedule::new(
            secs_or(self.settle_timeout_secs, DEFAULT_SETTLE_SECS),
            secs_or(self.settle_interval_secs, DEFAULT_POLL_SECS),
        )
    }

    /// Every loop must get at least one evaluation before its deadline.
    pub fn validate(&self) -> Result<()> {
        for (name, schedule) in [
            ("interfaceReady", self.interface_ready()),
            ("networkUp", self.network_up()),
            ("settle", self.settle()),
        ] {
            if schedule.tick >= schedule.timeout {
                anyhow::bail!(
                    "timeouts.{name}: interval {:?} must be shorter than timeout {:?}",
                    schedule.tick,
                    schedule.timeout
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "pccIp": "172.17.2.238",
        "token": "from-file",
        "servers": [
            {
                "hostIp": "172.17.2.60",
                "bmcIp": "172.17.3.60",
                "bmcUser": "ADMIN",
                "bmcUsers": ["ADMIN"],
                "bmcPass": "ADMIN",
                "keyAlias": ["pcc"],
                "netInterfaces": [
                    {"macAddr": "3c:fd:fe:b5:a0:10", "cidrs": ["10.0.10.60/24"], "managedByPcc": true, "speed": 10000}
                ]
            }
        ],
        "ceph": {
            "numberOfNodes": 3,
            "highAvailability": true,
            "controlCIDR": "172.17.0.0/16",
            "tests": {"createCluster": true, "createFS": true}
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = HarnessConfig::from_json(SAMPLE).unwrap();

        assert_eq!(config.pcc_port, 9999);
        assert!(config.insecure_tls);
        assert!(config.invaders.is_empty());
        assert_eq!(config.servers[0].net_interfaces[0].speed, Some(10000));
        assert_eq!(config.ceph.control_cidr, "172.17.0.0/16");
        assert!(config.ceph.tests.create_cluster);
        assert!(config.ceph.tests.create_fs);
        assert!(!config.ceph.tests.delete_cluster);
        assert!(config.ceph.cluster_id.is_unassigned());
        assert_eq!(config.reimage.image, "centos76");
    }

    #[test]
    fn test_base_url() {
        let config = HarnessConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.base_url().unwrap(), "https://172.17.2.238:9999");

        let config = config.with_overrides(Some("http://localhost:8080".to_string()), None);
        assert_eq!(config.base_url().unwrap(), "http://localhost:8080");
        assert_eq!(config.token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_missing_address_is_rejected() {
        let config = HarnessConfig::from_json("{}").unwrap();
        assert!(config.base_url().is_err());
    }

    #[test]
    fn test_stats_defaults() {
        let stats = DockerStatsConfig {
            enabled: true,
            output_file: String::new(),
            period: 0,
        };
        assert_eq!(stats.output_file(), "container-stats.txt");
        assert_eq!(stats.period(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_schedules() {
        let timeouts = Timeouts::default();
        assert_eq!(
            timeouts.interface_ready(),
            PollSchedule::new(Duration::from_secs(300), Duration::from_secs(5))
        );
        assert_eq!(timeouts.settle().tick, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_poll_interval_uses_default() {
        let config = HarnessConfig::from_json(
            r#"{"pccIp":"1.2.3.4","timeouts":{"pollIntervalSecs":0,"settleIntervalSecs":0}}"#,
        )
        .unwrap();

        assert_eq!(config.timeouts.network_up().tick, Duration::from_secs(5));
        assert_eq!(config.timeouts.interface_ready().tick, Duration::from_secs(5));
        assert_eq!(config.timeouts.settle().tick, Duration::from_secs(5));
    }

    #[test]
    fn test_interval_not_shorter_than_timeout_is_rejected() {
        let err = HarnessConfig::from_json(
            r#"{"timeouts":{"settleIntervalSecs":60,"settleTimeoutSecs":60}}"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("timeouts.settle"));

        let err =
            HarnessConfig::from_json(r#"{"timeouts":{"pollIntervalSecs":400}}"#).unwrap_err();
        assert!(format!("{err:#}").contains("timeouts.interfaceReady"));
    }
}
