use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pcc_client::models::{
    CephClusterConfig, CephNode, CreateCephClusterRequest, CreateCephFsRequest,
    CreateCephPoolRequest,
};
use pcc_client::{ApiError, PccClient};
use pcc_converge::{EventLogVerifier, PollClock, PollSchedule, Tick, DEFAULT_TICK};
use pcc_id::{ClusterId, FsId, NodeId, PoolId};
use tracing::{debug, info, warn};

use super::{
    all_pools, generated_cluster_name, CephOperation, PoolGroup, DATA_POOL_1, DATA_POOL_2,
    DEFAULT_POOL, FS_NAME, METADATA_POOL,
};
use crate::config::CephConfiguration;
use crate::error::HarnessError;
use crate::events::NotificationFeed;

const POOL_TYPE: &str = "replicated";
const POOL_SIZE: u64 = 3;

/// Drives one Ceph cluster through create and delete steps.
///
/// Every mutation is followed by a wait for its terminal notification;
/// creates additionally resolve the new object's ID by name.
pub struct CephLifecycle<'a> {
    client: &'a PccClient,
    config: CephConfiguration,
    servers: Vec<NodeId>,
    settle: PollSchedule,
    event_tick: Duration,
    pools: BTreeMap<String, PoolId>,
    fs: FsId,
}

impl<'a> CephLifecycle<'a> {
    /// `servers` are the candidate cluster nodes, in configuration order.
    pub fn new(client: &'a PccClient, config: CephConfiguration, servers: Vec<NodeId>) -> Self {
        Self {
            client,
            config,
            servers,
            settle: PollSchedule::new(Duration::from_secs(60), DEFAULT_TICK),
            event_tick: DEFAULT_TICK,
            pools: BTreeMap::new(),
            fs: FsId::UNASSIGNED,
        }
    }

    /// Schedule of the name lookup following a create call.
    pub fn with_settle(mut self, settle: PollSchedule) -> Self {
        self.settle = settle;
        self
    }

    /// Interval between two notification fetches.
    pub fn with_event_tick(mut self, tick: Duration) -> Self {
        self.event_tick = tick;
        self
    }

    pub fn cluster_name(&self) -> &str {
        &self.config.cluster_name
    }

    pub fn cluster_id(&self) -> ClusterId {
        self.config.cluster_id
    }

    pub fn pool_id(&self, name: &str) -> Option<PoolId> {
        self.pools.get(name).copied()
    }

    pub fn fs_id(&self) -> FsId {
        self.fs
    }

    /// Resolve a configured cluster, or pick a fresh name for one to create.
    pub async fn validate(&mut self, identifier: &str) -> Result<(), HarnessError> {
        if self.config.cluster_name.is_empty() {
            self.config.cluster_name = generated_cluster_name(identifier);
            info!(cluster = %self.config.cluster_name, "Using generated cluster name");
            return Ok(());
        }

        let cluster = self.client.find_ceph_cluster(&self.config.cluster_name).await?;
        self.config.cluster_id = cluster.id;
        info!(cluster = %cluster.name, cluster_id = %cluster.id, "Using existing cluster");
        Ok(())
    }

    /// Run the enabled steps in create-then-delete order.
    pub async fn run(&mut self) -> Result<(), HarnessError> {
        let tests = self.config.tests;

        if tests.create_cluster {
            self.create_cluster().await?;
        }
        if tests.create_pools {
            self.create_pools().await?;
        }
        if tests.create_fs {
            self.create_fs().await?;
        }
        if tests.delete_fs {
            self.delete_fs().await?;
        }
        if tests.delete_pools {
            self.delete_pools().await?;
        }
        if tests.delete_cluster {
            self.delete_cluster().await?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Cluster
    // -------------------------------------------------------------------------

    pub fn cluster_request(&self) -> CreateCephClusterRequest {
        let count = match self.config.number_of_nodes {
            0 => self.servers.len(),
            n => n.min(self.servers.len()),
        };

        CreateCephClusterRequest {
            name: self.config.cluster_name.clone(),
            nodes: self.servers[..count]
                .iter()
                .map(|&id| CephNode { id })
                .collect(),
            version: self.config.version.clone(),
            tags: Vec::new(),
            igw_policy: self.config.igw_policy.clone(),
            control_cidr: self.config.control_cidr.clone(),
            config: CephClusterConfig {
                cluster_network: self.config.cluster_network.clone(),
                public_network: self.config.public_network.clone(),
            },
        }
    }

    pub async fn create_cluster(&mut self) -> Result<ClusterId, HarnessError> {
        let request = self.cluster_request();
        if request.nodes.is_empty() {
            return Err(HarnessError::Config(
                "no servers available for the ceph cluster".to_string(),
            ));
        }

        let started = Utc::now();
        info!(
            cluster = %request.name,
            nodes = request.nodes.len(),
            "Creating ceph cluster"
        );
        self.client.create_ceph_cluster(&request).await?;

        let client = self.client;
        let name = request.name.as_str();
        let cluster = settle(self.settle, "ceph cluster", name, || {
            client.find_ceph_cluster(name)
        })
        .await?;
        self.config.cluster_id = cluster.id;

        self.verify(CephOperation::InstallCluster, started).await?;
        Ok(cluster.id)
    }

    pub async fn delete_cluster(&mut self) -> Result<(), HarnessError> {
        let id = self.resolve_cluster().await?;

        let started = Utc::now();
        info!(cluster = %self.config.cluster_name, cluster_id = %id, "Deleting ceph cluster");
        self.client.delete_ceph_cluster(id).await?;
        self.verify(CephOperation::UninstallCluster, started).await?;

        self.config.cluster_id = ClusterId::UNASSIGNED;
        Ok(())
    }

    async fn resolve_cluster(&mut self) -> Result<ClusterId, HarnessError> {
        if self.config.cluster_id.is_unassigned() {
            let cluster = self.client.find_ceph_cluster(&self.config.cluster_name).await?;
            self.config.cluster_id = cluster.id;
        }
        Ok(self.config.cluster_id)
    }

    // -------------------------------------------------------------------------
    // Pools
    // -------------------------------------------------------------------------

    pub async fn create_pools(&mut self) -> Result<(), HarnessError> {
        for group in PoolGroup::ALL {
            debug!(group = group.label(), "Creating pool group");
            for name in group.pools() {
                self.create_pool(name).await?;
            }
        }
        Ok(())
    }

    pub async fn create_pool(&mut self, name: &str) -> Result<PoolId, HarnessError> {
        let cluster = self.resolve_cluster().await?;
        let request = CreateCephPoolRequest {
            name: name.to_string(),
            pool_type: POOL_TYPE.to_string(),
            size: POOL_SIZE,
            ceph_cluster_id: cluster,
            ..Default::default()
        };

        let started = Utc::now();
        info!(pool = name, cluster_id = %cluster, "Creating ceph pool");
        self.client.create_ceph_pool(&request).await?;

        let client = self.client;
        let pool = settle(self.settle, "ceph pool", name, || {
            client.find_ceph_pool(cluster, name)
        })
        .await?;
        self.pools.insert(name.to_string(), pool.id);

        self.verify(CephOperation::CreatePool(name.to_string()), started)
            .await?;
        Ok(pool.id)
    }

    /// Delete every managed pool that exists; missing ones are skipped.
    pub async fn delete_pools(&mut self) -> Result<(), HarnessError> {
        let cluster = self.resolve_cluster().await?;

        for name in all_pools() {
            let pool = match self.client.find_ceph_pool(cluster, name).await {
                Ok(pool) => pool,
                Err(e) if e.is_not_found() => {
                    warn!(pool = name, "Pool not found, skipping delete");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let started = Utc::now();
            info!(pool = name, pool_id = %pool.id, "Deleting ceph pool");
            self.client.delete_ceph_pool(pool.id).await?;
            self.verify(CephOperation::DeletePool(name.to_string()), started)
                .await?;
            self.pools.remove(name);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Filesystem
    // -------------------------------------------------------------------------

    pub async fn create_fs(&mut self) -> Result<FsId, HarnessError> {
        let cluster = self.resolve_cluster().await?;

        let client = self.client;
        let request = CreateCephFsRequest {
            name: FS_NAME.to_string(),
            tags: Vec::new(),
            ceph_cluster_id: cluster,
            metadata_pool: Some(client.find_ceph_pool(cluster, METADATA_POOL).await?),
            default_pool: Some(client.find_ceph_pool(cluster, DEFAULT_POOL).await?),
            data_pools: vec![
                client.find_ceph_pool(cluster, DATA_POOL_1).await?,
                client.find_ceph_pool(cluster, DATA_POOL_2).await?,
            ],
            max_mds: None,
        };

        let started = Utc::now();
        info!(fs = FS_NAME, cluster_id = %cluster, "Creating ceph fs");
        client.create_ceph_fs(&request).await?;

        let fs = settle(self.settle, "ceph fs", FS_NAME, || {
            client.find_ceph_fs(cluster, FS_NAME)
        })
        .await?;
        self.fs = fs.id;

        self.verify(CephOperation::CreateFs(FS_NAME.to_string()), started)
            .await?;
        Ok(fs.id)
    }

    pub async fn delete_fs(&mut self) -> Result<(), HarnessError> {
        let cluster = self.resolve_cluster().await?;
        let fs = self.client.find_ceph_fs(cluster, FS_NAME).await?;

        let started = Utc::now();
        info!(fs = FS_NAME, fs_id = %fs.id, "Deleting ceph fs");
        self.client.delete_ceph_fs(fs.id).await?;
        self.verify(CephOperation::DeleteFs(FS_NAME.to_string()), started)
            .await?;

        self.fs = FsId::UNASSIGNED;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Verification
    // -------------------------------------------------------------------------

    /// Wait for the operation's terminal notification emitted after `since`.
    pub async fn verify(
        &self,
        operation: CephOperation,
        since: DateTime<Utc>,
    ) -> Result<String, HarnessError> {
        let feed = NotificationFeed::new(self.client);
        let expectations = operation.expectations(&self.config.cluster_name);

        let verdict = EventLogVerifier::new(&feed, since)
            .with_tick(self.event_tick)
            .await_outcome(&operation.to_string(), &expectations, operation.timeout())
            .await?;

        Ok(verdict.into_result()?)
    }
}

/// Look an object up by name until it appears or the schedule expires.
///
/// The first lookup happens one tick after the create call.
async fn settle<T, F, Fut>(
    schedule: PollSchedule,
    kind: &'static str,
    name: &str,
    mut lookup: F,
) -> Result<T, HarnessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut clock = PollClock::start(schedule);
    loop {
        match clock.next().await {
            Tick::Evaluate => match lookup().await {
                Ok(found) => return Ok(found),
                Err(e) if e.is_not_found() => {
                    debug!(kind, name, "Not visible yet");
                }
                Err(e) => return Err(e.into()),
            },
            Tick::Expired => {
                warn!(kind, name, elapsed = ?clock.elapsed(), "Created object never appeared");
                return Err(HarnessError::NotCreated {
                    kind,
                    name: name.to_string(),
                });
            }
        }
    }
}
