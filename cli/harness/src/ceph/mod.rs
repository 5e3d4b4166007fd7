//! Ceph storage lifecycle: cluster, pools and filesystem.

mod lifecycle;
mod operation;

pub use lifecycle::CephLifecycle;
pub use operation::CephOperation;

/// Prefix of generated cluster names.
pub const CLUSTER_NAME_PREFIX: &str = "cephtest";

/// Name of the filesystem created on the cephFS pools.
pub const FS_NAME: &str = "cephtest_fs";

pub const METADATA_POOL: &str = "metadataPool";
pub const DEFAULT_POOL: &str = "defaultPool";
pub const DATA_POOL_1: &str = "dataPool1";
pub const DATA_POOL_2: &str = "dataPool2";

/// Pools created for one consumer of the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolGroup {
    Kubernetes,
    Rbd,
    CephFs,
}

impl PoolGroup {
    pub const ALL: [PoolGroup; 3] = [Self::Kubernetes, Self::Rbd, Self::CephFs];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Kubernetes => "k8sTest",
            Self::Rbd => "rbdTest",
            Self::CephFs => "cephFSTest",
        }
    }

    pub fn pools(&self) -> &'static [&'static str] {
        match self {
            Self::Kubernetes => &["k8sPool1", "k8sPool2"],
            Self::Rbd => &["rbdPool1", "rbdPool2"],
            Self::CephFs => &[METADATA_POOL, DEFAULT_POOL, DATA_POOL_1, DATA_POOL_2],
        }
    }
}

/// Every pool name the lifecycle manages, group by group.
pub fn all_pools() -> impl Iterator<Item = &'static str> {
    PoolGroup::ALL.into_iter().flat_map(|g| g.pools().iter().copied())
}

/// Cluster name used when none is configured.
pub fn generated_cluster_name(identifier: &str) -> String {
    format!("{CLUSTER_NAME_PREFIX}_{identifier}")
}
