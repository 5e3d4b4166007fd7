//! Ceph cluster, pool and filesystem endpoints.
//!
//! Create calls only submit the request; the object shows up in the list
//! endpoints once the backend has processed it. Callers resolve the new ID
//! with the `find_*` lookups.

use pcc_id::{ClusterId, FsId, PoolId};

use crate::error::ApiError;
use crate::models::{
    CephCluster, CephFs, CephPool, CreateCephClusterRequest, CreateCephFsRequest,
    CreateCephPoolRequest,
};
use crate::PccClient;

const CLUSTER_ENDPOINT: &str = "pccserver/storage/ceph/cluster";
const POOL_ENDPOINT: &str = "pccserver/storage/ceph/pool";
const FS_ENDPOINT: &str = "pccserver/storage/ceph/fs";

fn require_cluster(cluster: ClusterId) -> Result<(), ApiError> {
    if cluster.is_unassigned() {
        return Err(ApiError::Precondition("No Ceph Cluster found".to_string()));
    }
    Ok(())
}

impl PccClient {
    // -------------------------------------------------------------------------
    // Clusters
    // -------------------------------------------------------------------------

    pub async fn list_ceph_clusters(&self) -> Result<Vec<CephCluster>, ApiError> {
        self.get_list(CLUSTER_ENDPOINT).await
    }

    /// Cluster with exactly this name.
    pub async fn find_ceph_cluster(&self, name: &str) -> Result<CephCluster, ApiError> {
        self.list_ceph_clusters()
            .await?
            .into_iter()
            .find(|cluster| cluster.name == name)
            .ok_or_else(|| ApiError::not_found("ceph cluster", name))
    }

    pub async fn create_ceph_cluster(
        &self,
        request: &CreateCephClusterRequest,
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self.post(CLUSTER_ENDPOINT, request).await?;
        Ok(())
    }

    pub async fn delete_ceph_cluster(&self, id: ClusterId) -> Result<(), ApiError> {
        self.delete(&format!("{CLUSTER_ENDPOINT}/{id}")).await
    }

    // -------------------------------------------------------------------------
    // Pools
    // -------------------------------------------------------------------------

    pub async fn list_ceph_pools(&self, cluster: ClusterId) -> Result<Vec<CephPool>, ApiError> {
        require_cluster(cluster)?;
        self.get_list(&format!("{CLUSTER_ENDPOINT}/{cluster}/pools"))
            .await
    }

    pub async fn find_ceph_pool(
        &self,
        cluster: ClusterId,
        name: &str,
    ) -> Result<CephPool, ApiError> {
        self.list_ceph_pools(cluster)
            .await?
            .into_iter()
            .find(|pool| pool.name == name)
            .ok_or_else(|| ApiError::not_found("ceph pool", name))
    }

    pub async fn create_ceph_pool(&self, request: &CreateCephPoolRequest) -> Result<(), ApiError> {
        let _: serde_json::Value = self.post(POOL_ENDPOINT, request).await?;
        Ok(())
    }

    pub async fn delete_ceph_pool(&self, id: PoolId) -> Result<(), ApiError> {
        self.delete(&format!("{POOL_ENDPOINT}/{id}")).await
    }

    // -------------------------------------------------------------------------
    // Filesystems
    // -------------------------------------------------------------------------

    pub async fn list_ceph_fs(&self, cluster: ClusterId) -> Result<Vec<CephFs>, ApiError> {
        require_cluster(cluster)?;
        self.get_list(&format!("{CLUSTER_ENDPOINT}/{cluster}/fs"))
            .await
    }

    pub async fn find_ceph_fs(&self, cluster: ClusterId, name: &str) -> Result<CephFs, ApiError> {
        self.list_ceph_fs(cluster)
            .await?
            .into_iter()
            .find(|fs| fs.name == name)
            .ok_or_else(|| ApiError::not_found("ceph fs", name))
    }

    pub async fn create_ceph_fs(&self, request: &CreateCephFsRequest) -> Result<(), ApiError> {
        let _: serde_json::Value = self.post(FS_ENDPOINT, request).await?;
        Ok(())
    }

    pub async fn delete_ceph_fs(&self, id: FsId) -> Result<(), ApiError> {
        self.delete(&format!("{FS_ENDPOINT}/{id}")).await
    }
}
