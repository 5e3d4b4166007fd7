//! Node inventory and MAAS reimaging.

use std::collections::HashMap;

use pcc_id::NodeId;

use crate::error::ApiError;
use crate::models::{MaasRequest, Node, NodeUpdateRequest};
use crate::PccClient;

impl PccClient {
    pub async fn list_nodes(&self) -> Result<Vec<Node>, ApiError> {
        self.get_list("pccserver/node").await
    }

    /// Map every node's host address to its ID.
    pub async fn node_ids_by_host(&self) -> Result<HashMap<String, NodeId>, ApiError> {
        Ok(self
            .list_nodes()
            .await?
            .into_iter()
            .map(|node| (node.host, node.id))
            .collect())
    }

    /// Push BMC and ownership details for an existing node.
    pub async fn update_node(&self, request: &NodeUpdateRequest) -> Result<Node, ApiError> {
        self.put("pccserver/node/update", request).await
    }

    /// Start a MAAS deployment (reimage) of the listed nodes.
    pub async fn deploy_image(&self, request: &MaasRequest) -> Result<(), ApiError> {
        let _: serde_json::Value = self.post("maas/deployments", request).await?;
        Ok(())
    }
}
