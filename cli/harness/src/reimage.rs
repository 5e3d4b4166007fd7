//! MAAS reimage of the server fleet.

use pcc_client::models::{MaasRequest, NodeUpdateRequest};
use pcc_client::PccClient;
use pcc_id::NodeId;
use tracing::info;

use crate::config::{HarnessConfig, NodeSpec, ReimageConfig};
use crate::error::HarnessError;
use crate::inventory::Inventory;

/// Push BMC credentials for every server and mark it managed.
pub async fn update_maas_info(
    client: &PccClient,
    config: &HarnessConfig,
    inventory: &Inventory,
) -> Result<(), HarnessError> {
    for server in &config.servers {
        let request = node_update_request(
            inventory.node_id(&server.host_ip)?,
            server,
            &config.reimage,
        );
        client.update_node(&request).await?;
        info!(host = %server.host_ip, node_id = %request.id, "Node MAAS info updated");
    }
    Ok(())
}

/// Start a deployment of every server. Returns the deployed node IDs.
pub async fn reimage_all(
    client: &PccClient,
    config: &HarnessConfig,
    inventory: &Inventory,
) -> Result<Vec<NodeId>, HarnessError> {
    let mut deployed = Vec::with_capacity(config.servers.len());

    for server in &config.servers {
        let node_id = inventory.node_id(&server.host_ip)?;
        let request = maas_request(node_id, server, &config.reimage);
        client.deploy_image(&request).await?;
        info!(
            host = %server.host_ip,
            node_id = %node_id,
            image = %request.image,
            "Deployment started"
        );
        deployed.push(node_id);
    }

    Ok(deployed)
}

pub fn node_update_request(
    node_id: NodeId,
    server: &NodeSpec,
    reimage: &ReimageConfig,
) -> NodeUpdateRequest {
    NodeUpdateRequest {
        host: server.host_ip.clone(),
        id: node_id,
        bmc: server.bmc_ip.clone(),
        bmc_user: server.bmc_user.clone(),
        bmc_users: server.bmc_users.clone(),
        bmc_password: server.bmc_pass.clone(),
        admin_user: reimage.admin_user.clone(),
        ssh_keys: server.key_id.clone(),
        managed: true,
    }
}

pub fn maas_request(node_id: NodeId, server: &NodeSpec, reimage: &ReimageConfig) -> MaasRequest {
    MaasRequest {
        nodes: vec![node_id],
        image: reimage.image.clone(),
        locale: reimage.locale.clone(),
        timezone: reimage.timezone.clone(),
        admin_user: reimage.admin_user.clone(),
        ssh_keys: server.key_alias.clone(),
    }
}
