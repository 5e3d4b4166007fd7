//! Network interface inspection and configuration.

use pcc_id::{InterfaceId, NodeId};

use crate::error::ApiError;
use crate::models::{InterfaceDetail, InterfaceRequest};
use crate::PccClient;

impl PccClient {
    /// All interfaces of a node.
    pub async fn list_interfaces(&self, node: NodeId) -> Result<Vec<InterfaceDetail>, ApiError> {
        self.get_list(&format!("pccserver/interface/node/{node}"))
            .await
    }

    /// Current record of one interface.
    pub async fn get_interface(
        &self,
        node: NodeId,
        interface: InterfaceId,
    ) -> Result<InterfaceDetail, ApiError> {
        self.get(&format!("pccserver/interface/{node}/{interface}"))
            .await
    }

    /// Apply a new interface configuration. The change lands asynchronously.
    pub async fn set_interface(&self, request: &InterfaceRequest) -> Result<(), ApiError> {
        let _: serde_json::Value = self.post("pccserver/interface/apply", request).await?;
        Ok(())
    }
}

/// Locate the interface carrying `mac` (case-insensitive).
pub fn find_by_mac<'a>(
    interfaces: &'a [InterfaceDetail],
    mac: &str,
) -> Result<&'a InterfaceDetail, ApiError> {
    interfaces
        .iter()
        .find(|detail| detail.interface.mac_address.eq_ignore_ascii_case(mac))
        .ok_or_else(|| ApiError::not_found("interface with MAC address", mac))
}
