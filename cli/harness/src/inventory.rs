//! Node discovery.

use std::collections::HashMap;

use pcc_client::PccClient;
use pcc_converge::ItemIndex;
use pcc_id::{InterfaceId, NodeId};
use tracing::info;

use crate::error::HarnessError;

/// Interfaces of every configured node, built by the configuration phase
/// and read by both network verification phases.
pub type NodeInterfaceIndex = ItemIndex<NodeId, InterfaceId>;

/// Host address to node ID map, as registered on the server.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    by_host: HashMap<String, NodeId>,
}

impl Inventory {
    pub async fn discover(client: &PccClient) -> Result<Self, HarnessError> {
        let by_host = client.node_ids_by_host().await?;
        info!(nodes = by_host.len(), "Discovered nodes");
        Ok(Self { by_host })
    }

    pub fn node_id(&self, host: &str) -> Result<NodeId, HarnessError> {
        self.by_host
            .get(host)
            .copied()
            .ok_or_else(|| HarnessError::UnknownHost(host.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }
}

impl FromIterator<(String, NodeId)> for Inventory {
    fn from_iter<T: IntoIterator<Item = (String, NodeId)>>(iter: T) -> Self {
        Self {
            by_host: iter.into_iter().collect(),
        }
    }
}
