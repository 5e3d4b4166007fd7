//! Network interface configuration and verification.
//!
//! Configuration posts one request per configured MAC address and records
//! every interface of every touched node in a [`NodeInterfaceIndex`]. The two
//! verification phases then track that index until all interfaces are
//! `ready`, and until every managed link is either admin-down or has
//! carrier.

use async_trait::async_trait;
use pcc_client::models::{Interface, InterfaceDetail, InterfaceRequest, IntfState, LinkStatus};
use pcc_client::{find_by_mac, PccClient};
use pcc_converge::{
    Convergence, ConvergeError, ConvergenceReport, EntitySetTracker, PollSchedule,
};
use pcc_id::{InterfaceId, NodeId};
use tracing::{debug, info};

use crate::config::{HarnessConfig, NetInterfaceSpec};
use crate::error::HarnessError;
use crate::inventory::{Inventory, NodeInterfaceIndex};

// =============================================================================
// Configuration
// =============================================================================

/// Apply the configured interface settings of every invader and server.
///
/// Returns the index of all interfaces found on those nodes.
pub async fn configure_interfaces(
    client: &PccClient,
    config: &HarnessConfig,
    inventory: &Inventory,
) -> Result<NodeInterfaceIndex, HarnessError> {
    let mut index = NodeInterfaceIndex::new();

    for node in config.all_nodes() {
        let node_id = inventory.node_id(&node.host_ip)?;
        let interfaces = client.list_interfaces(node_id).await?;

        for spec in &node.net_interfaces {
            debug!(host = %node.host_ip, mac = %spec.mac_addr, "Looking up interface");
            let detail =
                find_by_mac(&interfaces, &spec.mac_addr).map_err(|_| HarnessError::UnknownMac {
                    host: node.host_ip.clone(),
                    mac: spec.mac_addr.clone(),
                })?;

            let request = interface_request(node_id, &detail.interface, spec);
            client.set_interface(&request).await?;
            info!(
                node_id = %node_id,
                interface = %detail.interface.name,
                mac = %spec.mac_addr,
                "Interface configuration submitted"
            );
        }

        index.insert(node_id, interface_ids(&interfaces));
    }

    Ok(index)
}

fn interface_ids(interfaces: &[InterfaceDetail]) -> Vec<InterfaceId> {
    interfaces.iter().map(|d| d.interface.id).collect()
}

/// Request that brings `current` to the configured settings, admin up.
pub fn interface_request(
    node_id: NodeId,
    current: &Interface,
    spec: &NetInterfaceSpec,
) -> InterfaceRequest {
    InterfaceRequest {
        interface_id: current.id,
        node_id,
        name: current.name.clone(),
        ipv4_addresses: spec.cidrs.clone(),
        mac_address: spec.mac_addr.clone(),
        managed_by_pcc: spec.managed_by_pcc,
        gateway: spec.gateway.clone(),
        autoneg: spec.autoneg.clone(),
        speed: spec.speed,
        mtu: spec.mtu,
        admin_status: LinkStatus::Up,
        is_management: current.is_management.then(|| "true".to_string()),
    }
}

// =============================================================================
// Predicates
// =============================================================================

/// Whether an interface has finished provisioning.
///
/// `queued`, `updating` and `offline` are transient; any other value is
/// rejected.
pub fn interface_ready(node_id: NodeId, intf: &Interface) -> Result<bool, ConvergeError> {
    match &intf.intf_state {
        IntfState::Ready => Ok(true),
        IntfState::Queued | IntfState::Updating | IntfState::Offline => Ok(false),
        IntfState::Unknown(value) => Err(ConvergeError::UnexpectedState {
            resource: format!("node {node_id} interface {}", intf.name),
            field: "intfState",
            value: value.clone(),
        }),
    }
}

/// Managed links of one node and how many of them are in an acceptable
/// state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkTally {
    pub considered: usize,
    pub satisfied: usize,
}

impl NetworkTally {
    pub fn is_up(&self) -> bool {
        self.satisfied == self.considered
    }
}

/// Count managed interfaces; admin-down ones are satisfied, admin-up ones
/// need carrier.
pub fn network_tally(node_id: NodeId, states: &[Interface]) -> Result<NetworkTally, ConvergeError> {
    let mut tally = NetworkTally::default();

    for intf in states.iter().filter(|i| i.managed_by_pcc) {
        tally.considered += 1;
        match &intf.admin_status {
            LinkStatus::Down => {
                debug!(node_id = %node_id, interface = %intf.name, "Admin down");
                tally.satisfied += 1;
            }
            LinkStatus::Up => {
                debug!(
                    node_id = %node_id,
                    interface = %intf.name,
                    carrier = %intf.carrier_status,
                    "Admin up"
                );
                if intf.carrier_status == LinkStatus::Up {
                    tally.satisfied += 1;
                }
            }
            LinkStatus::Unknown(value) => {
                return Err(ConvergeError::UnexpectedState {
                    resource: format!("node {node_id} interface {}", intf.name),
                    field: "adminStatus",
                    value: value.clone(),
                });
            }
        }
    }

    Ok(tally)
}

// =============================================================================
// Convergence instantiations
// =============================================================================

async fn observe_interface(
    client: &PccClient,
    node_id: NodeId,
    interface: InterfaceId,
) -> Result<Interface, ConvergeError> {
    client
        .get_interface(node_id, interface)
        .await
        .map(|detail| detail.interface)
        .map_err(|e| ConvergeError::observation(format!("node {node_id} interface {interface}"), e))
}

/// Every interface of a node reports `ready`.
pub struct InterfaceReadiness<'a> {
    client: &'a PccClient,
}

impl<'a> InterfaceReadiness<'a> {
    pub fn new(client: &'a PccClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Convergence for InterfaceReadiness<'_> {
    type Entity = NodeId;
    type Item = InterfaceId;
    type State = Interface;

    fn resource(&self) -> &str {
        "interface readiness"
    }

    async fn observe(
        &self,
        entity: &NodeId,
        item: &InterfaceId,
    ) -> Result<Interface, ConvergeError> {
        observe_interface(self.client, *entity, *item).await
    }

    fn is_converged(&self, entity: &NodeId, states: &[Interface]) -> Result<bool, ConvergeError> {
        let mut ready = 0;
        for intf in states {
            if interface_ready(*entity, intf)? {
                ready += 1;
            }
        }
        Ok(ready == states.len())
    }

    fn is_notable(&self, state: &Interface) -> bool {
        state.intf_state != IntfState::Ready
    }
}

/// Every managed link of a node is admin-down or carrier-up.
pub struct NetworkUp<'a> {
    client: &'a PccClient,
}

impl<'a> NetworkUp<'a> {
    pub fn new(client: &'a PccClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Convergence for NetworkUp<'_> {
    type Entity = NodeId;
    type Item = InterfaceId;
    type State = Interface;

    fn resource(&self) -> &str {
        "network up"
    }

    async fn observe(
        &self,
        entity: &NodeId,
        item: &InterfaceId,
    ) -> Result<Interface, ConvergeError> {
        observe_interface(self.client, *entity, *item).await
    }

    fn is_converged(&self, entity: &NodeId, states: &[Interface]) -> Result<bool, ConvergeError> {
        Ok(network_tally(*entity, states)?.is_up())
    }

    fn is_notable(&self, state: &Interface) -> bool {
        state.managed_by_pcc
    }
}

/// Wait until every indexed interface is `ready`.
pub async fn verify_interfaces(
    client: &PccClient,
    index: &NodeInterfaceIndex,
    schedule: PollSchedule,
) -> Result<ConvergenceReport<NodeId>, HarnessError> {
    let readiness = InterfaceReadiness::new(client);
    let report = EntitySetTracker::new(&readiness, index)
        .run_until_converged(schedule)
        .await?;
    Ok(report)
}

/// Wait until every node's managed links are up.
pub async fn verify_network_up(
    client: &PccClient,
    index: &NodeInterfaceIndex,
    schedule: PollSchedule,
) -> Result<ConvergenceReport<NodeId>, HarnessError> {
    let network = NetworkUp::new(client);
    let report = EntitySetTracker::new(&network, index)
        .run_until_converged(schedule)
        .await?;
    Ok(report)
}
