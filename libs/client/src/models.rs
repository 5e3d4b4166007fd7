//! Request and response records exchanged with the PCC server.
//!
//! Only the fields the harness reads or sends are modelled; unknown fields
//! in responses are ignored.

use chrono::{DateTime, Utc};
use pcc_id::{ClusterId, FsId, InterfaceId, NodeId, NotificationId, PoolId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
}

/// Body of `PUT pccserver/node/update`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdateRequest {
    pub host: String,
    pub id: NodeId,
    pub bmc: String,
    pub bmc_user: String,
    pub bmc_users: Vec<String>,
    pub bmc_password: String,
    pub admin_user: String,
    pub ssh_keys: String,
    pub managed: bool,
}

/// Body of `POST maas/deployments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaasRequest {
    pub nodes: Vec<NodeId>,
    pub image: String,
    pub locale: String,
    pub timezone: String,
    pub admin_user: String,
    pub ssh_keys: Vec<String>,
}

// =============================================================================
// Interfaces
// =============================================================================

/// Interface provisioning state.
///
/// Values outside the known set are kept verbatim in `Unknown` so callers
/// can reject them explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IntfState {
    Ready,
    Queued,
    Updating,
    Offline,
    Unknown(String),
}

impl From<String> for IntfState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ready" => Self::Ready,
            "queued" => Self::Queued,
            "updating" => Self::Updating,
            "offline" => Self::Offline,
            _ => Self::Unknown(s),
        }
    }
}

impl From<IntfState> for String {
    fn from(state: IntfState) -> Self {
        state.to_string()
    }
}

impl std::fmt::Display for IntfState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => f.write_str("ready"),
            Self::Queued => f.write_str("queued"),
            Self::Updating => f.write_str("updating"),
            Self::Offline => f.write_str("offline"),
            Self::Unknown(s) => f.write_str(s),
        }
    }
}

/// Admin or carrier status of a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LinkStatus {
    Up,
    Down,
    Unknown(String),
}

impl From<String> for LinkStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "UP" => Self::Up,
            "DOWN" => Self::Down,
            _ => Self::Unknown(s),
        }
    }
}

impl From<LinkStatus> for String {
    fn from(status: LinkStatus) -> Self {
        status.to_string()
    }
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => f.write_str("UP"),
            Self::Down => f.write_str("DOWN"),
            Self::Unknown(s) => f.write_str(s),
        }
    }
}

fn unknown_link() -> LinkStatus {
    LinkStatus::Unknown(String::new())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub id: InterfaceId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mac_address: String,
    pub intf_state: IntfState,
    #[serde(default)]
    pub managed_by_pcc: bool,
    #[serde(default)]
    pub is_management: bool,
    #[serde(default = "unknown_link")]
    pub admin_status: LinkStatus,
    #[serde(default = "unknown_link")]
    pub carrier_status: LinkStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InterfaceDetail {
    pub interface: Interface,
}

/// Body of `POST pccserver/interface/apply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceRequest {
    pub interface_id: InterfaceId,
    pub node_id: NodeId,
    pub name: String,
    pub ipv4_addresses: Vec<String>,
    pub mac_address: String,
    pub managed_by_pcc: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gateway: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub autoneg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u64>,
    pub admin_status: LinkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_management: Option<String>,
}

// =============================================================================
// Ceph
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CephCluster {
    pub id: ClusterId,
    pub name: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CephNode {
    #[serde(rename = "ID")]
    pub id: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CephClusterConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cluster_network: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub public_network: String,
}

/// Body of `POST pccserver/storage/ceph/cluster`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCephClusterRequest {
    pub name: String,
    pub nodes: Vec<CephNode>,
    pub version: String,
    pub tags: Vec<String>,
    pub igw_policy: String,
    #[serde(rename = "controlCIDR")]
    pub control_cidr: String,
    pub config: CephClusterConfig,
}

/// A pool record; also embedded verbatim in FS create requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CephPool {
    pub id: PoolId,
    pub name: String,
    pub pool_type: String,
    pub size: u64,
    pub quota: u64,
    pub quota_unit: String,
    pub ceph_cluster_id: ClusterId,
    pub deploy_status: String,
}

/// Body of `POST pccserver/storage/ceph/pool`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateCephPoolRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pool_type: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub size: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub quota: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub quota_unit: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "ClusterId::is_unassigned")]
    pub ceph_cluster_id: ClusterId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_domain: Option<u32>,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CephFs {
    pub id: FsId,
    pub name: String,
    pub ceph_cluster_id: ClusterId,
    pub deploy_status: String,
}

/// Body of `POST pccserver/storage/ceph/fs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateCephFsRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "ClusterId::is_unassigned")]
    pub ceph_cluster_id: ClusterId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_pool: Option<CephPool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_pool: Option<CephPool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_pools: Vec<CephPool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_mds: Option<u32>,
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    #[serde(default)]
    pub level: String,
    pub message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ready", IntfState::Ready)]
    #[case("queued", IntfState::Queued)]
    #[case("updating", IntfState::Updating)]
    #[case("offline", IntfState::Offline)]
    #[case("READY", IntfState::Unknown("READY".to_string()))]
    fn test_intf_state_values(#[case] raw: &str, #[case] expected: IntfState) {
        assert_eq!(IntfState::from(raw.to_string()), expected);
        assert_eq!(expected.to_string(), raw);
    }

    #[test]
    fn test_interface_detail_decoding() {
        let json = serde_json::json!({
            "interface": {
                "id": 31,
                "name": "enp1s0",
                "macAddress": "00:11:22:33:44:55",
                "intfState": "updating",
                "managedByPcc": true,
                "adminStatus": "UP",
                "carrierStatus": "DOWN",
                "speed": 10000
            }
        });

        let detail: InterfaceDetail = serde_json::from_value(json).unwrap();
        assert_eq!(detail.interface.id, InterfaceId::new(31));
        assert_eq!(detail.interface.intf_state, IntfState::Updating);
        assert_eq!(detail.interface.admin_status, LinkStatus::Up);
        assert_eq!(detail.interface.carrier_status, LinkStatus::Down);
        assert!(!detail.interface.is_management);
    }

    #[test]
    fn test_unknown_state_is_preserved() {
        let state: IntfState = serde_json::from_str("\"rebooting\"").unwrap();
        assert_eq!(state, IntfState::Unknown("rebooting".to_string()));
        assert_eq!(state.to_string(), "rebooting");
    }

    #[test]
    fn test_missing_link_status_is_unknown() {
        let json = serde_json::json!({"id": 1, "intfState": "ready"});
        let intf: Interface = serde_json::from_value(json).unwrap();
        assert_eq!(intf.carrier_status, LinkStatus::Unknown(String::new()));
    }

    #[test]
    fn test_interface_request_serialization() {
        let request = InterfaceRequest {
            interface_id: InterfaceId::new(31),
            node_id: NodeId::new(4),
            name: "enp1s0".to_string(),
            ipv4_addresses: vec!["10.0.0.4/24".to_string()],
            mac_address: "00:11:22:33:44:55".to_string(),
            managed_by_pcc: true,
            gateway: String::new(),
            autoneg: "on".to_string(),
            speed: Some(10000),
            mtu: None,
            admin_status: LinkStatus::Up,
            is_management: Some("true".to_string()),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["interfaceId"], 31);
        assert_eq!(json["adminStatus"], "UP");
        assert_eq!(json["isManagement"], "true");
        assert!(json.get("gateway").is_none());
        assert!(json.get("mtu").is_none());
    }

    #[test]
    fn test_pool_request_omits_empty_fields() {
        let request = CreateCephPoolRequest {
            name: "rbdPool1".to_string(),
            ceph_cluster_id: ClusterId::new(3),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "rbdPool1", "ceph_cluster_id": 3})
        );
    }

    #[test]
    fn test_notification_timestamp_millis() {
        let json = serde_json::json!({
            "id": 9,
            "level": "info",
            "message": "Ceph cluster has been deployed",
            "createdAt": 1_700_000_000_000i64
        });
        let n: Notification = serde_json::from_value(json).unwrap();
        assert_eq!(n.created_at.timestamp(), 1_700_000_000);
    }
}
