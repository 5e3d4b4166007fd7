//! Typed ID definitions for PCC resources.
//!
//! The server uses unsigned IDs for nodes and storage objects and signed
//! IDs for interfaces; the wrappers keep that representation.

use crate::define_id;

// =============================================================================
// Inventory
// =============================================================================

define_id!(NodeId, u64, "node");
define_id!(InterfaceId, i64, "interface");

// =============================================================================
// Storage
// =============================================================================

define_id!(ClusterId, u64, "ceph cluster");
define_id!(PoolId, u64, "ceph pool");
define_id!(FsId, u64, "ceph fs");

// =============================================================================
// Notifications
// =============================================================================

define_id!(NotificationId, u64, "notification");

// =============================================================================
// Tests
// =============================================================================
