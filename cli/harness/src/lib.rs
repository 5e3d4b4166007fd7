//! # pcc-harness
//!
//! Integration harness for a PCC-managed fleet. Each phase mutates the
//! fleet through the PCC API once and then waits for the backend to
//! converge:
//!
//! - **reimage**: MAAS info update and deployment of every server
//! - **network**: interface configuration, readiness and link checks
//! - **ceph**: cluster, pool and filesystem lifecycle verified through
//!   notifications
//!
//! An optional stats collector samples container usage alongside.

pub mod ceph;
pub mod config;
pub mod error;
pub mod events;
pub mod harness;
pub mod inventory;
pub mod network;
pub mod reimage;
pub mod stats;

pub use config::HarnessConfig;
pub use error::HarnessError;
pub use harness::{Harness, Phase};
pub use inventory::{Inventory, NodeInterfaceIndex};
