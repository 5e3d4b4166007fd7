//! # pcc-id
//!
//! Typed IDs for the resources the PCC server hands out.
//!
//! ## Design Principles
//!
//! - IDs are server-assigned integers; names are user-controlled labels
//! - IDs are typed so a pool ID can never be passed where a node ID is expected
//! - On the wire an ID is the bare integer; `0` means "not assigned yet"
//!
//! ## ID Format
//!
//! The canonical string form is the decimal integer, which is also what
//! goes into endpoint paths:
//!
//! - `pccserver/interface/node/42`
//! - `pccserver/storage/ceph/pool/7`

mod macros;
mod types;

pub use types::*;
