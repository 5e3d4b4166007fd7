//! # pcc-client
//!
//! Client for the PCC cluster-management server.
//!
//! - [`Gateway`]: the raw `call(method, endpoint, body) -> (status, body)`
//!   transport, with [`HttpGateway`] as the reqwest implementation
//! - [`PccClient`]: typed calls for nodes, interfaces, Ceph objects and
//!   notifications
//! - [`models`]: request and response records
//!
//! Every response is wrapped in a `{status, data, message, error}`
//! envelope; only status 200 counts as success.

mod api;
mod client;
mod error;
mod gateway;
pub mod models;

pub use api::find_by_mac;
pub use client::PccClient;
pub use error::ApiError;
pub use gateway::{Gateway, GatewayConfig, GatewayResponse, HttpGateway, Method};
