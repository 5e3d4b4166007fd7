//! Harness errors.

use pcc_client::ApiError;
use pcc_converge::ConvergeError;
use thiserror::Error;

/// Failures that abort a harness phase.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Converge(#[from] ConvergeError),

    /// A created object never showed up in its list endpoint.
    #[error("Failed to get {kind}")]
    NotCreated { kind: &'static str, name: String },

    /// A configured host has no node record on the server.
    #[error("host {0} is not registered with the server")]
    UnknownHost(String),

    /// A configured MAC address is not among the node's interfaces.
    #[error("no interface with MAC address {mac} on node {host}")]
    UnknownMac { host: String, mac: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HarnessError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Converge(e) if e.is_timeout())
    }
}
