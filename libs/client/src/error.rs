//! Errors surfaced by the PCC client.

use thiserror::Error;

/// PCC client errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with something other than 200.
    #[error("{method} {endpoint} returned status {status}: {body}")]
    Status {
        method: &'static str,
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid request body for {endpoint}: {source}")]
    Encode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// A precondition for the call was not met.
    #[error("{0}")]
    Precondition(String),
}

impl ApiError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP or envelope status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
