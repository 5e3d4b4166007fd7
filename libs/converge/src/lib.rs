//! Convergence polling primitives.
//!
//! A mutation is issued once against the server; afterwards the caller has
//! to wait until the eventually-consistent backend reflects it. This crate
//! provides the three pieces used for that wait:
//!
//! - **[`PollClock`]**: a deadline raced against a fixed-interval tick.
//! - **[`EntitySetTracker`]**: polls every item of every pending entity and
//!   drops entities once a completion predicate holds.
//! - **[`EventLogVerifier`]**: watches the notification stream and
//!   classifies new messages as success, failure or noise.
//!
//! # Invariants
//!
//! - The pending set only shrinks once polling starts
//! - Every loop ends within `timeout + tick`
//! - Observation never mutates server state

use std::time::Duration;

use thiserror::Error;

mod clock;
mod tracker;
mod verifier;

pub use clock::{PollClock, PollSchedule, Tick};
pub use tracker::{
    Convergence, ConvergenceReport, EntitySetTracker, ItemIndex, StalledEntity, StalledItem,
};
pub use verifier::{
    EventLogVerifier, EventSource, Expectations, LogEvent, Outcome, Verdict, VerdictStatus,
};

/// Boxed error coming from an observation collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convergence errors.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// Timeout waiting for a set of entities to converge.
    #[error("timeout after {elapsed:?} waiting for {resource} ({pending} still pending)")]
    Timeout {
        resource: String,
        elapsed: Duration,
        pending: usize,
        stalled: Vec<StalledEntity>,
    },

    /// Timeout waiting for a terminal notification.
    #[error("timeout after {elapsed:?} waiting for {operation}; last message: {}", .last_message.as_deref().unwrap_or("<none>"))]
    EventTimeout {
        operation: String,
        elapsed: Duration,
        last_message: Option<String>,
    },

    /// The backend reported a terminal failure.
    #[error("{operation} failed: {message}")]
    OperationFailed { operation: String, message: String },

    /// The backend returned a state outside the known set.
    #[error("unexpected {field} '{value}' for {resource}")]
    UnexpectedState {
        resource: String,
        field: &'static str,
        value: String,
    },

    /// An entity or item was missing from a lookup table.
    #[error("lookup failed: {0}")]
    LookupFailed(String),

    /// Reading current state failed.
    #[error("observing {resource} failed: {source}")]
    Observation {
        resource: String,
        #[source]
        source: BoxError,
    },
}

impl ConvergeError {
    /// Wrap a collaborator error raised while observing `resource`.
    pub fn observation(resource: impl std::fmt::Display, source: impl Into<BoxError>) -> Self {
        Self::Observation {
            resource: resource.to_string(),
            source: source.into(),
        }
    }

    /// Returns true for either flavour of timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::EventTimeout { .. })
    }
}

/// Default interval between two evaluations.
pub const DEFAULT_TICK: Duration = Duration::from_secs(5);

/// Default bound for entity convergence loops.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
