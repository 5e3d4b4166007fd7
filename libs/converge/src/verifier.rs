//! Notification-driven verification.
//!
//! Some operations (Ceph cluster install, pool/FS create and delete) expose
//! no per-item state to poll. Progress is only visible as notification
//! messages, so the verifier watches the notification stream and classifies
//! every new message against a table of [`Expectations`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::{PollClock, PollSchedule, Tick};
use crate::{ConvergeError, DEFAULT_TICK};

/// How a matched message is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    /// Progress noise; keep waiting.
    Intermediate,
    /// Terminal success.
    Success,
    /// Terminal failure.
    Failure,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Intermediate)
    }
}

/// Message substrings and their classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectations {
    entries: Vec<(String, Outcome)>,
}

impl Expectations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(self, pattern: impl Into<String>) -> Self {
        self.expect(pattern, Outcome::Success)
    }

    pub fn failure(self, pattern: impl Into<String>) -> Self {
        self.expect(pattern, Outcome::Failure)
    }

    pub fn intermediate(self, pattern: impl Into<String>) -> Self {
        self.expect(pattern, Outcome::Intermediate)
    }

    pub fn expect(mut self, pattern: impl Into<String>, outcome: Outcome) -> Self {
        self.entries.push((pattern.into(), outcome));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Outcome)> {
        self.entries.iter().map(|(p, o)| (p.as_str(), *o))
    }

    /// Classify a message by substring containment.
    ///
    /// A message matching several patterns takes the strongest outcome:
    /// failure over success over intermediate.
    pub fn classify(&self, message: &str) -> Option<Outcome> {
        self.entries
            .iter()
            .filter(|(pattern, _)| message.contains(pattern.as_str()))
            .map(|(_, outcome)| *outcome)
            .max()
    }
}

/// One entry of the backend's notification stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Monotonic sequence number assigned by the backend.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Read-only access to the notification stream.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// All events emitted at or after `since`.
    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<LogEvent>, ConvergeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Succeeded,
    Failed,
}

/// Terminal result of a verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub operation: String,
    pub status: VerdictStatus,
    pub message: String,
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        self.status == VerdictStatus::Succeeded
    }

    /// The matched message on success, [`ConvergeError::OperationFailed`] otherwise.
    pub fn into_result(self) -> Result<String, ConvergeError> {
        match self.status {
            VerdictStatus::Succeeded => Ok(self.message),
            VerdictStatus::Failed => Err(ConvergeError::OperationFailed {
                operation: self.operation,
                message: self.message,
            }),
        }
    }
}

/// Watches the notification stream from a start time onward.
///
/// The cursor only moves forward: an event is classified at most once
/// across all calls on the same verifier.
pub struct EventLogVerifier<'a, S: EventSource> {
    source: &'a S,
    since: DateTime<Utc>,
    tick: Duration,
    cursor: Option<u64>,
    last_message: Option<String>,
}

impl<'a, S: EventSource> EventLogVerifier<'a, S> {
    /// Consider only events at or after `since`.
    pub fn new(source: &'a S, since: DateTime<Utc>) -> Self {
        Self {
            source,
            since,
            tick: DEFAULT_TICK,
            cursor: None,
            last_message: None,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Most recent message seen, matched or not.
    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    /// Fetch new events and classify them in order.
    ///
    /// Returns the first terminal match; later events in the same batch are
    /// left for the next call.
    pub async fn poll_once(
        &mut self,
        expectations: &Expectations,
    ) -> Result<Option<(Outcome, String)>, ConvergeError> {
        let mut events = self.source.events_since(self.since).await?;
        events.sort_by_key(|e| e.seq);

        for event in events {
            if self.cursor.is_some_and(|seen| event.seq <= seen) {
                continue;
            }
            self.cursor = Some(event.seq);
            self.last_message = Some(event.message.clone());

            match expectations.classify(&event.message) {
                Some(outcome) if outcome.is_terminal() => {
                    return Ok(Some((outcome, event.message)));
                }
                Some(_) => {
                    info!(seq = event.seq, message = %event.message, "Progress notification");
                }
                None => {
                    debug!(seq = event.seq, message = %event.message, "Unrelated notification");
                }
            }
        }

        Ok(None)
    }

    /// Poll until a terminal message arrives or `timeout` elapses.
    pub async fn await_outcome(
        &mut self,
        operation: &str,
        expectations: &Expectations,
        timeout: Duration,
    ) -> Result<Verdict, ConvergeError> {
        info!(
            operation,
            timeout_secs = timeout.as_secs(),
            "Waiting for terminal notification"
        );

        let mut clock = PollClock::start(PollSchedule::new(timeout, self.tick));
        loop {
            match clock.next().await {
                Tick::Evaluate => {
                    let Some((outcome, message)) = self.poll_once(expectations).await? else {
                        continue;
                    };

                    let status = match outcome {
                        Outcome::Success => VerdictStatus::Succeeded,
                        _ => VerdictStatus::Failed,
                    };
                    info!(
                        operation,
                        status = ?status,
                        message = %message,
                        elapsed_secs = clock.elapsed().as_secs(),
                        "Terminal notification"
                    );
                    return Ok(Verdict {
                        operation: operation.to_string(),
                        status,
                        message,
                    });
                }
                Tick::Expired => {
                    warn!(
                        operation,
                        last_message = self.last_message().unwrap_or("<none>"),
                        "No terminal notification before deadline"
                    );
                    return Err(ConvergeError::EventTimeout {
                        operation: operation.to_string(),
                        elapsed: clock.elapsed(),
                        last_message: self.last_message.clone(),
                    });
                }
            }
        }
    }
}
