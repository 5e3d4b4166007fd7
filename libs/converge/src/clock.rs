//! Deadline/tick race shared by every poll loop.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tracing::warn;

use crate::{DEFAULT_TICK, DEFAULT_TIMEOUT};

/// Timeout and tick interval for one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Upper bound for the whole loop.
    pub timeout: Duration,

    /// Interval between two evaluations.
    pub tick: Duration,
}

impl PollSchedule {
    pub const fn new(timeout: Duration, tick: Duration) -> Self {
        Self { timeout, tick }
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_TICK)
    }
}

/// Result of waiting on the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Re-evaluate state.
    Evaluate,
    /// The deadline passed; abort.
    Expired,
}

/// A deadline raced against a fixed-interval tick.
///
/// The first tick fires one interval after [`PollClock::start`]. Once the
/// deadline fires every later call returns [`Tick::Expired`]. A zero tick
/// falls back to [`DEFAULT_TICK`].
pub struct PollClock {
    started: Instant,
    deadline: Pin<Box<Sleep>>,
    interval: Interval,
    expired: bool,
}

impl PollClock {
    /// Start the clock now.
    pub fn start(schedule: PollSchedule) -> Self {
        let started = Instant::now();

        let tick = if schedule.tick.is_zero() {
            warn!(default = ?DEFAULT_TICK, "Zero poll interval, using the default");
            DEFAULT_TICK
        } else {
            schedule.tick
        };

        let mut interval = tokio::time::interval_at(started + tick, tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            started,
            deadline: Box::pin(tokio::time::sleep_until(started + schedule.timeout)),
            interval,
            expired: false,
        }
    }

    /// Wait for the next decision point.
    pub async fn next(&mut self) -> Tick {
        if self.expired {
            return Tick::Expired;
        }

        // Deadline first so a tick landing on the deadline cannot extend the loop.
        tokio::select! {
            biased;
            _ = &mut self.deadline => {
                self.expired = true;
                Tick::Expired
            }
            _ = self.interval.tick() => Tick::Evaluate,
        }
    }

    /// Time since the clock was started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Returns true once the deadline has fired.
    pub fn is_expired(&self) -> bool {
        self.expired
    }
}
