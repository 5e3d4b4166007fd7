//! Per-entity convergence tracking.
//!
//! An [`ItemIndex`] maps every entity (a node) to the items it owns (its
//! interfaces). [`EntitySetTracker`] polls each item of each still-pending
//! entity on every tick and drops the entity once its [`Convergence`]
//! predicate holds.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Display};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::clock::{PollClock, PollSchedule, Tick};
use crate::ConvergeError;

/// Entity → ordered item IDs, built once before polling starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemIndex<E: Ord, I> {
    entries: BTreeMap<E, Vec<I>>,
}

impl<E: Ord, I> Default for ItemIndex<E, I> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<E: Ord + Display, I> ItemIndex<E, I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the items owned by `entity`, replacing any previous entry.
    pub fn insert(&mut self, entity: E, items: Vec<I>) -> Option<Vec<I>> {
        self.entries.insert(entity, items)
    }

    /// Items owned by `entity`.
    pub fn items(&self, entity: &E) -> Result<&[I], ConvergeError> {
        self.entries
            .get(entity)
            .map(Vec::as_slice)
            .ok_or_else(|| ConvergeError::LookupFailed(format!("no items indexed for {entity}")))
    }

    pub fn entities(&self) -> impl Iterator<Item = &E> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&E, &[I])> {
        self.entries.iter().map(|(e, items)| (e, items.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: Ord, I> FromIterator<(E, Vec<I>)> for ItemIndex<E, I> {
    fn from_iter<T: IntoIterator<Item = (E, Vec<I>)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Domain logic plugged into an [`EntitySetTracker`].
#[async_trait]
pub trait Convergence: Send + Sync {
    type Entity: Ord + Clone + Display + Send + Sync;
    type Item: Clone + Display + Send + Sync;
    type State: Debug + Send;

    /// Label used in logs and timeout errors.
    fn resource(&self) -> &str;

    /// Read the current state of one item. Must not mutate anything.
    async fn observe(
        &self,
        entity: &Self::Entity,
        item: &Self::Item,
    ) -> Result<Self::State, ConvergeError>;

    /// Completion predicate over the states of all items of `entity`.
    ///
    /// Returns an error for states outside the known set.
    fn is_converged(
        &self,
        entity: &Self::Entity,
        states: &[Self::State],
    ) -> Result<bool, ConvergeError>;

    /// Whether a state is worth reporting in the timeout dump.
    fn is_notable(&self, _state: &Self::State) -> bool {
        true
    }
}

/// One item of a stalled entity, captured during the timeout dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledItem {
    pub item: String,
    pub detail: String,
}

/// An entity that was still pending when the deadline fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledEntity {
    pub entity: String,
    pub items: Vec<StalledItem>,
}

/// Outcome of a successful tracking run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceReport<E> {
    /// Entities in the order they converged.
    pub converged: Vec<E>,
    /// Number of evaluation passes.
    pub passes: u32,
    pub elapsed: Duration,
}

/// Tracks which entities of an [`ItemIndex`] have not converged yet.
pub struct EntitySetTracker<'a, C: Convergence> {
    convergence: &'a C,
    index: &'a ItemIndex<C::Entity, C::Item>,
    pending: BTreeSet<C::Entity>,
}

impl<'a, C: Convergence> EntitySetTracker<'a, C> {
    /// Every indexed entity starts out pending.
    pub fn new(convergence: &'a C, index: &'a ItemIndex<C::Entity, C::Item>) -> Self {
        Self {
            convergence,
            index,
            pending: index.entities().cloned().collect(),
        }
    }

    pub fn pending(&self) -> impl Iterator<Item = &C::Entity> {
        self.pending.iter()
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    /// One pass over the pending set. Returns the entities that converged.
    pub async fn evaluate(&mut self) -> Result<Vec<C::Entity>, ConvergeError> {
        let mut converged = Vec::new();

        for entity in &self.pending {
            let items = self.index.items(entity)?;
            let mut states = Vec::with_capacity(items.len());
            for item in items {
                states.push(self.convergence.observe(entity, item).await?);
            }

            if self.convergence.is_converged(entity, &states)? {
                info!(
                    resource = self.convergence.resource(),
                    entity = %entity,
                    "Entity converged"
                );
                converged.push(entity.clone());
            } else {
                debug!(
                    resource = self.convergence.resource(),
                    entity = %entity,
                    states = ?states,
                    "Entity not converged yet"
                );
            }
        }

        for entity in &converged {
            self.pending.remove(entity);
        }

        Ok(converged)
    }

    /// Capture the current state of every item of every pending entity.
    ///
    /// Observation failures are recorded rather than propagated so the dump
    /// always covers the whole pending set.
    pub async fn diagnose(&self) -> Result<Vec<StalledEntity>, ConvergeError> {
        let mut stalled = Vec::with_capacity(self.pending.len());

        for entity in &self.pending {
            let mut items = Vec::new();
            for item in self.index.items(entity)? {
                let detail = match self.convergence.observe(entity, item).await {
                    Ok(state) if !self.convergence.is_notable(&state) => continue,
                    Ok(state) => format!("{state:?}"),
                    Err(e) => format!("unavailable: {e}"),
                };
                warn!(
                    resource = self.convergence.resource(),
                    entity = %entity,
                    item = %item,
                    state = %detail,
                    "Item did not converge"
                );
                items.push(StalledItem {
                    item: item.to_string(),
                    detail,
                });
            }
            stalled.push(StalledEntity {
                entity: entity.to_string(),
                items,
            });
        }

        Ok(stalled)
    }

    /// Poll until the pending set is empty or the schedule's deadline fires.
    pub async fn run_until_converged(
        mut self,
        schedule: PollSchedule,
    ) -> Result<ConvergenceReport<C::Entity>, ConvergeError> {
        let resource = self.convergence.resource().to_string();
        info!(
            resource = %resource,
            entities = self.pending.len(),
            timeout_secs = schedule.timeout.as_secs(),
            tick_secs = schedule.tick.as_secs(),
            "Waiting for convergence"
        );

        let mut clock = PollClock::start(schedule);
        let mut report = ConvergenceReport {
            converged: Vec::new(),
            passes: 0,
            elapsed: Duration::ZERO,
        };

        while !self.is_done() {
            match clock.next().await {
                Tick::Evaluate => {
                    report.passes += 1;
                    let converged = self.evaluate().await?;
                    report.converged.extend(converged);
                }
                Tick::Expired => {
                    let stalled = self.diagnose().await?;
                    return Err(ConvergeError::Timeout {
                        resource,
                        elapsed: clock.elapsed(),
                        pending: self.pending.len(),
                        stalled,
                    });
                }
            }
        }

        report.elapsed = clock.elapsed();
        info!(
            resource = %resource,
            passes = report.passes,
            elapsed_secs = report.elapsed.as_secs(),
            "All entities converged"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Item becomes "ready" once it has been observed `ready_after` times.
    #[derive(Default)]
    struct Scripted {
        ready_after: HashMap<(u32, u32), u32>,
        observed: Mutex<HashMap<(u32, u32), u32>>,
        bogus: Option<(u32, u32)>,
    }

    impl Scripted {
        fn observations(&self, entity: u32, item: u32) -> u32 {
            self.observed
                .lock()
                .unwrap()
                .get(&(entity, item))
                .copied()
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl Convergence for Scripted {
        type Entity = u32;
        type Item = u32;
        type State = &'static str;

        fn resource(&self) -> &str {
            "test items"
        }

        async fn observe(&self, entity: &u32, item: &u32) -> Result<&'static str, ConvergeError> {
            let key = (*entity, *item);
            if self.bogus == Some(key) {
                return Ok("exploded");
            }
            let mut observed = self.observed.lock().unwrap();
            let count = observed.entry(key).or_insert(0);
            *count += 1;
            let needed = self.ready_after.get(&key).copied().unwrap_or(u32::MAX);
            Ok(if *count >= needed { "ready" } else { "queued" })
        }

        fn is_converged(&self, entity: &u32, states: &[&'static str]) -> Result<bool, ConvergeError> {
            let mut ready = 0;
            for state in states {
                match *state {
                    "ready" => ready += 1,
                    "queued" => {}
                    other => {
                        return Err(ConvergeError::UnexpectedState {
                            resource: format!("entity {entity}"),
                            field: "state",
                            value: other.to_string(),
                        })
                    }
                }
            }
            Ok(ready == states.len())
        }

        fn is_notable(&self, state: &&'static str) -> bool {
            *state != "ready"
        }
    }

    fn schedule() -> PollSchedule {
        PollSchedule::new(Duration::from_secs(30), Duration::from_secs(5))
    }

    fn index() -> ItemIndex<u32, u32> {
        [(1, vec![10, 11]), (2, vec![20])].into_iter().collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_entities_converge_on_their_own_ticks() {
        let scripted = Scripted {
            ready_after: [((1, 10), 1), ((1, 11), 2), ((2, 20), 1)].into(),
            ..Default::default()
        };
        let index = index();

        let report = EntitySetTracker::new(&scripted, &index)
            .run_until_converged(schedule())
            .await
            .unwrap();

        assert_eq!(report.converged, vec![2, 1]);
        assert_eq!(report.passes, 2);
        assert_eq!(report.elapsed, Duration::from_secs(10));

        // Entity 2 was dropped after the first pass and never polled again.
        assert_eq!(scripted.observations(2, 20), 1);
        assert_eq!(scripted.observations(1, 11), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_set_only_shrinks() {
        let scripted = Scripted {
            ready_after: [((1, 10), 1), ((1, 11), 3), ((2, 20), 2)].into(),
            ..Default::default()
        };
        let index = index();
        let mut tracker = EntitySetTracker::new(&scripted, &index);

        let mut sizes = vec![tracker.pending().count()];
        while !tracker.is_done() {
            tracker.evaluate().await.unwrap();
            sizes.push(tracker.pending().count());
        }

        assert_eq!(sizes, vec![2, 2, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_dumps_pending_items() {
        let scripted = Scripted {
            ready_after: [((1, 10), 1), ((2, 20), 1)].into(),
            ..Default::default()
        };
        let index = index();

        let err = EntitySetTracker::new(&scripted, &index)
            .run_until_converged(schedule())
            .await
            .unwrap_err();

        match err {
            ConvergeError::Timeout {
                resource,
                elapsed,
                pending,
                stalled,
            } => {
                assert_eq!(resource, "test items");
                assert!(elapsed >= Duration::from_secs(30));
                assert!(elapsed <= Duration::from_secs(35));
                assert_eq!(pending, 1);
                assert_eq!(
                    stalled,
                    vec![StalledEntity {
                        entity: "1".to_string(),
                        items: vec![StalledItem {
                            item: "11".to_string(),
                            detail: "\"queued\"".to_string(),
                        }],
                    }]
                );
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_state_aborts_without_retry() {
        let scripted = Scripted {
            bogus: Some((2, 20)),
            ..Default::default()
        };
        let index = index();

        let err = EntitySetTracker::new(&scripted, &index)
            .run_until_converged(schedule())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConvergeError::UnexpectedState { ref value, .. } if value == "exploded"
        ));
        assert_eq!(scripted.observations(1, 10), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_index_converges_immediately() {
        let scripted = Scripted::default();
        let index = ItemIndex::new();

        let report = EntitySetTracker::new(&scripted, &index)
            .run_until_converged(schedule())
            .await
            .unwrap();

        assert!(report.converged.is_empty());
        assert_eq!(report.passes, 0);
    }

    #[test]
    fn test_index_lookup_failure() {
        let index = index();
        assert_eq!(index.items(&1).unwrap(), &[10, 11]);
        assert!(matches!(
            index.items(&9),
            Err(ConvergeError::LookupFailed(_))
        ));
    }

    #[test]
    fn test_predicate_is_repeatable() {
        let scripted = Scripted::default();
        let states = ["ready", "ready"];
        assert!(scripted.is_converged(&1, &states).unwrap());
        assert!(scripted.is_converged(&1, &states).unwrap());
    }
}
