//! Update orchestration: one lease-protected cycle per event, from aggregation to commit.

use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, error, info, warn};

use crate::{
    dao::{
        leaderboard::LeaderboardSource,
        models::{EventDocument, EventId, EventSnapshot},
        snapshot_store::SnapshotStore,
        storage::StoreError,
    },
    services::{
        aggregator::{AggregationError, StageAggregator},
        restart_detector::detect_restarts,
        termination::{DEFAULT_FINISHING_STRIKES, TerminationTracker},
    },
    state::{
        in_flight::{ConcurrencyError, InFlightLease, InFlightSet},
        update::{AbandonReason, UpdateCycle, UpdateOutcome, UpdatePhase},
    },
};

/// Tunables of the update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Delay between the dispatch of two successive stages of one event.
    pub stage_stagger: Duration,
    /// Delay before an inconsistent leaderboard is fetched again.
    pub retry_delay: Duration,
    /// Consecutive inconsistent cycles tolerated before giving up until the next sweep.
    pub max_invalid_retries: u32,
    /// Strikes after which an event without leaderboard is finished.
    pub finishing_strikes: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            stage_stagger: Duration::from_millis(250),
            retry_delay: Duration::from_secs(10),
            max_invalid_retries: 5,
            finishing_strikes: DEFAULT_FINISHING_STRIKES,
        }
    }
}

/// Drives event updates and guarantees that at most one runs per event.
///
/// Cloning is cheap; every clone shares the same in-flight set.
#[derive(Clone)]
pub struct UpdateOrchestrator {
    aggregator: StageAggregator,
    store: Arc<dyn SnapshotStore>,
    termination: TerminationTracker,
    in_flight: InFlightSet,
    retry_delay: Duration,
    max_invalid_retries: u32,
}

impl UpdateOrchestrator {
    /// Build an orchestrator with its own, empty in-flight set.
    pub fn new(
        source: Arc<dyn LeaderboardSource>,
        store: Arc<dyn SnapshotStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            aggregator: StageAggregator::new(source, settings.stage_stagger),
            termination: TerminationTracker::new(store.clone(), settings.finishing_strikes),
            store,
            in_flight: InFlightSet::new(),
            retry_delay: settings.retry_delay,
            max_invalid_retries: settings.max_invalid_retries,
        }
    }

    /// Events currently being updated.
    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    /// Store the orchestrator commits to.
    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Start an update in the background.
    ///
    /// The update runs to a terminal phase even when the returned handle is dropped.
    pub fn request(&self, id: EventId) -> Result<JoinHandle<UpdateOutcome>, ConcurrencyError> {
        self.request_attempt(id, 1)
    }

    /// Run an update on the current task and return its outcome.
    pub async fn run(&self, id: EventId) -> Result<UpdateOutcome, ConcurrencyError> {
        let lease = self.in_flight.try_acquire(id)?;
        Ok(self.drive(lease, 1).await)
    }

    fn request_attempt(
        &self,
        id: EventId,
        attempt: u32,
    ) -> Result<JoinHandle<UpdateOutcome>, ConcurrencyError> {
        let lease = self.in_flight.try_acquire(id)?;
        Ok(self.spawn_attempt(lease, attempt))
    }

    /// Start an update in the background for an event whose lease the caller already holds.
    pub fn request_leased(&self, lease: InFlightLease) -> JoinHandle<UpdateOutcome> {
        self.spawn_attempt(lease, 1)
    }

    fn spawn_attempt(&self, lease: InFlightLease, attempt: u32) -> JoinHandle<UpdateOutcome> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.drive(lease, attempt).await })
    }

    async fn drive(&self, lease: InFlightLease, attempt: u32) -> UpdateOutcome {
        let id = lease.id();
        let mut cycle = UpdateCycle::new(id, attempt);
        self.advance(&mut cycle, UpdatePhase::InFlight);
        debug!(event_id = id, attempt, "update started");

        let outcome = self.execute(id, attempt).await;
        self.advance(&mut cycle, outcome.phase());
        drop(lease);

        if let UpdateOutcome::Retrying { next_attempt, .. } = &outcome {
            self.schedule_retry(id, *next_attempt);
        }
        outcome
    }

    fn advance(&self, cycle: &mut UpdateCycle, next: UpdatePhase) {
        if let Err(err) = cycle.advance(next) {
            error!(event_id = cycle.id(), error = %err, "update cycle out of order");
        }
    }

    async fn execute(&self, id: EventId, attempt: u32) -> UpdateOutcome {
        let started = Instant::now();
        let previous = match self.store.read(id).await {
            Ok(document) => Some(document),
            Err(StoreError::NotFound { .. }) => None,
            Err(err) => {
                warn!(event_id = id, error = %err, "stored document unreadable; updating from scratch");
                None
            }
        };

        if previous.as_ref().is_some_and(EventDocument::is_finished) {
            debug!(event_id = id, "event already finished; update skipped");
            return UpdateOutcome::Abandoned(AbandonReason::Finished);
        }

        match self.aggregator.aggregate(id).await {
            Ok(draft) => self.commit(id, draft, previous, started).await,
            Err(AggregationError::NoDataYet) => match self.termination.record_no_data(id).await {
                Ok(termination) => {
                    info!(event_id = id, outcome = ?termination, "event has no leaderboard yet");
                    UpdateOutcome::Abandoned(AbandonReason::NoDataYet(termination))
                }
                Err(err) => {
                    error!(event_id = id, error = %err, "failed to record finishing strike");
                    UpdateOutcome::Abandoned(AbandonReason::Store)
                }
            },
            Err(AggregationError::StageNotReady { stage }) => {
                warn!(event_id = id, stage, "stage has no leaderboard yet; update abandoned");
                self.abandon(id, previous, AbandonReason::StageNotReady { stage })
                    .await
            }
            Err(AggregationError::Invalid { stage, reason }) if attempt > self.max_invalid_retries => {
                warn!(event_id = id, stage, attempt, reason = %reason, "leaderboard still inconsistent; giving up until next sweep");
                self.abandon(id, previous, AbandonReason::RetriesExhausted)
                    .await
            }
            Err(AggregationError::Invalid { stage, reason }) => {
                warn!(event_id = id, stage, attempt, reason = %reason, "leaderboard inconsistent; retry scheduled");
                UpdateOutcome::Retrying {
                    next_attempt: attempt + 1,
                    stage,
                    reason,
                }
            }
            Err(AggregationError::Fetch(err)) => {
                warn!(event_id = id, error = %err, "leaderboard fetch failed; update abandoned");
                self.abandon(id, previous, AbandonReason::Fetch).await
            }
        }
    }

    async fn commit(
        &self,
        id: EventId,
        mut draft: EventSnapshot,
        previous: Option<EventDocument>,
        started: Instant,
    ) -> UpdateOutcome {
        if !draft.is_complete() {
            warn!(
                event_id = id,
                stages = draft.stage_data.len(),
                stage_count = draft.stage_count,
                "aggregated snapshot misses stages"
            );
            return self.abandon(id, previous, AbandonReason::Incomplete).await;
        }

        let mut new_restarts = 0;
        if let Some(previous) = previous.and_then(EventDocument::into_snapshot) {
            let restarters = detect_restarts(&previous, &draft);
            new_restarts = restarters
                .iter()
                .filter(|(name, count)| previous.restarters.get(*name) != Some(*count))
                .count();
            draft.restarters = restarters;
        }

        draft.actual_time = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        draft.cache_time = format_cache_time(SystemTime::now());

        let (stage_count, request_count, actual_time) =
            (draft.stage_count, draft.request_count, draft.actual_time);
        if let Err(err) = self.store.write(id, draft.into()).await {
            error!(event_id = id, error = %err, "failed to store snapshot");
            return UpdateOutcome::Abandoned(AbandonReason::Store);
        }

        info!(
            event_id = id,
            stage_count,
            request_count,
            actual_time,
            new_restarts,
            "snapshot committed"
        );
        UpdateOutcome::Committed {
            stage_count,
            request_count,
            new_restarts,
        }
    }

    /// End the cycle without commit, keeping a client-safe trace on an existing snapshot.
    async fn abandon(
        &self,
        id: EventId,
        previous: Option<EventDocument>,
        reason: AbandonReason,
    ) -> UpdateOutcome {
        if let (Some(label), Some(EventDocument::Snapshot(mut snapshot))) = (reason.label(), previous)
        {
            snapshot.last_error = Some(label);
            if let Err(err) = self.store.write(id, snapshot.into()).await {
                error!(event_id = id, error = %err, "failed to record last error");
            }
        }
        UpdateOutcome::Abandoned(reason)
    }

    fn schedule_retry(&self, id: EventId, attempt: u32) {
        let orchestrator = self.clone();
        let delay = self.retry_delay;
        tokio::spawn(async move {
            sleep(delay).await;
            if let Err(err) = orchestrator.request_attempt(id, attempt) {
                debug!(event_id = id, error = %err, "retry skipped");
            }
        });
    }
}

fn format_cache_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
