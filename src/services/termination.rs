//! Counts consecutive "no leaderboard" observations and retires events that stopped publishing.

use std::sync::Arc;

use tracing::{info, warn};

use crate::dao::{
    models::{EventDocument, EventId},
    snapshot_store::SnapshotStore,
    storage::{StoreError, StoreResult},
};

/// Default number of strikes after which an event is considered finished.
pub const DEFAULT_FINISHING_STRIKES: u32 = 3;

/// What a single "no data" observation did to the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// Nothing is stored for the event, so there is nothing to count.
    Untracked,
    /// The event was already finished; nothing changed.
    AlreadyFinished,
    /// Strike recorded; the event is still live.
    Strike(u32),
    /// The threshold was reached and the snapshot is now finished.
    Finished,
    /// The threshold was reached on a placeholder, which was removed.
    Evicted,
}

/// Finishing-strike bookkeeping on top of the snapshot store.
#[derive(Clone)]
pub struct TerminationTracker {
    store: Arc<dyn SnapshotStore>,
    threshold: u32,
}

impl TerminationTracker {
    /// Create a tracker finishing events after `threshold` strikes (at least one).
    pub fn new(store: Arc<dyn SnapshotStore>, threshold: u32) -> Self {
        Self {
            store,
            threshold: threshold.max(1),
        }
    }

    /// Strikes needed to finish an event.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Record that the event currently publishes no leaderboard.
    pub async fn record_no_data(&self, id: EventId) -> StoreResult<TerminationOutcome> {
        let document = match self.store.read(id).await {
            Ok(document) => document,
            Err(StoreError::NotFound { .. }) => return Ok(TerminationOutcome::Untracked),
            Err(err) => return Err(err),
        };

        if document.is_finished() {
            warn!(event_id = id, "no-data observation for an already finished event");
            return Ok(TerminationOutcome::AlreadyFinished);
        }

        let strikes = document.finishing_strikes().saturating_add(1);
        if strikes < self.threshold {
            let updated = match document {
                EventDocument::Snapshot(mut snapshot) => {
                    snapshot.finishing_strikes = strikes;
                    EventDocument::Snapshot(snapshot)
                }
                EventDocument::Pending(mut pending) => {
                    pending.finishing_strikes = Some(strikes);
                    EventDocument::Pending(pending)
                }
            };
            self.store.write(id, updated).await?;
            info!(event_id = id, strikes, "finishing strike recorded");
            return Ok(TerminationOutcome::Strike(strikes));
        }

        match document {
            EventDocument::Snapshot(mut snapshot) => {
                snapshot.finished = true;
                snapshot.finishing_strikes = 0;
                self.store.write(id, snapshot.into()).await?;
                info!(event_id = id, "event finished");
                Ok(TerminationOutcome::Finished)
            }
            EventDocument::Pending(_) => {
                self.store.evict(id).await?;
                info!(event_id = id, "event never produced data; placeholder evicted");
                Ok(TerminationOutcome::Evicted)
            }
        }
    }
}
