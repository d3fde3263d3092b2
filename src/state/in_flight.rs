//! Mutual exclusion gate making sure a single update runs per event.

use std::sync::Arc;

use dashmap::DashSet;
use thiserror::Error;

use crate::dao::models::EventId;

/// Rejection returned when an update is requested for an event already being updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConcurrencyError {
    /// Another run owns the event until it reaches a terminal state.
    #[error("an update for event {0} is already in flight")]
    AlreadyInFlight(EventId),
}

/// Set of events currently under synchronization.
#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    ids: Arc<DashSet<EventId>>,
}

impl InFlightSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the event, failing if another run already holds it.
    ///
    /// The returned lease releases the event when dropped, whichever way the
    /// owning run terminates.
    pub fn try_acquire(&self, id: EventId) -> Result<InFlightLease, ConcurrencyError> {
        if self.ids.insert(id) {
            Ok(InFlightLease {
                ids: Arc::clone(&self.ids),
                id,
            })
        } else {
            Err(ConcurrencyError::AlreadyInFlight(id))
        }
    }

    /// Whether an update for the event is currently running.
    pub fn contains(&self, id: EventId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of events being updated.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no update is running.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Exclusive claim on an event, released on drop.
#[derive(Debug)]
pub struct InFlightLease {
    ids: Arc<DashSet<EventId>>,
    id: EventId,
}

impl InFlightLease {
    /// Event this lease protects.
    pub fn id(&self) -> EventId {
        self.id
    }
}

impl Drop for InFlightLease {
    fn drop(&mut self) {
        self.ids.remove(&self.id);
    }
}
