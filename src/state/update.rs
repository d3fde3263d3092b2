//! Phases and outcomes of a single event update.

use std::fmt;

use thiserror::Error;

use crate::{dao::models::EventId, services::termination::TerminationOutcome};

/// Lifecycle phases of one update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    /// No run owns the event.
    Idle,
    /// A run holds the lease and is aggregating.
    InFlight,
    /// The aggregated snapshot was stored.
    Committed,
    /// The leaderboard was inconsistent; a fresh cycle is scheduled.
    Retrying,
    /// The cycle ended without a commit.
    Abandoned,
}

impl UpdatePhase {
    /// Whether the phase ends a cycle.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UpdatePhase::Committed | UpdatePhase::Retrying | UpdatePhase::Abandoned
        )
    }

    fn allows(self, next: UpdatePhase) -> bool {
        match self {
            UpdatePhase::Idle => next == UpdatePhase::InFlight,
            UpdatePhase::InFlight => next.is_terminal(),
            UpdatePhase::Committed | UpdatePhase::Retrying | UpdatePhase::Abandoned => false,
        }
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UpdatePhase::Idle => "idle",
            UpdatePhase::InFlight => "in_flight",
            UpdatePhase::Committed => "committed",
            UpdatePhase::Retrying => "retrying",
            UpdatePhase::Abandoned => "abandoned",
        };
        f.write_str(label)
    }
}

/// Error returned when a cycle is moved to a phase it cannot reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid update transition for event {id}: {from} -> {to}")]
pub struct InvalidTransition {
    /// Event of the cycle.
    pub id: EventId,
    /// Phase the cycle was in.
    pub from: UpdatePhase,
    /// Requested phase.
    pub to: UpdatePhase,
}

/// Phase tracker for a single cycle of one event.
#[derive(Debug)]
pub struct UpdateCycle {
    id: EventId,
    attempt: u32,
    phase: UpdatePhase,
}

impl UpdateCycle {
    /// Start tracking a cycle in the idle phase.
    pub fn new(id: EventId, attempt: u32) -> Self {
        Self {
            id,
            attempt,
            phase: UpdatePhase::Idle,
        }
    }

    /// Event of the cycle.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Consecutive attempt number, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Current phase.
    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    /// Move the cycle to `next`.
    pub fn advance(&mut self, next: UpdatePhase) -> Result<(), InvalidTransition> {
        if !self.phase.allows(next) {
            return Err(InvalidTransition {
                id: self.id,
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }
}

/// Why a cycle ended without storing a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    /// The stored document is already finished.
    Finished,
    /// The event has no leaderboard yet; the termination tracker recorded it.
    NoDataYet(TerminationOutcome),
    /// A stage after the first has not published its leaderboard yet.
    StageNotReady {
        /// Stage that was still empty.
        stage: u32,
    },
    /// A page request failed.
    Fetch,
    /// The aggregated snapshot does not cover every declared stage.
    Incomplete,
    /// The snapshot store failed.
    Store,
    /// Too many consecutive inconsistent leaderboards.
    RetriesExhausted,
}

impl AbandonReason {
    /// Client-safe label stored in `lastError`.
    pub fn label(&self) -> Option<String> {
        match self {
            AbandonReason::StageNotReady { stage } => Some(format!("stage {stage} not ready")),
            AbandonReason::Fetch => Some("leaderboard unavailable".to_string()),
            AbandonReason::Incomplete => Some("leaderboard incomplete".to_string()),
            AbandonReason::RetriesExhausted => Some("leaderboard inconsistent".to_string()),
            AbandonReason::Finished | AbandonReason::NoDataYet(_) | AbandonReason::Store => None,
        }
    }
}

/// Terminal result of one update cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The snapshot was stored.
    Committed {
        /// Stages in the stored snapshot.
        stage_count: u32,
        /// Page requests issued.
        request_count: u32,
        /// Drivers newly flagged as restarters.
        new_restarts: usize,
    },
    /// A fresh cycle was scheduled after an inconsistent leaderboard.
    Retrying {
        /// Attempt number of the scheduled cycle.
        next_attempt: u32,
        /// Stage that failed validation.
        stage: u32,
        /// Validation failure.
        reason: String,
    },
    /// The cycle ended without a commit.
    Abandoned(AbandonReason),
}

impl UpdateOutcome {
    /// Terminal phase matching the outcome.
    pub fn phase(&self) -> UpdatePhase {
        match self {
            UpdateOutcome::Committed { .. } => UpdatePhase::Committed,
            UpdateOutcome::Retrying { .. } => UpdatePhase::Retrying,
            UpdateOutcome::Abandoned(_) => UpdatePhase::Abandoned,
        }
    }
}
