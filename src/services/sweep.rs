//! Periodic refresh of every cached event that is still live.

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior, sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::{models::EventId, storage::StoreError, storage::StoreResult},
    services::orchestrator::UpdateOrchestrator,
    state::SharedState,
};

/// Pacing of the background sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSettings {
    /// Time between two sweeps; the first sweep starts immediately.
    pub interval: Duration,
    /// Pause between two update starts within one sweep.
    pub inter_event_delay: Duration,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            inter_event_delay: Duration::from_secs(2),
        }
    }
}

/// What a single sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Events an update was started for.
    pub requested: Vec<EventId>,
    /// Events skipped because they are finished.
    pub finished: usize,
    /// Events skipped because an update was already running.
    pub busy: usize,
    /// Events skipped because their document could not be read.
    pub unreadable: usize,
}

/// Sweep forever on the configured interval.
pub async fn run(state: SharedState) {
    let settings = state.sweep_settings();
    let mut ticker = time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match sweep_once(state.orchestrator(), settings.inter_event_delay).await {
            Ok(report) => info!(
                requested = report.requested.len(),
                finished = report.finished,
                busy = report.busy,
                unreadable = report.unreadable,
                "sweep completed"
            ),
            Err(err) => warn!(error = %err, "sweep skipped; cannot list cached events"),
        }
    }
}

/// Start an update for every known event that is not finished.
///
/// Corrupt documents are updated anyway so a fresh snapshot can replace them.
pub async fn sweep_once(
    orchestrator: &UpdateOrchestrator,
    inter_event_delay: Duration,
) -> StoreResult<SweepReport> {
    let ids = orchestrator.store().list_known_ids().await?;
    let mut report = SweepReport::default();

    for id in ids {
        match orchestrator.store().read(id).await {
            Ok(document) if document.is_finished() => {
                report.finished += 1;
                continue;
            }
            Ok(_) | Err(StoreError::Corrupt { .. }) => {}
            Err(err) => {
                warn!(event_id = id, error = %err, "cached document unreadable; not refreshed");
                report.unreadable += 1;
                continue;
            }
        }

        if !report.requested.is_empty() && !inter_event_delay.is_zero() {
            sleep(inter_event_delay).await;
        }
        match orchestrator.request(id) {
            Ok(_) => report.requested.push(id),
            Err(err) => {
                debug!(event_id = id, error = %err, "refresh skipped");
                report.busy += 1;
            }
        }
    }

    Ok(report)
}
