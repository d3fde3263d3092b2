//! Multi-stage, multi-page collection of one event leaderboard.

use std::{collections::HashSet, sync::Arc, time::Duration};

use futures::future::try_join_all;
use indexmap::IndexMap;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

use crate::dao::{
    leaderboard::{FetchError, LeaderboardSource, OVERVIEW_STAGE, RawPage},
    models::{EventId, EventSnapshot, StageSnapshot},
};

/// Reasons an aggregation produced no snapshot.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// The event has not published any leaderboard yet.
    #[error("event has no leaderboard yet")]
    NoDataYet,
    /// A stage after the first has not published its leaderboard yet.
    #[error("stage {stage} has no leaderboard yet")]
    StageNotReady {
        /// Stage that was still empty.
        stage: u32,
    },
    /// The collected pages are structurally inconsistent.
    #[error("stage {stage} is inconsistent: {reason}")]
    Invalid {
        /// Offending stage.
        stage: u32,
        /// What did not add up.
        reason: String,
    },
    /// A page request failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl AggregationError {
    fn invalid(stage: u32, reason: impl Into<String>) -> Self {
        AggregationError::Invalid {
            stage,
            reason: reason.into(),
        }
    }
}

/// What the overview page tells about the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverviewResult {
    /// Number of stages to collect.
    pub stage_count: u32,
    /// Time spent fetching the overview.
    pub elapsed: Duration,
}

/// Every page of one stage, in page order.
#[derive(Debug)]
struct StagePages {
    stage: u32,
    pages: Vec<RawPage>,
}

/// Drives overview, stage and page fetches for one event and validates the result.
#[derive(Clone)]
pub struct StageAggregator {
    source: Arc<dyn LeaderboardSource>,
    stage_stagger: Duration,
}

impl StageAggregator {
    /// Create an aggregator delaying each successive stage dispatch by `stage_stagger`.
    pub fn new(source: Arc<dyn LeaderboardSource>, stage_stagger: Duration) -> Self {
        Self {
            source,
            stage_stagger,
        }
    }

    /// Collect every stage of the event into a validated snapshot draft.
    ///
    /// The draft has no restart counters and no commit timestamps yet.
    pub async fn aggregate(&self, event: EventId) -> Result<EventSnapshot, AggregationError> {
        let overview = self.fetch_overview(event).await?;
        debug!(
            event_id = event,
            stage_count = overview.stage_count,
            "event overview fetched"
        );

        let stages = try_join_all((1..=overview.stage_count).map(|stage| {
            let delay = self.stage_stagger * (stage - 1);
            self.fetch_stage(event, stage, delay)
        }))
        .await?;

        build_snapshot(event, overview, stages)
    }

    async fn fetch_overview(&self, event: EventId) -> Result<OverviewResult, AggregationError> {
        let page = self.source.fetch_page(event, OVERVIEW_STAGE, 1).await?;
        if !page.has_leaderboard() {
            return Err(AggregationError::NoDataYet);
        }
        // a published board always has stages; zero would commit an empty snapshot
        if page.total_stages == 0 {
            return Err(AggregationError::invalid(
                OVERVIEW_STAGE,
                "overview reports no stages",
            ));
        }
        Ok(OverviewResult {
            stage_count: page.total_stages,
            elapsed: page.elapsed,
        })
    }

    /// Fetch page 1 of a stage, then every further page concurrently.
    async fn fetch_stage(
        &self,
        event: EventId,
        stage: u32,
        delay: Duration,
    ) -> Result<StagePages, AggregationError> {
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let first = self.source.fetch_page(event, stage, 1).await?;
        if !first.has_leaderboard() {
            return Err(if stage == 1 {
                AggregationError::NoDataYet
            } else {
                AggregationError::StageNotReady { stage }
            });
        }

        let page_count = first.pages;
        let mut pages = vec![first];
        if page_count > 1 {
            let rest = try_join_all(
                (2..=page_count).map(|page| self.source.fetch_page(event, stage, page)),
            )
            .await?;
            if rest.iter().any(|page| !page.has_leaderboard()) {
                return Err(AggregationError::StageNotReady { stage });
            }
            pages.extend(rest);
        }

        debug!(event_id = event, stage, pages = page_count, "stage fetched");
        Ok(StagePages { stage, pages })
    }
}

fn build_snapshot(
    event: EventId,
    overview: OverviewResult,
    stages: Vec<StagePages>,
) -> Result<EventSnapshot, AggregationError> {
    let request_count: u32 = stages.iter().map(|stage| stage.pages.len() as u32).sum();
    let total_time: u64 = stages
        .iter()
        .flat_map(|stage| stage.pages.iter())
        .map(RawPage::elapsed_ms)
        .sum();

    let stage_data = stages
        .into_iter()
        .map(merge_stage)
        .collect::<Result<Vec<_>, _>>()?;
    validate_stages(&stage_data)?;

    Ok(EventSnapshot {
        id: event,
        stage_count: overview.stage_count,
        stage_data,
        request_count,
        total_time,
        actual_time: 0,
        cache_time: String::new(),
        finished: false,
        finishing_strikes: 0,
        restarters: IndexMap::new(),
        last_error: None,
    })
}

/// Merge the pages of one stage, dropping rows repeated across page boundaries.
fn merge_stage(stage: StagePages) -> Result<StageSnapshot, AggregationError> {
    let StagePages { stage, pages } = stage;
    let (page_count, total) = (pages[0].pages, pages[0].total);

    for page in &pages[1..] {
        if page.pages != page_count {
            return Err(AggregationError::invalid(
                stage,
                format!(
                    "page {} reports {} pages but page 1 reported {page_count}",
                    page.page, page.pages
                ),
            ));
        }
        if page.total != total {
            return Err(AggregationError::invalid(
                stage,
                format!(
                    "page {} reports {} entries but page 1 reported {total}",
                    page.page, page.total
                ),
            ));
        }
    }

    let times = pages.iter().map(RawPage::elapsed_ms).collect();
    let mut seen = HashSet::new();
    let entries = pages
        .into_iter()
        .flat_map(|page| page.entries)
        .filter(|entry| seen.insert(entry.player_id))
        .collect();

    Ok(StageSnapshot {
        total,
        entries,
        times,
    })
}

/// Check the structural invariants of aggregated stages, stage 1 first.
///
/// Every stage must hold exactly the entries it declares, must not declare
/// fewer than stage 1 and must not declare more than the stage before it.
pub fn validate_stages(stages: &[StageSnapshot]) -> Result<(), AggregationError> {
    let Some(first) = stages.first() else {
        return Ok(());
    };

    let mut previous_total = first.total;
    for (index, snapshot) in stages.iter().enumerate() {
        let stage = index as u32 + 1;

        if snapshot.entries.len() != snapshot.total as usize {
            return Err(AggregationError::invalid(
                stage,
                format!(
                    "holds {} entries but declares {}",
                    snapshot.entries.len(),
                    snapshot.total
                ),
            ));
        }
        if snapshot.total < first.total {
            return Err(AggregationError::invalid(
                stage,
                format!(
                    "declares {} entries, fewer than stage 1 ({})",
                    snapshot.total, first.total
                ),
            ));
        }
        if stage > 1 && snapshot.total > previous_total {
            return Err(AggregationError::invalid(
                stage,
                format!(
                    "declares {} entries, more than stage {} ({previous_total})",
                    snapshot.total,
                    stage - 1
                ),
            ));
        }

        previous_total = snapshot.total;
    }

    Ok(())
}
