use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

/// Identifier of a race event; also the cache key.
pub type EventId = u64;

/// Message stored in the bootstrap document written before any data exists.
pub const NO_DATA_YET: &str = "No data yet";

/// Single leaderboard row, stored with the upstream API field names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Entry {
    /// Rank of the driver on this stage leaderboard.
    pub position: u32,
    /// Upstream player identifier.
    pub player_id: u64,
    /// Display name of the driver.
    pub name: String,
    /// Vehicle used for the stage.
    pub vehicle_name: String,
    /// Recorded time, as reported upstream.
    pub time: String,
    /// Gap to the stage leader, as reported upstream.
    pub diff_first: String,
}

/// Aggregated leaderboard of one stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct StageSnapshot {
    /// Number of entries declared by the leaderboard.
    pub total: u32,
    /// Entries of every page, merged in page order.
    pub entries: Vec<Entry>,
    /// Fetch time of each page in milliseconds.
    pub times: Vec<u64>,
}

/// Persisted leaderboard snapshot of a whole event.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventSnapshot {
    /// Event the snapshot belongs to.
    #[schema(value_type = u64)]
    pub id: EventId,
    /// Number of stages reported by the event overview.
    pub stage_count: u32,
    /// One entry per stage, stage 1 first. The overview is never stored here.
    pub stage_data: Vec<StageSnapshot>,
    /// Stage page requests issued while building the snapshot.
    pub request_count: u32,
    /// Sum of every page fetch time in milliseconds.
    pub total_time: u64,
    /// Wall-clock duration of the update in milliseconds.
    #[serde(default)]
    pub actual_time: u64,
    /// RFC 3339 timestamp of the commit.
    #[serde(default)]
    pub cache_time: String,
    /// Set once the upstream stopped publishing the leaderboard.
    #[serde(default)]
    pub finished: bool,
    /// Consecutive "no leaderboard" observations.
    #[serde(default)]
    pub finishing_strikes: u32,
    /// Restart counter per driver name.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub restarters: IndexMap<String, u32>,
    /// Label of the last abandoned update, cleared on the next commit.
    #[serde(default)]
    pub last_error: Option<String>,
}

impl EventSnapshot {
    /// Whether the snapshot carries one stage entry per declared stage.
    pub fn is_complete(&self) -> bool {
        self.stage_data.len() == self.stage_count as usize
    }
}

/// Placeholder stored for an event that has not produced any data yet.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingDocument {
    /// Human readable reason, always [`NO_DATA_YET`] when written by this crate.
    pub error: String,
    /// Set once the event is given up on.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub finished: bool,
    /// Consecutive "no leaderboard" observations.
    #[serde(default)]
    pub finishing_strikes: Option<u32>,
}

impl PendingDocument {
    /// Bootstrap document written on the first request for an unknown event.
    pub fn no_data_yet() -> Self {
        Self {
            error: NO_DATA_YET.to_string(),
            finished: false,
            finishing_strikes: None,
        }
    }
}

/// Any document the snapshot store can hold for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EventDocument {
    /// Real leaderboard data.
    Snapshot(EventSnapshot),
    /// Bootstrap placeholder.
    Pending(PendingDocument),
}

impl EventDocument {
    /// Whether updates for this event have stopped.
    pub fn is_finished(&self) -> bool {
        match self {
            EventDocument::Snapshot(snapshot) => snapshot.finished,
            EventDocument::Pending(pending) => pending.finished,
        }
    }

    /// Current finishing strike count.
    pub fn finishing_strikes(&self) -> u32 {
        match self {
            EventDocument::Snapshot(snapshot) => snapshot.finishing_strikes,
            EventDocument::Pending(pending) => pending.finishing_strikes.unwrap_or_default(),
        }
    }

    /// The snapshot, if this document holds real data.
    pub fn into_snapshot(self) -> Option<EventSnapshot> {
        match self {
            EventDocument::Snapshot(snapshot) => Some(snapshot),
            EventDocument::Pending(_) => None,
        }
    }
}

impl From<EventSnapshot> for EventDocument {
    fn from(value: EventSnapshot) -> Self {
        EventDocument::Snapshot(value)
    }
}

impl From<PendingDocument> for EventDocument {
    fn from(value: PendingDocument) -> Self {
        EventDocument::Pending(value)
    }
}
