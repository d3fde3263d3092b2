use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::dao::{
    leaderboard::OVERVIEW_STAGE,
    models::{Entry, EventId},
};

/// Payload returned by the leaderboard endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResponse {
    /// Required: `0` is the "no leaderboard yet" sentinel, a missing field is a malformed body.
    pub pages: u32,
    #[serde(default)]
    pub total_stages: Option<u32>,
    #[serde(default)]
    pub leaderboard_total: Option<u32>,
    #[serde(default)]
    pub entries: Vec<ApiEntry>,
}

/// Leaderboard row as sent by the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiEntry {
    pub position: u32,
    pub player_id: u64,
    pub name: String,
    #[serde(default)]
    pub vehicle_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub diff_first: String,
}

impl From<ApiEntry> for Entry {
    fn from(value: ApiEntry) -> Self {
        Entry {
            position: value.position,
            player_id: value.player_id,
            name: value.name,
            vehicle_name: value.vehicle_name,
            time: value.time,
            diff_first: value.diff_first,
        }
    }
}

/// Accept times either as strings or as bare numbers.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

/// One page of one stage leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub event: EventId,
    pub stage: u32,
    pub page: u32,
    /// Pages the stage leaderboard spans; `0` means no leaderboard exists yet.
    pub pages: u32,
    /// Stages of the event, only meaningful on the overview (stage 0).
    pub total_stages: u32,
    /// Entries the whole stage leaderboard holds.
    pub total: u32,
    pub entries: Vec<Entry>,
    pub elapsed: Duration,
}

impl RawPage {
    /// Build a page from a decoded API payload.
    ///
    /// A published overview must carry `TotalStages` and a published stage page
    /// must carry `LeaderboardTotal`; the name of the missing field is returned otherwise.
    pub fn from_response(
        event: EventId,
        stage: u32,
        page: u32,
        response: ApiResponse,
        elapsed: Duration,
    ) -> Result<Self, &'static str> {
        let published = response.pages > 0;
        let total_stages = match response.total_stages {
            Some(count) => count,
            None if published && stage == OVERVIEW_STAGE => return Err("TotalStages"),
            None => 0,
        };
        let total = match response.leaderboard_total {
            Some(total) => total,
            None if published && stage != OVERVIEW_STAGE => return Err("LeaderboardTotal"),
            None => 0,
        };

        Ok(Self {
            event,
            stage,
            page,
            pages: response.pages,
            total_stages,
            total,
            entries: response.entries.into_iter().map(Entry::from).collect(),
            elapsed,
        })
    }

    /// Whether the API published a leaderboard for this stage.
    pub fn has_leaderboard(&self) -> bool {
        self.pages > 0
    }

    /// Fetch time in whole milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}
