use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::dao::models::{EventId, NO_DATA_YET};

/// Path parameters of the event route.
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct EventPath {
    /// Event identifier.
    #[validate(range(min = 1))]
    #[param(value_type = u64, minimum = 1)]
    pub id: EventId,
}

/// Body returned while an event has no cached leaderboard yet.
#[derive(Debug, Serialize, ToSchema)]
pub struct NotReadyResponse {
    /// Always "No data yet".
    pub error: String,
}

impl NotReadyResponse {
    /// Payload for an event whose first update has not committed yet.
    pub fn no_data_yet() -> Self {
        Self {
            error: NO_DATA_YET.to_string(),
        }
    }
}
