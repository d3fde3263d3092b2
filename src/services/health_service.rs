use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the cache directory can still be listed.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().list_known_ids().await {
        Ok(_) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "snapshot store health check failed");
            HealthResponse::degraded()
        }
    }
}
