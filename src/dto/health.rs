use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("OK" or "degraded").
    pub status: String,
}

impl HealthResponse {
    /// The cache directory is usable.
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
        }
    }

    /// The cache directory cannot be listed.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
        }
    }
}
