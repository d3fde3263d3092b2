use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification of the rally leaderboard cache.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::events::get_event,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::event::NotReadyResponse,
            crate::dao::models::EventSnapshot,
            crate::dao::models::StageSnapshot,
            crate::dao::models::Entry,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "events", description = "Cached event leaderboards"),
    )
)]
pub struct ApiDoc;
