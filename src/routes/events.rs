use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use validator::Validate;

use crate::{
    dao::models::EventSnapshot,
    dto::event::{EventPath, NotReadyResponse},
    error::AppError,
    services::event_service::{self, CachedEvent},
    state::SharedState,
};

/// Cached leaderboard lookups.
pub fn router() -> Router<SharedState> {
    Router::new().route("/{id}", get(get_event))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "events",
    params(EventPath),
    responses(
        (status = 200, description = "Cached leaderboard snapshot", body = EventSnapshot),
        (status = 202, description = "No data cached yet; an update is pending", body = NotReadyResponse),
        (status = 400, description = "Invalid event id"),
        (status = 500, description = "Cached data unavailable")
    )
)]
/// Return the cached leaderboard of an event, scheduling its first update on a miss.
pub async fn get_event(
    State(state): State<SharedState>,
    Path(path): Path<EventPath>,
) -> Result<Response, AppError> {
    path.validate()?;

    let response = match event_service::get_event(&state, path.id).await? {
        CachedEvent::Ready(snapshot) => Json(*snapshot).into_response(),
        CachedEvent::NotReady => {
            (StatusCode::ACCEPTED, Json(NotReadyResponse::no_data_yet())).into_response()
        }
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::sleep;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{EventDocument, PendingDocument},
            snapshot_store::SnapshotStore,
        },
        state::AppState,
        test_support::{ScriptedLeaderboard, snapshot_with_times, temp_store},
    };

    async fn state(
        script: ScriptedLeaderboard,
    ) -> (tempfile::TempDir, SharedState, Arc<dyn SnapshotStore>) {
        let (dir, store) = temp_store().await;
        let store: Arc<dyn SnapshotStore> = Arc::new(store);
        let (source, _) = script.shared();
        let state = AppState::new(AppConfig::default(), source, store.clone());
        (dir, state, store)
    }

    async fn get(state: &SharedState, id: u64) -> Response {
        match get_event(State(state.clone()), Path(EventPath { id })).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }

    #[tokio::test]
    async fn stored_snapshot_is_served() {
        let (_dir, state, store) = state(ScriptedLeaderboard::new()).await;
        store
            .write(3, snapshot_with_times(3, &[&[("Mikk", "03:58.120")]]).into())
            .await
            .unwrap();

        assert_eq!(get(&state, 3).await.status(), StatusCode::OK);
        assert!(state.orchestrator().in_flight().is_empty());
    }

    #[tokio::test]
    async fn pending_document_answers_accepted() {
        let (_dir, state, store) = state(ScriptedLeaderboard::new()).await;
        store
            .write(4, PendingDocument::no_data_yet().into())
            .await
            .unwrap();

        assert_eq!(get(&state, 4).await.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn miss_bootstraps_and_first_update_commits() {
        let script = ScriptedLeaderboard::new()
            .overview(1)
            .generated_stage(1, &[3]);
        let (_dir, state, store) = state(script).await;

        assert_eq!(get(&state, 91822).await.status(), StatusCode::ACCEPTED);

        for _ in 0..100 {
            if state.orchestrator().in_flight().is_empty() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(matches!(
            store.read(91822).await.unwrap(),
            EventDocument::Snapshot(_)
        ));
        assert_eq!(get(&state, 91822).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn corrupt_document_is_an_internal_error() {
        let (dir, state, _store) = state(ScriptedLeaderboard::new()).await;
        std::fs::write(dir.path().join("cache").join("5.json"), b"[1, 2").unwrap();

        assert_eq!(
            get(&state, 5).await.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn zero_id_is_rejected() {
        let (_dir, state, store) = state(ScriptedLeaderboard::new()).await;

        assert_eq!(get(&state, 0).await.status(), StatusCode::BAD_REQUEST);
        assert!(store.list_known_ids().await.unwrap().is_empty());
    }
}
