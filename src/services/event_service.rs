//! Read path of the cache: serve stored snapshots and bootstrap unknown events.

use tracing::{debug, info};

use crate::{
    dao::{
        models::{EventDocument, EventId, EventSnapshot, PendingDocument},
        storage::StoreError,
    },
    error::ServiceError,
    state::SharedState,
};

/// What the cache currently holds for an event.
#[derive(Debug)]
pub enum CachedEvent {
    /// A committed snapshot.
    Ready(Box<EventSnapshot>),
    /// Nothing committed yet; an update is pending or running.
    NotReady,
}

/// Return the cached snapshot of `id`, starting its first update on a miss.
pub async fn get_event(state: &SharedState, id: EventId) -> Result<CachedEvent, ServiceError> {
    if id == 0 {
        return Err(ServiceError::InvalidInput("event id must be positive".into()));
    }

    match state.store().read(id).await {
        Ok(EventDocument::Snapshot(snapshot)) => Ok(CachedEvent::Ready(Box::new(snapshot))),
        Ok(EventDocument::Pending(_)) => Ok(CachedEvent::NotReady),
        Err(StoreError::NotFound { .. }) => bootstrap(state, id).await,
        Err(err) => Err(err.into()),
    }
}

/// Store the placeholder so the sweep knows the event, then fetch it right away.
///
/// The placeholder is only written while holding the event's lease and only if
/// the document is still missing, so a concurrent commit is never overwritten.
async fn bootstrap(state: &SharedState, id: EventId) -> Result<CachedEvent, ServiceError> {
    let lease = match state.orchestrator().in_flight().try_acquire(id) {
        Ok(lease) => lease,
        Err(err) => {
            debug!(event_id = id, error = %err, "first update already running");
            return Ok(CachedEvent::NotReady);
        }
    };

    match state.store().read(id).await {
        Err(StoreError::NotFound { .. }) => {}
        Ok(EventDocument::Snapshot(snapshot)) => {
            return Ok(CachedEvent::Ready(Box::new(snapshot)));
        }
        Ok(EventDocument::Pending(_)) => return Ok(CachedEvent::NotReady),
        Err(err) => return Err(err.into()),
    }

    state
        .store()
        .write(id, PendingDocument::no_data_yet().into())
        .await?;
    info!(event_id = id, "new event requested; first update started");

    drop(state.orchestrator().request_leased(lease));
    Ok(CachedEvent::NotReady)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::snapshot_store::SnapshotStore,
        state::AppState,
        test_support::{ScriptedLeaderboard, snapshot_with_times, temp_store},
    };

    async fn state(
        script: ScriptedLeaderboard,
    ) -> (
        tempfile::TempDir,
        SharedState,
        Arc<dyn SnapshotStore>,
        ScriptedLeaderboard,
    ) {
        let (dir, store) = temp_store().await;
        let store: Arc<dyn SnapshotStore> = Arc::new(store);
        let (source, handle) = script.shared();
        let state = AppState::new(AppConfig::default(), source, store.clone());
        (dir, state, store, handle)
    }

    #[tokio::test]
    async fn zero_id_is_rejected() {
        let (_dir, state, _store, _) = state(ScriptedLeaderboard::new()).await;
        assert!(matches!(
            get_event(&state, 0).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn miss_writes_placeholder_and_starts_an_update() {
        let (_dir, state, store, handle) = state(ScriptedLeaderboard::new()).await;

        assert!(matches!(
            get_event(&state, 12).await.unwrap(),
            CachedEvent::NotReady
        ));
        assert!(store.read(12).await.is_ok());

        for _ in 0..100 {
            if handle.requests() > 0 && state.orchestrator().in_flight().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(handle.requests(), 1);
    }

    #[tokio::test]
    async fn busy_event_gets_no_placeholder() {
        let (_dir, state, store, handle) = state(ScriptedLeaderboard::new()).await;
        let _lease = state.orchestrator().in_flight().try_acquire(13).unwrap();

        assert!(matches!(
            get_event(&state, 13).await.unwrap(),
            CachedEvent::NotReady
        ));
        assert!(store.read(13).await.unwrap_err().is_not_found());
        assert_eq!(handle.requests(), 0);
    }

    #[tokio::test]
    async fn bootstrap_never_replaces_a_committed_snapshot() {
        let (_dir, state, store, handle) = state(ScriptedLeaderboard::new()).await;
        let committed = snapshot_with_times(14, &[&[("Adrien", "03:12.400")]]);
        store.write(14, committed.clone().into()).await.unwrap();

        match bootstrap(&state, 14).await.unwrap() {
            CachedEvent::Ready(snapshot) => assert_eq!(*snapshot, committed),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(
            store.read(14).await.unwrap().into_snapshot(),
            Some(committed)
        );
        assert_eq!(handle.requests(), 0);
        assert!(!state.orchestrator().in_flight().contains(14));
    }
}
