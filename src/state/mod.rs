pub mod in_flight;
pub mod update;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::{leaderboard::LeaderboardSource, snapshot_store::SnapshotStore},
    services::{orchestrator::UpdateOrchestrator, sweep::SweepSettings},
};

pub type SharedState = Arc<AppState>;

/// Central application state: configuration, the snapshot store and the update orchestrator.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn SnapshotStore>,
    orchestrator: UpdateOrchestrator,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The orchestrator, and with it the set of in-flight events, is created here once per process.
    pub fn new(
        config: AppConfig,
        source: Arc<dyn LeaderboardSource>,
        store: Arc<dyn SnapshotStore>,
    ) -> SharedState {
        let orchestrator = UpdateOrchestrator::new(source, store.clone(), config.sync_settings());
        Arc::new(Self {
            config,
            store,
            orchestrator,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Store holding one document per event.
    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Orchestrator driving event updates.
    pub fn orchestrator(&self) -> &UpdateOrchestrator {
        &self.orchestrator
    }

    /// Pacing of the background sweep.
    pub fn sweep_settings(&self) -> SweepSettings {
        self.config.sweep_settings()
    }
}
