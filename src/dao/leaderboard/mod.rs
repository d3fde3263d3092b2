mod client;
mod config;
mod error;
mod models;

pub use client::HttpLeaderboardClient;
pub use config::{DEFAULT_ENDPOINT, LeaderboardConfig};
pub use error::{FetchError, FetchResult};
pub use models::RawPage;

use futures::future::BoxFuture;

use crate::dao::models::EventId;

/// Stage index of the event overview page.
pub const OVERVIEW_STAGE: u32 = 0;

/// Source of leaderboard pages for an event.
pub trait LeaderboardSource: Send + Sync {
    /// Fetch one page of one stage. `stage == 0` is the event overview.
    fn fetch_page(
        &self,
        event: EventId,
        stage: u32,
        page: u32,
    ) -> BoxFuture<'static, FetchResult<RawPage>>;
}
