//! Error types raised while talking to the leaderboard API.

use thiserror::Error;

use crate::dao::models::EventId;

/// Convenient result alias returning [`FetchError`] failures.
pub type FetchResult<T> = Result<T, FetchError>;

/// Failures of a single page request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build leaderboard client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent, timed out, returned an error status or
    /// its body was cut short.
    #[error("leaderboard request failed for event {event} stage {stage} page {page}")]
    Transport {
        event: EventId,
        stage: u32,
        page: u32,
        #[source]
        source: reqwest::Error,
    },
    /// The body was not the expected JSON document.
    #[error("malformed leaderboard payload for event {event} stage {stage} page {page}")]
    Parse {
        event: EventId,
        stage: u32,
        page: u32,
        #[source]
        source: serde_json::Error,
    },
    /// The body parsed but lacks a field the page kind requires.
    #[error(
        "leaderboard payload for event {event} stage {stage} page {page} lacks `{field}`"
    )]
    MissingField {
        event: EventId,
        stage: u32,
        page: u32,
        field: &'static str,
    },
}
