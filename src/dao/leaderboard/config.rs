use std::time::Duration;

/// Endpoint serving the public event leaderboards.
pub const DEFAULT_ENDPOINT: &str = "https://www.dirtgame.com/uk/api/event";
/// Upper bound for a single page request, including reading the body.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Runtime configuration describing how to reach the leaderboard API.
#[derive(Debug, Clone)]
pub struct LeaderboardConfig {
    pub endpoint: String,
    pub request_timeout: Duration,
}

impl LeaderboardConfig {
    /// Construct a configuration for an explicit endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}
