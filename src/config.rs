//! Application-level configuration loading: listen port, cache location, upstream API and sync pacing.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    dao::leaderboard::{DEFAULT_ENDPOINT, LeaderboardConfig},
    services::{orchestrator::SyncSettings, sweep::SweepSettings},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "RALLY_CACHE_CONFIG_PATH";
/// Environment variable that overrides the configured port.
const PORT_ENV: &str = "PORT";

const DEFAULT_PORT: u16 = 3021;
const DEFAULT_CACHE_DIR: &str = "cache";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    port: u16,
    cache_dir: PathBuf,
    api: LeaderboardConfig,
    sync: SyncSettings,
    sweep: SweepSettings,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults, then apply `PORT`.
    pub fn load() -> Self {
        let mut config = Self::load_from(&resolve_config_path());
        if let Some(port) = env::var(PORT_ENV)
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
        {
            config.port = port;
        }
        config
    }

    /// Load the configuration file at `path` without looking at the environment.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        cache_dir = %app_config.cache_dir.display(),
                        endpoint = %app_config.api.endpoint,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Port the HTTP server listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Directory holding one JSON document per event.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Upstream leaderboard API settings.
    pub fn api(&self) -> &LeaderboardConfig {
        &self.api
    }

    /// Update cycle pacing.
    pub fn sync_settings(&self) -> SyncSettings {
        self.sync
    }

    /// Background sweep pacing.
    pub fn sweep_settings(&self) -> SweepSettings {
        self.sweep
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    port: u16,
    cache_dir: PathBuf,
    api: RawApi,
    sync: RawSync,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            api: RawApi::default(),
            sync: RawSync::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// Upstream API section.
struct RawApi {
    endpoint: String,
    request_timeout_ms: u64,
}

impl Default for RawApi {
    fn default() -> Self {
        let defaults = LeaderboardConfig::default();
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_ms: u64::try_from(defaults.request_timeout.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// Sync pacing section; durations are in milliseconds unless the name says otherwise.
struct RawSync {
    sweep_interval_secs: u64,
    inter_event_delay_ms: u64,
    stage_stagger_ms: u64,
    retry_delay_ms: u64,
    max_invalid_retries: u32,
    finishing_strikes: u32,
}

impl Default for RawSync {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30 * 60,
            inter_event_delay_ms: 2_000,
            stage_stagger_ms: 250,
            retry_delay_ms: 10_000,
            max_invalid_retries: 5,
            finishing_strikes: 3,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let RawConfig {
            port,
            cache_dir,
            api,
            sync,
        } = value;

        Self {
            port,
            cache_dir,
            api: LeaderboardConfig::new(api.endpoint)
                .with_timeout(Duration::from_millis(api.request_timeout_ms)),
            sync: SyncSettings {
                stage_stagger: Duration::from_millis(sync.stage_stagger_ms),
                retry_delay: Duration::from_millis(sync.retry_delay_ms),
                max_invalid_retries: sync.max_invalid_retries,
                finishing_strikes: sync.finishing_strikes,
            },
            sweep: SweepSettings {
                // a zero period would make the interval timer panic
                interval: Duration::from_secs(sync.sweep_interval_secs.max(1)),
                inter_event_delay: Duration::from_millis(sync.inter_event_delay_ms),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.json"));

        assert_eq!(config.port(), 3021);
        assert_eq!(config.cache_dir(), Path::new("cache"));
        assert_eq!(config.api().endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.api().request_timeout, Duration::from_secs(15));
        assert_eq!(config.sync_settings(), SyncSettings::default());
        assert_eq!(config.sweep_settings(), SweepSettings::default());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        fs::write(
            &path,
            r#"{"cache_dir": "/srv/rally", "sync": {"retry_delay_ms": 500, "finishing_strikes": 4}}"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.port(), 3021);
        assert_eq!(config.cache_dir(), Path::new("/srv/rally"));
        assert_eq!(config.sync_settings().retry_delay, Duration::from_millis(500));
        assert_eq!(config.sync_settings().finishing_strikes, 4);
        assert_eq!(config.sync_settings().max_invalid_retries, 5);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        fs::write(&path, "port = 80").unwrap();

        assert_eq!(AppConfig::load_from(&path).port(), 3021);
    }
}
