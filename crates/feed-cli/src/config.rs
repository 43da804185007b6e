//! Configuration loading and management.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use feed_core::DEFAULT_WINDOW_CAPACITY;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Publisher endpoint a subscriber connects to.
    pub address: String,
    /// Endpoint a publisher binds.
    pub bind_address: String,
    /// Directory holding the `<topic>_log.txt` files.
    pub log_dir: PathBuf,
    /// How long the network worker waits for a message per poll.
    pub poll_timeout_ms: u64,
    /// Pause between dashboard frames.
    pub frame_interval_ms: u64,
    /// How long shutdown waits for the network worker.
    pub join_timeout_ms: u64,
    /// Number of recent messages kept on screen.
    pub window_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "tcp://localhost:5555".to_string(),
            bind_address: "tcp://*:5555".to_string(),
            log_dir: PathBuf::from("."),
            poll_timeout_ms: 100,
            frame_interval_ms: 50,
            join_timeout_ms: 1000,
            window_capacity: DEFAULT_WINDOW_CAPACITY.get(),
        }
    }
}

/// Runtime settings for a subscriber session, derived from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub poll_timeout: Duration,
    pub frame_interval: Duration,
    pub join_timeout: Duration,
    pub window_capacity: NonZeroUsize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Config::default()
            .session_settings()
            .unwrap_or(Self {
                poll_timeout: Duration::from_millis(100),
                frame_interval: Duration::from_millis(50),
                join_timeout: Duration::from_secs(1),
                window_capacity: DEFAULT_WINDOW_CAPACITY,
            })
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (FEED_*)
        figment = figment.merge(Env::prefixed("FEED_"));

        figment.extract()
    }

    /// Checks values that would make a session unusable.
    pub fn validate(&self) -> Result<()> {
        self.session_settings().map(|_| ())
    }

    pub fn session_settings(&self) -> Result<SessionSettings> {
        let positive = |name: &str, ms: u64| -> Result<Duration> {
            if ms == 0 {
                bail!("{name} must be greater than zero");
            }
            Ok(Duration::from_millis(ms))
        };
        let Some(window_capacity) = NonZeroUsize::new(self.window_capacity) else {
            bail!("window_capacity must be greater than zero");
        };
        Ok(SessionSettings {
            poll_timeout: positive("poll_timeout_ms", self.poll_timeout_ms)?,
            frame_interval: positive("frame_interval_ms", self.frame_interval_ms)?,
            join_timeout: positive("join_timeout_ms", self.join_timeout_ms)?,
            window_capacity,
        })
    }
}

/// Returns the platform-specific config directory for feed.
///
/// On Linux: `~/.config/feed`
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("feed"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_dirs_config_path_ends_with_feed() {
        let path = dirs_config_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "feed");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        let settings = config.session_settings().unwrap();
        assert_eq!(settings.poll_timeout, Duration::from_millis(100));
        assert_eq!(settings.frame_interval, Duration::from_millis(50));
        assert_eq!(settings.window_capacity.get(), 10);
        assert_eq!(SessionSettings::default(), settings);
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
address = "tcp://feed.example:7000"
window_capacity = 25
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.address, "tcp://feed.example:7000");
        assert_eq!(config.window_capacity, 25);
        assert_eq!(config.bind_address, "tcp://*:5555");
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = Config {
            poll_timeout_ms: 0,
            ..Config::default()
        };
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "poll_timeout_ms must be greater than zero"
        );

        let config = Config {
            window_capacity: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
