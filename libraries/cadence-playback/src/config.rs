//! Engine configuration

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Trailing-edge debounce for jump-queue removals
    #[serde(default = "default_removal_debounce_ms")]
    pub removal_debounce_ms: u64,

    /// `skip_prev` restarts the current track past this many seconds
    #[serde(default = "default_restart_threshold_secs")]
    pub restart_threshold_secs: u64,

    /// Keep `RepeatOne` when the user skips manually
    #[serde(default)]
    pub repeat_one_on_skip: bool,

    #[serde(default = "default_recent_list_size")]
    pub recent_list_size: usize,

    /// Capacity of the command channel
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    /// Capacity of the event broadcast channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Maximum entries in the published upcoming list
    #[serde(default = "default_queue_list_limit")]
    pub queue_list_limit: usize,

    /// Key of the persisted queue
    #[serde(default = "default_state_key")]
    pub state_key: String,

    /// Key of the persisted recent list
    #[serde(default = "default_recent_key")]
    pub recent_key: String,
}

impl EngineConfig {
    /// Load configuration from an optional TOML file and the environment
    ///
    /// `CADENCE_*` variables override file values, e.g.
    /// `CADENCE_REMOVAL_DEBOUNCE_MS=300`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if path.exists() {
                settings = settings.add_source(config::File::from(path));
            } else {
                tracing::warn!("Config file {:?} not found, using defaults", path);
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("CADENCE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.command_buffer == 0 {
            return Err(PlaybackError::Config(
                "command_buffer must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer == 0 {
            return Err(PlaybackError::Config(
                "event_buffer must be greater than 0".to_string(),
            ));
        }

        if self.state_key.is_empty() || self.recent_key.is_empty() {
            return Err(PlaybackError::Config(
                "storage keys must not be empty".to_string(),
            ));
        }

        if self.state_key == self.recent_key {
            return Err(PlaybackError::Config(format!(
                "state_key and recent_key must differ (both {:?})",
                self.state_key
            )));
        }

        Ok(())
    }

    pub fn removal_debounce(&self) -> Duration {
        Duration::from_millis(self.removal_debounce_ms)
    }

    pub fn restart_threshold(&self) -> Duration {
        Duration::from_secs(self.restart_threshold_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            removal_debounce_ms: default_removal_debounce_ms(),
            restart_threshold_secs: default_restart_threshold_secs(),
            repeat_one_on_skip: false,
            recent_list_size: default_recent_list_size(),
            command_buffer: default_command_buffer(),
            event_buffer: default_event_buffer(),
            queue_list_limit: default_queue_list_limit(),
            state_key: default_state_key(),
            recent_key: default_recent_key(),
        }
    }
}

// Default values
fn default_removal_debounce_ms() -> u64 {
    150
}

fn default_restart_threshold_secs() -> u64 {
    10
}

fn default_recent_list_size() -> usize {
    20
}

fn default_command_buffer() -> usize {
    64
}

fn default_event_buffer() -> usize {
    128
}

fn default_queue_list_limit() -> usize {
    100
}

fn default_state_key() -> String {
    "cadence::playback-store".to_string()
}

fn default_recent_key() -> String {
    "cadence::recent-list-store".to_string()
}
