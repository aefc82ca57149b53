use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Change notification settings
///
/// ```toml
/// [notify]
/// enabled = true
/// event_queue_size = 0
/// fetch_timeout_ms = 5000
/// track_strict_values = true
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotifyConfig {
    /// Post notifications into the registry event queue at all
    #[serde(default = "default_notify_enabled")]
    pub enabled: bool,

    /// Capacity of the registry event queue
    ///
    /// `0` means unbounded. With a bound, events posted while the queue is
    /// full are dropped and counted in `shared_events_dropped`.
    #[serde(default)]
    pub event_queue_size: usize,

    /// Default wait used by `SubscriberHandle::fetch_default`
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Keep the last seen value of every modified key so that
    /// strict-modification subscriptions can be served
    #[serde(default = "default_track_strict_values")]
    pub track_strict_values: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: default_notify_enabled(),
            event_queue_size: 0,
            fetch_timeout_ms: default_fetch_timeout_ms(),
            track_strict_values: default_track_strict_values(),
        }
    }
}

impl NotifyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "fetch_timeout_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn default_notify_enabled() -> bool {
    true
}
// in ms
fn default_fetch_timeout_ms() -> u64 {
    5000
}
fn default_track_strict_values() -> bool {
    true
}
