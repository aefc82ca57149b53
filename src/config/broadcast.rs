use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::MAX_MESSAGE_SIZE;

/// Controls how local mutations are pushed to the transport
///
/// ```toml
/// [broadcast]
/// enabled = true
/// max_message_size = 2000000
/// default_target = "/eos/*"
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BroadcastConfig {
    /// Initial value of the registry-wide broadcast flag.
    ///
    /// When `false`, mutations only touch the local store and no wire
    /// message is produced until broadcasting is switched back on.
    #[serde(default = "default_broadcast_enabled")]
    pub enabled: bool,

    /// Encoded message size above which a transaction is flushed one key per message
    ///
    /// Range: 1 - 2,000,000 bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Broadcast target assigned to subjects created with an empty target
    #[serde(default = "default_target")]
    pub default_target: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            enabled: default_broadcast_enabled(),
            max_message_size: default_max_message_size(),
            default_target: default_target(),
        }
    }
}

impl BroadcastConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 || self.max_message_size > MAX_MESSAGE_SIZE {
            return Err(Error::Config(ConfigError::Message(format!(
                "max_message_size must be within 1..={MAX_MESSAGE_SIZE}, got {}",
                self.max_message_size
            ))));
        }

        if self.default_target.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "default_target cannot be empty".into(),
            )));
        }

        Ok(())
    }
}

fn default_broadcast_enabled() -> bool {
    true
}
fn default_max_message_size() -> usize {
    MAX_MESSAGE_SIZE
}
fn default_target() -> String {
    "/eos/*".to_string()
}
