use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Wait bounds applied by the access gate
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct GateConfig {
    /// Maximum wait for a channel lock in get/set before reporting `Busy`
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Maximum wait for a slot in the notification queue before reporting
    /// `QueueTimeout`
    #[serde(default = "default_notify_timeout_ms")]
    pub notify_timeout_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            notify_timeout_ms: default_notify_timeout_ms(),
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "gate.lock_timeout_ms must be greater than 0".into(),
            )));
        }
        if self.notify_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "gate.notify_timeout_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}

fn default_lock_timeout_ms() -> u64 {
    200
}
fn default_notify_timeout_ms() -> u64 {
    500
}
