use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct DispatcherConfig {
    /// Capacity of the bounded change queue shared by all channels
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "dispatcher.queue_capacity must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_queue_capacity() -> usize {
    30
}
