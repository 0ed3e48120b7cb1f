use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ForwarderConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Events beyond this many pending ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Marker written before every encoded packet so hosts can tell event
    /// lines apart from ordinary log output
    #[serde(default = "default_line_prefix")]
    pub line_prefix: String,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_capacity: default_queue_capacity(),
            line_prefix: default_line_prefix(),
        }
    }
}

impl ForwarderConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "forwarder.queue_capacity must be greater than 0".into(),
            )));
        }
        if self.line_prefix.is_empty() || self.line_prefix.contains('\n') {
            return Err(Error::Config(ConfigError::Message(
                "forwarder.line_prefix must be a non-empty single line".into(),
            )));
        }
        Ok(())
    }
}

fn default_queue_capacity() -> usize {
    30
}
fn default_line_prefix() -> String {
    "@CHANBUS:".to_string()
}
