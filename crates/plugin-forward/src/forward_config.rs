use core::time::Duration;

use plugin_core::PluginSpec;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_BASE_DELAY_SECS: f64 = 0.9;
const DEFAULT_FAIL_DELAY_SECS: f64 = 1.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Pause after every successful copy.
    pub base_delay_secs: f64,
    /// Pause after every failed copy.
    pub fail_delay_secs: f64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: DEFAULT_BASE_DELAY_SECS,
            fail_delay_secs: DEFAULT_FAIL_DELAY_SECS,
        }
    }
}

impl ForwardConfig {
    pub fn from_spec(spec: &PluginSpec) -> Self {
        if spec.config.is_null() {
            return Self::default();
        }
        match serde_yaml::from_value::<Self>(spec.config.clone()) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(plugin = %spec.id, error = %err, "Failed to parse forward config, using defaults");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        secs_or(self.base_delay_secs, DEFAULT_BASE_DELAY_SECS)
    }

    #[must_use]
    pub fn fail_delay(&self) -> Duration {
        secs_or(self.fail_delay_secs, DEFAULT_FAIL_DELAY_SECS)
    }
}

// Negative or non-finite values fall back to the default.
fn secs_or(secs: f64, default: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or_else(|_| Duration::from_secs_f64(default))
}
