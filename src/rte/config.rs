use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Tunable thresholds for block detection and efficiency calculation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RteConfig {
    /// Power (MW) a channel must exceed to count as active
    pub activity_threshold: f64,

    /// How long a channel has to stay below the threshold before its block closes
    pub min_stopping_duration_secs: i64,

    /// Continuous parasitic load (MWh per hour of operation)
    pub aux_loss_rate: f64,

    /// How many previous days to scan for a carried-over charging block
    pub lookback_days: u32,
}

impl RteConfig {
    pub fn min_stopping_duration(&self) -> Duration {
        Duration::seconds(self.min_stopping_duration_secs)
    }
}

impl Default for RteConfig {
    fn default() -> Self {
        Self {
            activity_threshold: 10.0,
            min_stopping_duration_secs: 30 * 60,
            aux_loss_rate: 0.058,
            lookback_days: 3,
        }
    }
}
