use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Channel;

/// A maximal interval of sustained activity on one channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    #[serde(rename = "type")]
    pub channel: Channel,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Moment the signal first fell below the threshold, if it did.
    pub first_drop: Option<DateTime<Utc>>,
    /// Set when the opposite channel was active at the same time.
    pub simultaneous: bool,
}

impl Block {
    pub fn is_charging(&self) -> bool {
        self.channel == Channel::Charging
    }

    pub fn is_discharging(&self) -> bool {
        self.channel == Channel::Discharging
    }
}
