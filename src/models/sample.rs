use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two power signals the scanner correlates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Charging,
    Discharging,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Charging => "charging",
            Channel::Discharging => "discharging",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// One timestamp of the merged stream. A channel without a recorded point at
/// this timestamp is `None`, never zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub charging: Option<f64>,
    pub discharging: Option<f64>,
}

impl Tick {
    pub fn value(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Charging => self.charging,
            Channel::Discharging => self.discharging,
        }
    }
}

/// Merge both channels into a single timestamp-ordered stream.
pub fn merge_channels(charging: &[Sample], discharging: &[Sample]) -> Vec<Tick> {
    let mut ticks: BTreeMap<DateTime<Utc>, Tick> = BTreeMap::new();

    for (channel, samples) in [
        (Channel::Charging, charging),
        (Channel::Discharging, discharging),
    ] {
        for sample in samples {
            let tick = ticks.entry(sample.timestamp).or_insert(Tick {
                timestamp: sample.timestamp,
                charging: None,
                discharging: None,
            });
            match channel {
                Channel::Charging => tick.charging = Some(sample.value),
                Channel::Discharging => tick.discharging = Some(sample.value),
            }
        }
    }

    ticks.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 12, 13, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_merge_channels_keeps_missing_values_empty() {
        let charging = vec![Sample::new(at(0, 0), 50.0), Sample::new(at(0, 20), 0.0)];
        let discharging = vec![Sample::new(at(0, 10), 30.0), Sample::new(at(0, 20), 40.0)];

        let ticks = merge_channels(&charging, &discharging);

        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[0].timestamp, at(0, 0));
        assert_eq!(ticks[0].charging, Some(50.0));
        assert_eq!(ticks[0].discharging, None);
        assert_eq!(ticks[1].charging, None);
        assert_eq!(ticks[1].value(Channel::Discharging), Some(30.0));
        assert_eq!(ticks[2].charging, Some(0.0));
        assert_eq!(ticks[2].discharging, Some(40.0));
    }

    #[test]
    fn test_merge_channels_orders_by_timestamp() {
        let charging = vec![Sample::new(at(1, 0), 1.0)];
        let discharging = vec![Sample::new(at(0, 30), 2.0), Sample::new(at(2, 0), 3.0)];

        let ticks = merge_channels(&charging, &discharging);
        let order: Vec<_> = ticks.iter().map(|t| t.timestamp).collect();

        assert_eq!(order, vec![at(0, 30), at(1, 0), at(2, 0)]);
    }

    #[test]
    fn test_merge_channels_empty() {
        assert!(merge_channels(&[], &[]).is_empty());
    }
}
