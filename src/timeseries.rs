use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Channel, Sample};

const OPC_PREFIX: &str = "njv:opcda://localhost/ABB.AC800MC_OpcDaServer.3:s=Applications.App_1.";

/// Read side of the time-series store.
///
/// Implementations return every recorded point in `[start, end)`, ordered by
/// timestamp, without duplicate timestamps.
pub trait TimeSeriesSource {
    fn retrieve(
        &self,
        external_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>>;
}

/// Write side of the time-series store.
pub trait TimeSeriesSink {
    fn insert(&self, external_id: &str, samples: &[Sample]) -> Result<()>;
}

/// External ids making up each channel. The charging channel is the sum of
/// all heater series at a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChannelSeries {
    pub charging: Vec<String>,
    pub discharging: String,
}

impl Default for ChannelSeries {
    fn default() -> Self {
        let heater = |name: &str| format!("{OPC_PREFIX}gvNQS10_EB001_{name}.Value");
        Self {
            charging: vec![
                heater("UH002_XQ05"),
                heater("UH002_XQ06"),
                heater("UH003_XQ05"),
                heater("UH003_XQ06"),
            ],
            discharging: format!("{OPC_PREFIX}gvNDA01_BU001_XQ01.Value"),
        }
    }
}

/// Binds a time-series source to the channel layout.
pub struct ChannelReader<'a, S: TimeSeriesSource + ?Sized> {
    source: &'a S,
    series: &'a ChannelSeries,
}

impl<'a, S: TimeSeriesSource + ?Sized> ChannelReader<'a, S> {
    pub fn new(source: &'a S, series: &'a ChannelSeries) -> Self {
        Self { source, series }
    }

    pub fn fetch(
        &self,
        channel: Channel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        match channel {
            Channel::Discharging => self.source.retrieve(&self.series.discharging, start, end),
            Channel::Charging => {
                let mut summed: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
                for external_id in &self.series.charging {
                    for sample in self.source.retrieve(external_id, start, end)? {
                        *summed.entry(sample.timestamp).or_insert(0.0) += sample.value;
                    }
                }
                Ok(summed
                    .into_iter()
                    .map(|(timestamp, value)| Sample::new(timestamp, value))
                    .collect())
            }
        }
    }

    /// Sum of all channel values recorded in `[start, end)`.
    pub fn total(&self, channel: Channel, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<f64> {
        Ok(self
            .fetch(channel, start, end)?
            .iter()
            .map(|sample| sample.value)
            .sum())
    }
}

/// Process-local store, used for dry runs and tests.
#[derive(Default)]
pub struct InMemorySeries {
    data: Mutex<HashMap<String, BTreeMap<DateTime<Utc>, f64>>>,
}

impl InMemorySeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(self, external_id: &str, samples: &[Sample]) -> Result<Self> {
        self.insert(external_id, samples)?;
        Ok(self)
    }

    pub fn get_all(&self, external_id: &str) -> Result<Vec<Sample>> {
        let data = self
            .data
            .lock()
            .map_err(|_| anyhow!("in-memory series lock poisoned"))?;
        Ok(data
            .get(external_id)
            .map(|points| {
                points
                    .iter()
                    .map(|(timestamp, value)| Sample::new(*timestamp, *value))
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl TimeSeriesSource for InMemorySeries {
    fn retrieve(
        &self,
        external_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        if start >= end {
            return Ok(Vec::new());
        }
        let data = self
            .data
            .lock()
            .map_err(|_| anyhow!("in-memory series lock poisoned"))?;
        Ok(data
            .get(external_id)
            .map(|points| {
                points
                    .range(start..end)
                    .map(|(timestamp, value)| Sample::new(*timestamp, *value))
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl TimeSeriesSink for InMemorySeries {
    fn insert(&self, external_id: &str, samples: &[Sample]) -> Result<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| anyhow!("in-memory series lock poisoned"))?;
        let points = data.entry(external_id.to_string()).or_default();
        for sample in samples {
            points.insert(sample.timestamp, sample.value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 12, 13, hour, minute, 0).unwrap()
    }

    fn series() -> ChannelSeries {
        ChannelSeries {
            charging: vec!["heater_a".into(), "heater_b".into()],
            discharging: "discharge".into(),
        }
    }

    #[test]
    fn test_retrieve_excludes_end() {
        let store = InMemorySeries::new()
            .with_series(
                "discharge",
                &[
                    Sample::new(at(0, 0), 1.0),
                    Sample::new(at(0, 30), 2.0),
                    Sample::new(at(1, 0), 3.0),
                ],
            )
            .unwrap();

        let points = store.retrieve("discharge", at(0, 0), at(1, 0)).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].value, 2.0);
        assert!(store.retrieve("missing", at(0, 0), at(1, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_charging_channel_sums_heaters() {
        let store = InMemorySeries::new()
            .with_series(
                "heater_a",
                &[Sample::new(at(0, 0), 4.0), Sample::new(at(0, 15), 5.0)],
            )
            .unwrap()
            .with_series(
                "heater_b",
                &[Sample::new(at(0, 0), 6.0), Sample::new(at(0, 30), 7.0)],
            )
            .unwrap();
        let series = series();
        let reader = ChannelReader::new(&store, &series);

        let charging = reader.fetch(Channel::Charging, at(0, 0), at(1, 0)).unwrap();

        assert_eq!(
            charging,
            vec![
                Sample::new(at(0, 0), 10.0),
                Sample::new(at(0, 15), 5.0),
                Sample::new(at(0, 30), 7.0),
            ]
        );
        assert_eq!(reader.total(Channel::Charging, at(0, 0), at(1, 0)).unwrap(), 22.0);
        assert!(reader
            .fetch(Channel::Discharging, at(0, 0), at(1, 0))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_insert_overwrites_same_timestamp() {
        let store = InMemorySeries::new();
        store.insert("kpi", &[Sample::new(at(0, 0), 1.0)]).unwrap();
        store.insert("kpi", &[Sample::new(at(0, 0), 2.0)]).unwrap();

        assert_eq!(store.get_all("kpi").unwrap(), vec![Sample::new(at(0, 0), 2.0)]);
    }

    #[test]
    fn test_default_series_layout() {
        let series = ChannelSeries::default();
        assert_eq!(series.charging.len(), 4);
        assert!(series.discharging.ends_with("gvNDA01_BU001_XQ01.Value"));
    }
}
