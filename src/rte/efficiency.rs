use anyhow::Result;

use crate::models::Block;
use crate::rte::config::RteConfig;
use crate::rte::merge::calculate_rte_time;
use crate::timeseries::{ChannelReader, TimeSeriesSource};

/// Returned instead of a percentage when the blocks cover no time at all, or
/// no energy went into storage.
pub const NO_BLOCKS: f64 = -1.0;

/// Actual round-trip efficiency (%) of the given blocks.
///
/// Energy charged is the charging signal summed over each charging block,
/// energy delivered the discharging signal summed over each discharging
/// block. Auxiliary consumption is charged for every operational hour.
pub fn calculate_rte_actual<S: TimeSeriesSource + ?Sized>(
    reader: &ChannelReader<'_, S>,
    blocks: &[Block],
    config: &RteConfig,
) -> Result<f64> {
    let hours = calculate_rte_time(blocks);
    if hours == 0.0 {
        return Ok(NO_BLOCKS);
    }

    let mut mwh_charged = 0.0;
    let mut mwh_delivered = 0.0;

    for block in blocks {
        let energy = reader.total(block.channel, block.start, block.end)?;
        if block.is_charging() {
            mwh_charged += energy;
        } else {
            mwh_delivered += energy;
        }
    }

    let mwh_consumed = mwh_charged + config.aux_loss_rate * hours;
    if mwh_consumed <= 0.0 {
        return Ok(NO_BLOCKS);
    }

    Ok(mwh_delivered / mwh_consumed * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, Sample};
    use crate::timeseries::{ChannelSeries, InMemorySeries};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 12, 13, hour, minute, 0).unwrap()
    }

    fn series() -> ChannelSeries {
        ChannelSeries {
            charging: vec!["heater_a".into(), "heater_b".into()],
            discharging: "discharge".into(),
        }
    }

    fn block(channel: Channel, start: DateTime<Utc>, end: DateTime<Utc>) -> Block {
        Block {
            channel,
            start,
            end,
            first_drop: Some(end),
            simultaneous: false,
        }
    }

    #[test]
    fn test_no_blocks_sentinel() {
        let store = InMemorySeries::new();
        let series = series();
        let reader = ChannelReader::new(&store, &series);

        let rte = calculate_rte_actual(&reader, &[], &RteConfig::default()).unwrap();

        assert_eq!(rte, -1.0);
    }

    #[test]
    fn test_zero_length_blocks_use_sentinel() {
        let store = InMemorySeries::new();
        let series = series();
        let reader = ChannelReader::new(&store, &series);
        let blocks = vec![block(Channel::Charging, at(1, 0), at(1, 0))];

        let rte = calculate_rte_actual(&reader, &blocks, &RteConfig::default()).unwrap();

        assert_eq!(rte, NO_BLOCKS);
    }

    #[test]
    fn test_rte_with_aux_consumption() {
        let charging: Vec<Sample> = [0, 15, 30, 45]
            .iter()
            .map(|&m| Sample::new(at(0, m), 12.5))
            .chain(std::iter::once(Sample::new(at(1, 0), 0.0)))
            .collect();
        let discharging: Vec<Sample> = [0, 15, 30, 45]
            .iter()
            .map(|&m| Sample::new(at(1, m), 24.0))
            .chain(std::iter::once(Sample::new(at(2, 0), 0.0)))
            .collect();
        let store = InMemorySeries::new()
            .with_series("heater_a", &charging)
            .unwrap()
            .with_series("heater_b", &charging)
            .unwrap()
            .with_series("discharge", &discharging)
            .unwrap();
        let series = series();
        let reader = ChannelReader::new(&store, &series);
        let blocks = vec![
            block(Channel::Charging, at(0, 0), at(1, 0)),
            block(Channel::Discharging, at(1, 0), at(2, 0)),
        ];

        let rte = calculate_rte_actual(&reader, &blocks, &RteConfig::default()).unwrap();

        let expected = 96.0 / (100.0 + 0.058 * 2.0) * 100.0;
        assert!((rte - expected).abs() < 1e-9, "got {rte}, expected {expected}");
        assert_eq!((rte * 100.0).round() / 100.0, 95.89);
    }

    #[test]
    fn test_energy_outside_blocks_is_ignored() {
        let store = InMemorySeries::new()
            .with_series(
                "discharge",
                &[
                    Sample::new(at(0, 0), 500.0),
                    Sample::new(at(1, 0), 50.0),
                    Sample::new(at(3, 0), 500.0),
                ],
            )
            .unwrap()
            .with_series("heater_a", &[Sample::new(at(0, 30), 100.0)])
            .unwrap();
        let series = series();
        let reader = ChannelReader::new(&store, &series);
        let blocks = vec![
            block(Channel::Charging, at(0, 30), at(1, 0)),
            block(Channel::Discharging, at(1, 0), at(2, 0)),
        ];
        let config = RteConfig {
            aux_loss_rate: 0.0,
            ..RteConfig::default()
        };

        let rte = calculate_rte_actual(&reader, &blocks, &config).unwrap();

        assert_eq!(rte, 50.0);
    }

    #[test]
    fn test_no_consumed_energy_uses_sentinel() {
        let store = InMemorySeries::new()
            .with_series(
                "discharge",
                &[Sample::new(at(1, 0), 50.0), Sample::new(at(1, 30), 50.0)],
            )
            .unwrap();
        let series = series();
        let reader = ChannelReader::new(&store, &series);
        let blocks = vec![block(Channel::Discharging, at(1, 0), at(2, 0))];
        let config = RteConfig {
            aux_loss_rate: 0.0,
            ..RteConfig::default()
        };

        let rte = calculate_rte_actual(&reader, &blocks, &config).unwrap();

        assert_eq!(rte, NO_BLOCKS);
    }
}
