use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Channel, Sample};
use crate::rte::algorithm::calculate_rte_blocks;
use crate::rte::config::RteConfig;
use crate::rte::efficiency::calculate_rte_actual;
use crate::rte::merge::divide_rte_blocks;
use crate::timeseries::{ChannelReader, TimeSeriesSink, TimeSeriesSource};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Series the daily KPIs are written to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSeries {
    pub linear: String,
    pub simultaneous: String,
}

impl Default for OutputSeries {
    fn default() -> Self {
        Self {
            linear: "HEATCUBE_RTE_ACTUAL".into(),
            simultaneous: "HEATCUBE_RTE_ACTUAL_SIMULTANEOUS".into(),
        }
    }
}

/// KPIs written for one day. A field is `None` when that kind of block did
/// not occur.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyRte {
    pub day_start: DateTime<Utc>,
    pub linear: Option<f64>,
    pub simultaneous: Option<f64>,
    pub block_count: usize,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute the RTE KPIs for the day before yesterday and write them out.
///
/// Returns `None` when the day has no delivered energy or no blocks; nothing
/// is written in that case.
pub fn process_rte_kpis<S, K>(
    today: NaiveDate,
    reader: &ChannelReader<'_, S>,
    sink: &K,
    outputs: &OutputSeries,
    config: &RteConfig,
) -> Result<Option<DailyRte>>
where
    S: TimeSeriesSource + ?Sized,
    K: TimeSeriesSink + ?Sized,
{
    let today = today.and_time(chrono::NaiveTime::MIN).and_utc();
    let start = today - Duration::days(2);
    let end = today - Duration::days(1);

    let mwh_delivered = reader
        .total(Channel::Discharging, start, end)
        .context("failed to read delivered energy")?;
    if mwh_delivered == 0.0 {
        log_warn!("No delivered energy - no RTE block closed on {start} - {end}");
        return Ok(None);
    }

    let (blocks, _) = calculate_rte_blocks(start, end, reader, config, true)?;
    if blocks.is_empty() {
        log_warn!("No RTE blocks found for {start} - {end}");
        return Ok(None);
    }
    let block_count = blocks.len();

    let (linear_blocks, simultaneous_blocks) = divide_rte_blocks(blocks);

    let mut result = DailyRte {
        day_start: start,
        linear: None,
        simultaneous: None,
        block_count,
    };

    if !linear_blocks.is_empty() {
        let rte = round2(calculate_rte_actual(reader, &linear_blocks, config)?);
        sink.insert(&outputs.linear, &[Sample::new(start, rte)])
            .with_context(|| format!("failed to write {}", outputs.linear))?;
        result.linear = Some(rte);
    }
    if !simultaneous_blocks.is_empty() {
        let rte = round2(calculate_rte_actual(reader, &simultaneous_blocks, config)?);
        sink.insert(&outputs.simultaneous, &[Sample::new(start, rte)])
            .with_context(|| format!("failed to write {}", outputs.simultaneous))?;
        result.simultaneous = Some(rte);
    }

    log_info!(
        "RTE for {}: linear={:?} simultaneous={:?} ({} blocks)",
        start,
        result.linear,
        result.simultaneous,
        block_count
    );

    Ok(Some(result))
}
