use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::models::{merge_channels, Block, Channel, Tick};
use crate::rte::config::RteConfig;
use crate::timeseries::{ChannelReader, TimeSeriesSource};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Lifecycle of the block currently tracked for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockState {
    Idle,
    Open {
        start: DateTime<Utc>,
        simultaneous: bool,
    },
    /// Below threshold since `first_drop`, not yet long enough to close.
    Dropping {
        start: DateTime<Utc>,
        first_drop: DateTime<Utc>,
        simultaneous: bool,
    },
}

/// What a below-threshold tick did to the tracked block.
enum DropEvent {
    Ignored,
    FirstDrop,
    Closed(Block),
}

struct ChannelTracker {
    channel: Channel,
    state: BlockState,
}

impl ChannelTracker {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            state: BlockState::Idle,
        }
    }

    /// True while active with no pending drop.
    fn is_open(&self) -> bool {
        matches!(self.state, BlockState::Open { .. })
    }

    fn is_simultaneous(&self) -> bool {
        match self.state {
            BlockState::Idle => false,
            BlockState::Open { simultaneous, .. } | BlockState::Dropping { simultaneous, .. } => {
                simultaneous
            }
        }
    }

    fn activate(&mut self, timestamp: DateTime<Utc>) {
        self.state = match self.state {
            BlockState::Idle => BlockState::Open {
                start: timestamp,
                simultaneous: false,
            },
            // Signal came back before the stopping window elapsed
            BlockState::Dropping {
                start,
                simultaneous,
                ..
            } => BlockState::Open {
                start,
                simultaneous,
            },
            open => open,
        };
    }

    fn mark_simultaneous(&mut self) {
        match &mut self.state {
            BlockState::Idle => {}
            BlockState::Open { simultaneous, .. } | BlockState::Dropping { simultaneous, .. } => {
                *simultaneous = true
            }
        }
    }

    fn deactivate(&mut self, timestamp: DateTime<Utc>, min_stopping: Duration) -> DropEvent {
        match self.state {
            BlockState::Idle => DropEvent::Ignored,
            BlockState::Open {
                start,
                simultaneous,
            } => {
                self.state = BlockState::Dropping {
                    start,
                    first_drop: timestamp,
                    simultaneous,
                };
                DropEvent::FirstDrop
            }
            BlockState::Dropping {
                start,
                first_drop,
                simultaneous,
            } => {
                if timestamp - first_drop < min_stopping {
                    return DropEvent::Ignored;
                }
                self.state = BlockState::Idle;
                DropEvent::Closed(Block {
                    channel: self.channel,
                    start,
                    end: first_drop,
                    first_drop: Some(first_drop),
                    simultaneous,
                })
            }
        }
    }

    /// Close the tracked block at `end` regardless of the stopping window.
    fn close_at(&mut self, end: DateTime<Utc>) -> Option<Block> {
        let block = self.snapshot(end);
        self.state = BlockState::Idle;
        block
    }

    fn snapshot(&self, end: DateTime<Utc>) -> Option<Block> {
        let (start, first_drop, simultaneous) = match self.state {
            BlockState::Idle => return None,
            BlockState::Open {
                start,
                simultaneous,
            } => (start, None, simultaneous),
            BlockState::Dropping {
                start,
                first_drop,
                simultaneous,
            } => (start, Some(first_drop), simultaneous),
        };
        Some(Block {
            channel: self.channel,
            start,
            end,
            first_drop,
            simultaneous,
        })
    }
}

fn is_active(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v > threshold)
}

fn is_dropped(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v < threshold)
}

/// Partition a merged tick stream into closed blocks.
///
/// Returns the blocks closed inside the window (an unfinished discharging
/// block is included, stamped with the last tick) together with the charging
/// block still running at the end of the window, if any. The carry block is
/// never part of the list.
pub fn scan_window(ticks: &[Tick], config: &RteConfig) -> (Vec<Block>, Option<Block>) {
    let threshold = config.activity_threshold;
    let min_stopping = config.min_stopping_duration();

    let mut blocks = Vec::new();
    let mut charging = ChannelTracker::new(Channel::Charging);
    let mut discharging = ChannelTracker::new(Channel::Discharging);

    for tick in ticks {
        let ts = tick.timestamp;
        let charging_value = tick.value(Channel::Charging);
        let discharging_value = tick.value(Channel::Discharging);
        let charging_active = is_active(charging_value, threshold);
        let discharging_active = is_active(discharging_value, threshold);

        if charging_active {
            charging.activate(ts);
        }
        if discharging_active {
            discharging.activate(ts);
        }
        if charging_active && discharging_active {
            charging.mark_simultaneous();
            discharging.mark_simultaneous();
        }

        if is_dropped(charging_value, threshold) {
            if let DropEvent::Closed(block) = charging.deactivate(ts, min_stopping) {
                log_debug!(
                    "Closed {} block {} - {}",
                    block.channel.as_str(),
                    block.start,
                    block.end
                );
                blocks.push(block);
            }
        }

        if is_dropped(discharging_value, threshold) {
            match discharging.deactivate(ts, min_stopping) {
                // Simultaneous operation ends the instant discharge stops; the
                // remaining charging becomes a new block starting here.
                DropEvent::FirstDrop if discharging.is_simultaneous() && charging.is_open() => {
                    log_debug!("Simultaneous cut at {}", ts);
                    blocks.extend(charging.close_at(ts));
                    blocks.extend(discharging.close_at(ts));
                    charging.activate(ts);
                }
                DropEvent::Closed(block) => {
                    log_debug!(
                        "Closed {} block {} - {}",
                        block.channel.as_str(),
                        block.start,
                        block.end
                    );
                    blocks.push(block);
                }
                DropEvent::FirstDrop | DropEvent::Ignored => {}
            }
        }
    }

    let Some(last) = ticks.last().map(|tick| tick.timestamp) else {
        return (blocks, None);
    };

    let unclosed_charging = charging.snapshot(last);
    blocks.extend(discharging.snapshot(last));

    (blocks, unclosed_charging)
}

/// Fetch both channels for `[start, end)` and scan them into blocks.
///
/// With `handle_start`, a leading discharging block with no charging start in
/// the window is attributed to the charging block carried over from a
/// previous day. When no carry is found within `lookback_days`, every
/// discharging block ahead of the first charging block is dropped.
pub fn calculate_rte_blocks<S: TimeSeriesSource + ?Sized>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    reader: &ChannelReader<'_, S>,
    config: &RteConfig,
    handle_start: bool,
) -> Result<(Vec<Block>, Option<Block>)> {
    let discharging = reader.fetch(Channel::Discharging, start, end)?;
    let charging = reader.fetch(Channel::Charging, start, end)?;

    let ticks = merge_channels(&charging, &discharging);
    let (mut blocks, unclosed_charging) = scan_window(&ticks, config);

    let leading_discharge = blocks.first().is_some_and(Block::is_discharging);
    if handle_start && leading_discharge {
        match find_carried_charging_block(start, end, reader, config)? {
            Some(carried) => {
                log_info!(
                    "Attributed leading discharge at {} to charging block started {}",
                    blocks[0].start,
                    carried.start
                );
                blocks.insert(0, carried);
            }
            None => {
                // Every discharge before the first charging block lacks a predecessor
                let orphans = blocks
                    .iter()
                    .take_while(|block| block.is_discharging())
                    .count();
                for orphan in blocks.drain(..orphans) {
                    log_error!(
                        "No unclosed charging block found within {} days for discharging block {} - {}",
                        config.lookback_days,
                        orphan.start,
                        orphan.end
                    );
                }
            }
        }
    }

    Ok((blocks, unclosed_charging))
}

/// Walk back one day at a time, up to `lookback_days`, looking for a charging
/// block still open at the end of that day's window.
pub fn find_carried_charging_block<S: TimeSeriesSource + ?Sized>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    reader: &ChannelReader<'_, S>,
    config: &RteConfig,
) -> Result<Option<Block>> {
    for days_before in 1..=config.lookback_days {
        let offset = Duration::days(i64::from(days_before));
        let (_, carried) =
            calculate_rte_blocks(start - offset, end - offset, reader, config, false)?;
        if carried.is_some() {
            return Ok(carried);
        }
    }
    Ok(None)
}
