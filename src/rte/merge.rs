use chrono::{DateTime, Utc};

use crate::models::Block;

/// Total operational hours covered by the blocks.
///
/// Overlapping or touching blocks count once; gaps between disjoint blocks
/// are left out. The result is not rounded.
pub fn calculate_rte_time(blocks: &[Block]) -> f64 {
    if blocks.is_empty() {
        return 0.0;
    }

    let mut intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> =
        blocks.iter().map(|block| (block.start, block.end)).collect();
    intervals.sort_by_key(|(start, _)| *start);

    let mut total_secs: i64 = 0;
    let (mut interval_start, mut interval_end) = intervals[0];

    for &(start, end) in &intervals[1..] {
        if start <= interval_end {
            interval_end = interval_end.max(end);
        } else {
            total_secs += (interval_end - interval_start).num_seconds();
            interval_start = start;
            interval_end = end;
        }
    }
    // Close the last running interval
    total_secs += (interval_end - interval_start).num_seconds();

    total_secs as f64 / 3600.0
}

/// Split blocks into (linear, simultaneous), keeping their relative order.
pub fn divide_rte_blocks(blocks: Vec<Block>) -> (Vec<Block>, Vec<Block>) {
    let (simultaneous, linear): (Vec<Block>, Vec<Block>) =
        blocks.into_iter().partition(|block| block.simultaneous);
    (linear, simultaneous)
}
