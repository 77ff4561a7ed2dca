pub mod algorithm;
pub mod config;
pub mod daily;
pub mod efficiency;
pub mod merge;

pub use algorithm::{calculate_rte_blocks, find_carried_charging_block, scan_window};
pub use config::RteConfig;
pub use daily::{process_rte_kpis, DailyRte, OutputSeries};
pub use efficiency::{calculate_rte_actual, NO_BLOCKS};
pub use merge::{calculate_rte_time, divide_rte_blocks};
