mod block;
mod sample;

pub use block::Block;
pub use sample::{merge_channels, Channel, Sample, Tick};
