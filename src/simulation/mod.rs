//! Simulating agent-environment interaction
mod train;

pub use train::{train, TrainConfig};
