//! Experience buffers
mod replay;

pub use replay::{ReplayBatch, ReplayBuffer, TensorBatch, Transition};
