//! Agent components independent of the function approximation backend.
pub mod buffers;

pub use buffers::{ReplayBatch, ReplayBuffer, TensorBatch, Transition};
