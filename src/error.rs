//! Error type
use crate::logging::LogError;
use crate::torch::optimizers::OptimizerStepError;
use tch::TchError;
use thiserror::Error;

/// Error from the soft actor-critic crate.
///
/// None of these are recoverable at the point of detection.
/// A training loop may choose to restart the whole run.
#[derive(Error, Debug)]
pub enum SacError {
    /// Sampling requires at least 2 stored transitions so that every sampled index has a
    /// readable successor.
    #[error("replay buffer holds {len} transitions; at least 2 are required to sample")]
    BufferUnderflow { len: usize },
    #[error("{what} has size {actual}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid {what}: {reason}")]
    InvalidConfig {
        what: &'static str,
        reason: &'static str,
    },
    /// A loss or parameter became NaN or infinite.
    #[error("non-finite {quantity} in update {update_index}")]
    NumericalDivergence {
        update_index: u64,
        quantity: &'static str,
    },
    #[error(transparent)]
    Optimizer(#[from] OptimizerStepError),
    #[error(transparent)]
    Torch(#[from] TchError),
    #[error(transparent)]
    Log(#[from] LogError),
}
