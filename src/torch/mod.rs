//! Torch components
pub mod agents;
pub mod critic;
pub mod modules;
pub mod optimizers;
pub mod policy;

pub use critic::{Critic, StateActionValue};
pub use modules::{Activation, Mlp, MlpConfig};
pub use optimizers::{AdamConfig, Optimizer};
pub use policy::SquashedGaussianPolicy;
