//! Torch agents
mod sac;

pub use sac::{SacAgent, SacConfig, SacLosses, CRITIC_LOSS_NAMES};
