//! Reinforcement learning environments
mod pendulum;
#[cfg(test)]
pub mod testing;

pub use pendulum::{Pendulum, PendulumConfig};

use crate::Prng;

/// A reinforcement learning environment with a continuous action space.
///
/// Actions are vectors with every component in `(-1, 1)`;
/// each environment rescales them to its own action bounds.
pub trait Environment {
    /// Shape of each observation. Observations are passed around flattened.
    fn observation_shape(&self) -> Vec<usize>;

    /// Number of action components.
    fn action_dim(&self) -> usize;

    /// Number of elements in a flattened observation.
    fn observation_size(&self) -> usize {
        self.observation_shape().iter().product()
    }

    /// Start a new episode and return the initial observation.
    fn reset(&mut self, rng: &mut Prng) -> Vec<f32>;

    /// Apply an action to the environment.
    ///
    /// # Args
    /// * `action` - Action with `action_dim` components in `(-1, 1)`.
    /// * `rng` - Random state for stochastic dynamics.
    fn step(&mut self, action: &[f32], rng: &mut Prng) -> Step;
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn observation_shape(&self) -> Vec<usize> {
        E::observation_shape(self)
    }
    fn action_dim(&self) -> usize {
        E::action_dim(self)
    }
    fn reset(&mut self, rng: &mut Prng) -> Vec<f32> {
        E::reset(self, rng)
    }
    fn step(&mut self, action: &[f32], rng: &mut Prng) -> Step {
        E::step(self, action, rng)
    }
}

/// Outcome of an environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Observation of the resulting state.
    pub observation: Vec<f32>,
    /// Reward for the transition.
    pub reward: f64,
    /// The resulting state is terminal: all future rewards are zero.
    pub terminated: bool,
    /// The episode was cut short (e.g. by a step limit) at a non-terminal state.
    pub truncated: bool,
}

impl Step {
    /// Whether the episode ends with this step.
    pub const fn episode_done(&self) -> bool {
        self.terminated || self.truncated
    }
}
