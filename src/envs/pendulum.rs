//! Inverted pendulum swing-up
use super::{Environment, Step};
use crate::Prng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Configuration for the [`Pendulum`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendulumConfig {
    /// Maximum angular speed (rad/s)
    pub max_speed: f64,
    /// Maximum absolute torque (N m)
    pub max_torque: f64,
    /// Simulation time step (s)
    pub dt: f64,
    /// Gravitational acceleration (m/s²)
    pub gravity: f64,
    /// Pendulum mass (kg)
    pub mass: f64,
    /// Pendulum length (m)
    pub length: f64,
    /// Episodes are truncated after this many steps.
    pub max_steps: u64,
}

impl Default for PendulumConfig {
    fn default() -> Self {
        Self {
            max_speed: 8.0,
            max_torque: 2.0,
            dt: 0.05,
            gravity: 10.0,
            mass: 1.0,
            length: 1.0,
            max_steps: 200,
        }
    }
}

/// Classic pendulum swing-up task with a continuous torque action.
///
/// The pendulum starts at a random angle and must be swung up and held upright.
/// Observations are `[cos θ, sin θ, θ̇]` with `θ = 0` upright.
/// The reward is `-(θ² + 0.1 θ̇² + 0.001 u²)` for applied torque `u`.
/// The task never terminates; episodes are truncated after `max_steps` steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Pendulum {
    config: PendulumConfig,
    theta: f64,
    theta_dot: f64,
    steps: u64,
}

impl Pendulum {
    pub const fn new(config: PendulumConfig) -> Self {
        Self {
            config,
            theta: 0.0,
            theta_dot: 0.0,
            steps: 0,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn observation(&self) -> Vec<f32> {
        vec![
            self.theta.cos() as f32,
            self.theta.sin() as f32,
            self.theta_dot as f32,
        ]
    }
}

impl Default for Pendulum {
    fn default() -> Self {
        Self::new(PendulumConfig::default())
    }
}

/// Wrap an angle into `[-π, π)`.
fn normalize_angle(x: f64) -> f64 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

impl Environment for Pendulum {
    fn observation_shape(&self) -> Vec<usize> {
        vec![3]
    }

    fn action_dim(&self) -> usize {
        1
    }

    fn reset(&mut self, rng: &mut Prng) -> Vec<f32> {
        self.theta = rng.gen_range(-PI..PI);
        self.theta_dot = rng.gen_range(-1.0..1.0);
        self.steps = 0;
        self.observation()
    }

    fn step(&mut self, action: &[f32], _: &mut Prng) -> Step {
        let c = &self.config;
        let scaled = action.first().copied().map_or(0.0, f64::from) * c.max_torque;
        let torque = scaled.clamp(-c.max_torque, c.max_torque);

        let reward = -(normalize_angle(self.theta).powi(2)
            + 0.1 * self.theta_dot.powi(2)
            + 0.001 * torque.powi(2));

        let theta_acc = 3.0 * c.gravity / (2.0 * c.length) * self.theta.sin()
            + 3.0 / (c.mass * c.length.powi(2)) * torque;
        self.theta_dot = (self.theta_dot + theta_acc * c.dt).clamp(-c.max_speed, c.max_speed);
        self.theta = normalize_angle(self.theta + self.theta_dot * c.dt);
        self.steps += 1;

        Step {
            observation: self.observation(),
            reward,
            terminated: false,
            truncated: self.steps >= c.max_steps,
        }
    }
}
