//! Environment testing utilities
use super::{Environment, Step};
use crate::Prng;
use rand::{Rng, SeedableRng};

/// Run an environment with uniform random actions and check that invariants are satisfied.
pub fn check_random_rollout<E: Environment + ?Sized>(env: &mut E, num_steps: u64, seed: u64) {
    let mut rng = Prng::seed_from_u64(seed);
    let observation_size = env.observation_size();
    let action_dim = env.action_dim();

    let observation = env.reset(&mut rng);
    assert_eq!(observation.len(), observation_size);
    for _ in 0..num_steps {
        let action: Vec<f32> = (0..action_dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let step = env.step(&action, &mut rng);
        assert_eq!(step.observation.len(), observation_size);
        assert!(step.reward.is_finite());
        assert!(step.observation.iter().all(|x| x.is_finite()));
        if step.episode_done() {
            env.reset(&mut rng);
        }
    }
}

/// Single-step environment penalizing the magnitude of the action.
///
/// Each observation is drawn uniformly from `[-1, 1]^observation_size` independently
/// of the action. The reward is `-Σ|a|` and each step is terminal with probability
/// `termination_prob`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCost {
    pub observation_size: usize,
    pub action_dim: usize,
    pub termination_prob: f64,
}

impl Default for ActionCost {
    fn default() -> Self {
        Self {
            observation_size: 2,
            action_dim: 1,
            termination_prob: 0.05,
        }
    }
}

impl ActionCost {
    fn observe(&self, rng: &mut Prng) -> Vec<f32> {
        (0..self.observation_size)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect()
    }
}

impl Environment for ActionCost {
    fn observation_shape(&self) -> Vec<usize> {
        vec![self.observation_size]
    }

    fn action_dim(&self) -> usize {
        self.action_dim
    }

    fn reset(&mut self, rng: &mut Prng) -> Vec<f32> {
        self.observe(rng)
    }

    fn step(&mut self, action: &[f32], rng: &mut Prng) -> Step {
        Step {
            observation: self.observe(rng),
            reward: -action.iter().map(|a| f64::from(a.abs())).sum::<f64>(),
            terminated: rng.gen_bool(self.termination_prob),
            truncated: false,
        }
    }
}

#[test]
fn action_cost_random_rollout() {
    check_random_rollout(&mut ActionCost::default(), 1000, 0);
}
