//! Squashed Gaussian policy
use super::critic::all_finite;
use super::modules::{BuildModule, FeedForwardModule};
use crate::error::SacError;
use crate::Prng;
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;
use tch::{nn::VarStore, Device, Kind, Tensor};

/// Lower bound on the log standard deviation of the action distribution.
pub const LOG_STD_MIN: f64 = -20.0;
/// Upper bound on the log standard deviation of the action distribution.
pub const LOG_STD_MAX: f64 = 2.0;
/// Stabilizer for divisions and logarithms in the log-density.
pub const EPSILON: f64 = 1e-6;

/// Stochastic policy with a tanh-squashed diagonal Gaussian action distribution.
///
/// The network maps a state to `2 * action_dim` outputs: the pre-squash mean followed by the
/// log standard deviation. An action is sampled as `tanh(mean + std * noise)` with standard
/// normal `noise`, so every action component lies in `(-1, 1)`.
#[derive(Debug)]
pub struct SquashedGaussianPolicy<M> {
    vs: VarStore,
    module: M,
    observation_size: usize,
    action_dim: usize,
}

impl<M: FeedForwardModule> SquashedGaussianPolicy<M> {
    pub fn new<MB>(config: &MB, observation_size: usize, action_dim: usize, device: Device) -> Self
    where
        MB: BuildModule<Module = M>,
    {
        let vs = VarStore::new(device);
        let module = config.build_module(&vs.root(), observation_size, 2 * action_dim);
        Self {
            vs,
            module,
            observation_size,
            action_dim,
        }
    }

    /// Pre-squash mean and clamped log standard deviation for a batch of states.
    ///
    /// Both outputs have shape `[BATCH_SIZE, action_dim]`.
    pub fn forward(&self, states: &Tensor) -> (Tensor, Tensor) {
        let output = self.module.forward(states);
        let mut parts = output.chunk(2, -1).into_iter();
        match (parts.next(), parts.next()) {
            (Some(mean), Some(log_std)) => (mean, log_std.clamp(LOG_STD_MIN, LOG_STD_MAX)),
            _ => unreachable!("chunk of an even-sized dimension yields two parts"),
        }
    }

    /// Sample actions using the given standard normal noise.
    ///
    /// # Returns
    /// * `actions` - Squashed actions with shape `[BATCH_SIZE, action_dim]`.
    /// * `log_probs` - Log-density of each action with shape `[BATCH_SIZE]`.
    pub fn sample_action_with_noise(&self, states: &Tensor, noise: &Tensor) -> (Tensor, Tensor) {
        let (mean, log_std) = self.forward(states);
        squash_sample(&mean, &log_std.exp(), noise)
    }

    /// Sample actions for a batch of states with reparameterized noise drawn from `rng`.
    ///
    /// Gradients flow through the returned actions and log-densities to the policy parameters.
    pub fn sample_action(&self, states: &Tensor, rng: &mut Prng) -> (Tensor, Tensor) {
        let noise = self.sample_noise(states.size()[0], rng, states.device());
        self.sample_action_with_noise(states, &noise)
    }

    /// Standard normal noise with shape `[batch_size, action_dim]`.
    pub fn sample_noise(&self, batch_size: i64, rng: &mut Prng, device: Device) -> Tensor {
        standard_normal(batch_size, self.action_dim, rng).to_device(device)
    }

    /// Deterministic action `tanh(mean)` for a batch of states.
    pub fn mean_action(&self, states: &Tensor) -> Tensor {
        self.forward(states).0.tanh()
    }

    /// Sample an action for a single observation without tracking gradients.
    ///
    /// # Args
    /// * `observation` - Flat observation vector of length `observation_size`.
    pub fn act(&self, observation: &[f32], rng: &mut Prng) -> Result<Vec<f32>, SacError> {
        self.single_action(observation, |state| self.sample_action(state, rng).0)
    }

    /// Deterministic action `tanh(mean)` for a single observation.
    pub fn act_deterministic(&self, observation: &[f32]) -> Result<Vec<f32>, SacError> {
        self.single_action(observation, |state| self.mean_action(state))
    }

    fn single_action<F>(&self, observation: &[f32], f: F) -> Result<Vec<f32>, SacError>
    where
        F: FnOnce(&Tensor) -> Tensor,
    {
        if observation.len() != self.observation_size {
            return Err(SacError::ShapeMismatch {
                what: "observation",
                expected: self.observation_size,
                actual: observation.len(),
            });
        }
        let action = tch::no_grad(|| {
            let state = Tensor::of_slice(observation)
                .to_device(self.vs.device())
                .unsqueeze(0);
            f(&state).squeeze_dim(0).to_device(Device::Cpu)
        });
        Ok(Vec::<f32>::from(&action))
    }
}

impl<M> SquashedGaussianPolicy<M> {
    pub const fn var_store(&self) -> &VarStore {
        &self.vs
    }

    pub const fn observation_size(&self) -> usize {
        self.observation_size
    }

    pub const fn action_dim(&self) -> usize {
        self.action_dim
    }

    /// Whether every parameter is finite.
    pub fn parameters_are_finite(&self) -> bool {
        all_finite(&self.vs)
    }
}

/// Reparameterized sample from a tanh-squashed diagonal Gaussian.
///
/// # Args
/// * `mean` - Pre-squash mean with shape `[BATCH_SIZE, action_dim]`.
/// * `std` - Standard deviation with the same shape as `mean`.
/// * `noise` - Standard normal noise with the same shape as `mean`.
///
/// # Returns
/// The squashed action `tanh(mean + std * noise)` and its log-density with shape `[BATCH_SIZE]`,
/// including the change-of-variables correction for the tanh.
pub fn squash_sample(mean: &Tensor, std: &Tensor, noise: &Tensor) -> (Tensor, Tensor) {
    let pre_squash = mean + std * noise;
    let action = pre_squash.tanh();

    let scaled_std = std + EPSILON;
    let z = (&pre_squash - mean) / &scaled_std;
    let gaussian_log_prob = ((z.square() + scaled_std.log() * 2.0 + (2.0 * PI).ln()) * -0.5)
        .sum_dim_intlist(&[-1], false, Kind::Float);
    let squash_correction = (-action.square() + 1.0 + EPSILON)
        .log()
        .sum_dim_intlist(&[-1], false, Kind::Float);

    (action, gaussian_log_prob - squash_correction)
}

/// Tensor of standard normal samples with shape `[batch_size, dim]` drawn from `rng`.
#[allow(clippy::cast_possible_wrap)]
fn standard_normal(batch_size: i64, dim: usize, rng: &mut Prng) -> Tensor {
    let num_samples = batch_size.max(0) as usize * dim;
    let samples: Vec<f32> = (0..num_samples)
        .map(|_| rng.sample::<f32, _>(StandardNormal))
        .collect();
    Tensor::of_slice(&samples).reshape(&[batch_size, dim as i64])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torch::modules::{Mlp, MlpConfig};
    use rand::SeedableRng;
    use rstest::{fixture, rstest};

    const OBS: usize = 4;
    const ACT: usize = 2;

    #[fixture]
    fn policy() -> SquashedGaussianPolicy<Mlp> {
        let config = MlpConfig {
            hidden_sizes: vec![16],
            ..MlpConfig::default()
        };
        SquashedGaussianPolicy::new(&config, OBS, ACT, Device::Cpu)
    }

    fn states(batch_size: i64) -> Tensor {
        Tensor::randn(&[batch_size, OBS as i64], (Kind::Float, Device::Cpu)) * 3
    }

    /// Log-density of `tanh(x)` for scalar `x ~ N(mean, std)`
    fn reference_log_prob(mean: f64, std: f64, noise: f64) -> f64 {
        let x = mean + std * noise;
        let gaussian = -0.5 * noise * noise - std.ln() - 0.5 * (2.0 * PI).ln();
        gaussian - (1.0 - x.tanh().powi(2)).ln()
    }

    #[rstest]
    #[case(0.0, 1.0, 0.0)]
    #[case(0.3, 0.5, -1.5)]
    #[case(-0.7, 0.2, 1.2)]
    #[case(0.1, 1.5, 0.8)]
    fn squash_log_prob_matches_density(
        #[case] mean: f64,
        #[case] std: f64,
        #[case] noise: f64,
    ) {
        let (action, log_prob) = squash_sample(
            &Tensor::of_slice(&[mean]).reshape(&[1, 1]),
            &Tensor::of_slice(&[std]).reshape(&[1, 1]),
            &Tensor::of_slice(&[noise]).reshape(&[1, 1]),
        );
        assert_eq!(log_prob.size(), vec![1]);
        assert!((action.double_value(&[0, 0]) - (mean + std * noise).tanh()).abs() < 1e-12);
        let expected = reference_log_prob(mean, std, noise);
        let actual = log_prob.double_value(&[0]);
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {}, actual {}",
            expected,
            actual
        );
    }

    /// Probability that `tanh(x)` with `x ~ N(0, 1)` lies within `h` of `a`, divided by `2h`.
    fn integrated_density(a: f64, h: f64) -> f64 {
        let (lo, hi) = ((a - h).atanh(), (a + h).atanh());
        let n = 1000;
        let step = (hi - lo) / f64::from(n);
        let pdf = |x: f64| (-0.5 * x * x).exp() / (2.0 * PI).sqrt();
        let simpson: f64 = (0..=n)
            .map(|i| {
                let weight = if i == 0 || i == n {
                    1.0
                } else if i % 2 == 1 {
                    4.0
                } else {
                    2.0
                };
                weight * pdf(lo + step * f64::from(i))
            })
            .sum();
        simpson * step / 3.0 / (2.0 * h)
    }

    #[rstest]
    #[case(-0.5)]
    #[case(0.0)]
    #[case(0.8)]
    fn standard_log_prob_matches_integrated_density(#[case] action: f64) {
        let (_, log_prob) = squash_sample(
            &Tensor::of_slice(&[0.0_f64]).reshape(&[1, 1]),
            &Tensor::of_slice(&[1.0_f64]).reshape(&[1, 1]),
            &Tensor::of_slice(&[action.atanh()]).reshape(&[1, 1]),
        );
        let expected = integrated_density(action, 1e-3).ln();
        let actual = log_prob.double_value(&[0]);
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {}, actual {}",
            expected,
            actual
        );
    }

    #[test]
    fn squash_log_prob_sums_over_components() {
        let mean = Tensor::of_slice(&[0.3, -0.7]).reshape(&[1, 2]);
        let std = Tensor::of_slice(&[0.5, 0.2]).reshape(&[1, 2]);
        let noise = Tensor::of_slice(&[-1.5, 1.2]).reshape(&[1, 2]);
        let (_, log_prob) = squash_sample(&mean, &std, &noise);
        let expected = reference_log_prob(0.3, 0.5, -1.5) + reference_log_prob(-0.7, 0.2, 1.2);
        assert!((log_prob.double_value(&[0]) - expected).abs() < 1e-3);
    }

    #[rstest]
    fn sample_shapes(policy: SquashedGaussianPolicy<Mlp>) {
        let mut rng = Prng::seed_from_u64(0);
        let (actions, log_probs) = policy.sample_action(&states(7), &mut rng);
        assert_eq!(actions.size(), vec![7, ACT as i64]);
        assert_eq!(log_probs.size(), vec![7]);
    }

    #[rstest]
    fn actions_in_open_unit_interval(policy: SquashedGaussianPolicy<Mlp>) {
        let mut rng = Prng::seed_from_u64(1);
        let (actions, _) = policy.sample_action(&states(256), &mut rng);
        assert_eq!(actions.abs().lt(1.0).all().int64_value(&[]), 1);
    }

    #[rstest]
    fn log_std_is_clamped(policy: SquashedGaussianPolicy<Mlp>) {
        let (_, log_std) = policy.forward(&(states(64) * 1e6));
        let min = log_std.min().double_value(&[]);
        let max = log_std.max().double_value(&[]);
        assert!(min >= LOG_STD_MIN, "{}", min);
        assert!(max <= LOG_STD_MAX, "{}", max);
    }

    #[rstest]
    fn sample_is_reproducible(policy: SquashedGaussianPolicy<Mlp>) {
        let s = states(3);
        let (a1, _) = policy.sample_action(&s, &mut Prng::seed_from_u64(5));
        let (a2, _) = policy.sample_action(&s, &mut Prng::seed_from_u64(5));
        assert_eq!(a1, a2);
    }

    #[rstest]
    fn sample_has_policy_gradient(policy: SquashedGaussianPolicy<Mlp>) {
        let mut rng = Prng::seed_from_u64(2);
        let (actions, log_probs) = policy.sample_action(&states(8), &mut rng);
        let loss = actions.sum(Kind::Float) + log_probs.sum(Kind::Float);
        loss.backward();
        let grad_norm: f64 = policy
            .var_store()
            .trainable_variables()
            .iter()
            .map(|v| v.grad().square().sum(Kind::Double).double_value(&[]))
            .sum();
        assert!(grad_norm > 0.0);
    }

    #[rstest]
    fn act_single_observation(policy: SquashedGaussianPolicy<Mlp>) {
        let mut rng = Prng::seed_from_u64(3);
        let action = policy.act(&[0.1, -0.2, 0.3, 0.0], &mut rng).unwrap();
        assert_eq!(action.len(), ACT);
        assert!(action.iter().all(|a| a.abs() < 1.0));
    }

    #[rstest]
    fn deterministic_act_is_mean(policy: SquashedGaussianPolicy<Mlp>) {
        let observation = [0.5_f32, 0.5, -1.0, 2.0];
        let a1 = policy.act_deterministic(&observation).unwrap();
        let a2 = policy.act_deterministic(&observation).unwrap();
        assert_eq!(a1, a2);
    }

    #[rstest]
    fn act_rejects_wrong_observation_size(policy: SquashedGaussianPolicy<Mlp>) {
        let mut rng = Prng::seed_from_u64(0);
        let result = policy.act(&[0.0; 3], &mut rng);
        assert!(matches!(
            result,
            Err(SacError::ShapeMismatch {
                what: "observation",
                expected: OBS,
                actual: 3,
            })
        ));
    }
}
