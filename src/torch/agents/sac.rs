//! Soft actor-critic agent
use crate::agents::buffers::{ReplayBatch, ReplayBuffer, TensorBatch};
use crate::envs::Environment;
use crate::error::SacError;
use crate::logging::StatsLogger;
use crate::torch::critic::{min_q_values, Critic, StateActionValue};
use crate::torch::modules::{BuildModule, FeedForwardModule, Mlp, MlpConfig};
use crate::torch::optimizers::{AdamConfig, BuildOptimizer, Optimizer, OptimizerStepError};
use crate::torch::policy::SquashedGaussianPolicy;
use crate::Prng;
use serde::{Deserialize, Serialize};
use tch::{COptimizer, Device, Kind, Tensor};

/// Log names of the twin critic losses.
pub const CRITIC_LOSS_NAMES: [&str; 2] = ["critic1_loss", "critic2_loss"];

const CRITIC_PARAMETER_NAMES: [&str; 2] = ["critic1 parameters", "critic2 parameters"];
const TARGET_PARAMETER_NAMES: [&str; 2] =
    ["target critic1 parameters", "target critic2 parameters"];

/// Configuration for [`SacAgent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SacConfig<CB = MlpConfig, PB = MlpConfig, OB = AdamConfig> {
    /// Configuration of each critic network.
    pub critic_config: CB,
    /// Configuration of the policy network.
    pub policy_config: PB,
    /// Optimizer for each online critic.
    pub critic_optimizer_config: OB,
    /// Optimizer for the policy.
    pub policy_optimizer_config: OB,
    /// Maximum number of transitions held in the replay buffer.
    pub buffer_capacity: usize,
    /// Discount factor (γ) applied to future rewards.
    pub discount_factor: f64,
    /// Target network smoothing coefficient (ρ).
    ///
    /// Targets are updated as `θ' ← ρθ' + (1 - ρ)θ` after every update.
    pub polyak: f64,
    /// Weight (α) of the entropy bonus.
    pub entropy_coefficient: f64,
    #[serde(skip, default = "cpu_device")]
    pub device: Device,
}

impl<CB, PB, OB> Default for SacConfig<CB, PB, OB>
where
    CB: Default,
    PB: Default,
    OB: Default,
{
    fn default() -> Self {
        Self {
            critic_config: CB::default(),
            policy_config: PB::default(),
            critic_optimizer_config: OB::default(),
            policy_optimizer_config: OB::default(),
            buffer_capacity: 1_000_000,
            discount_factor: 0.99,
            polyak: 0.995,
            entropy_coefficient: 0.2,
            device: Device::Cpu,
        }
    }
}

const fn cpu_device() -> Device {
    Device::Cpu
}

/// Losses computed by one [`SacAgent::update`].
///
/// Each is the value before the corresponding optimizer step.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct SacLosses {
    pub critic: [f64; 2],
    pub policy: f64,
}

/// Soft Actor-Critic agent
///
/// Based on
/// "[Soft Actor-Critic: Off-Policy Maximum Entropy Deep Reinforcement Learning with a Stochastic
/// Actor][sac]" by Haarnoja et al. (2018)
/// with twin critics and a fixed entropy coefficient as in
/// "[Soft Actor-Critic Algorithms and Applications][sac2]" by Haarnoja et al. (2018).
///
/// [sac]: https://arxiv.org/abs/1801.01290
/// [sac2]: https://arxiv.org/abs/1812.05905
pub struct SacAgent<C = Mlp, P = Mlp, O = COptimizer> {
    buffer: ReplayBuffer,

    critics: [Critic<C>; 2],
    target_critics: [Critic<C>; 2],
    critic_optimizers: [O; 2],

    policy: SquashedGaussianPolicy<P>,
    policy_optimizer: O,

    discount_factor: f64,
    polyak: f64,
    entropy_coefficient: f64,
    device: Device,

    num_updates: u64,
    rng: Prng,
}

impl<C, P, O> SacAgent<C, P, O>
where
    C: FeedForwardModule,
    P: FeedForwardModule,
    O: Optimizer,
{
    /// Create a new agent.
    ///
    /// # Args
    /// * `observation_shape` - Shape of each observation; observations are stored flattened.
    /// * `action_dim` - Number of action components.
    /// * `config` - Agent configuration.
    /// * `rng` - Random state for action and batch sampling.
    ///
    /// Returns [`SacError::InvalidConfig`] if `config.buffer_capacity` is zero.
    pub fn new<CB, PB, OB>(
        observation_shape: &[usize],
        action_dim: usize,
        config: &SacConfig<CB, PB, OB>,
        rng: Prng,
    ) -> Result<Self, SacError>
    where
        CB: BuildModule<Module = C>,
        PB: BuildModule<Module = P>,
        OB: BuildOptimizer<Optimizer = O>,
        SacError: From<OB::Error>,
    {
        if config.buffer_capacity == 0 {
            return Err(SacError::InvalidConfig {
                what: "buffer_capacity",
                reason: "must be positive",
            });
        }
        let observation_size = observation_shape.iter().product();
        let device = config.device;
        let critic_config = &config.critic_config;
        let new_critic = || Critic::new(critic_config, observation_size, action_dim, device);
        let new_target = |online: &Critic<C>| {
            Critic::new_target(critic_config, online, observation_size, action_dim)
        };
        let critics = [new_critic(), new_critic()];
        let target_critics = [new_target(&critics[0])?, new_target(&critics[1])?];
        let critic_optimizers = [
            config
                .critic_optimizer_config
                .build_optimizer(critics[0].var_store())?,
            config
                .critic_optimizer_config
                .build_optimizer(critics[1].var_store())?,
        ];

        let policy = SquashedGaussianPolicy::new(
            &config.policy_config,
            observation_size,
            action_dim,
            device,
        );
        let policy_optimizer = config
            .policy_optimizer_config
            .build_optimizer(policy.var_store())?;

        Ok(Self {
            buffer: ReplayBuffer::new(config.buffer_capacity, observation_size, action_dim),
            critics,
            target_critics,
            critic_optimizers,
            policy,
            policy_optimizer,
            discount_factor: config.discount_factor,
            polyak: config.polyak,
            entropy_coefficient: config.entropy_coefficient,
            device,
            num_updates: 0,
            rng,
        })
    }

    /// Create a new agent for the observation and action structure of an environment.
    pub fn from_env<E, CB, PB, OB>(
        env: &E,
        config: &SacConfig<CB, PB, OB>,
        rng: Prng,
    ) -> Result<Self, SacError>
    where
        E: Environment + ?Sized,
        CB: BuildModule<Module = C>,
        PB: BuildModule<Module = P>,
        OB: BuildOptimizer<Optimizer = O>,
        SacError: From<OB::Error>,
    {
        Self::new(&env.observation_shape(), env.action_dim(), config, rng)
    }

    /// Store a transition in the replay buffer.
    ///
    /// # Args
    /// * `state` - Flattened state in which the action was taken.
    /// * `action` - The action taken, in `(-1, 1)`.
    /// * `reward` - Reward received for the action.
    /// * `done` - Whether the action led to a terminal state.
    pub fn store(
        &mut self,
        state: &[f32],
        action: &[f32],
        reward: f32,
        done: bool,
    ) -> Result<(), SacError> {
        self.buffer.store(state, action, reward, done)
    }

    /// Sample an action from the policy for a single flattened observation.
    pub fn act(&mut self, observation: &[f32]) -> Result<Vec<f32>, SacError> {
        self.policy.act(observation, &mut self.rng)
    }

    /// The mean (deterministic) action of the policy for a single flattened observation.
    pub fn act_deterministic(&self, observation: &[f32]) -> Result<Vec<f32>, SacError> {
        self.policy.act_deterministic(observation)
    }

    /// Sample a batch of transitions from the replay buffer.
    pub fn sample_batch(&mut self, batch_size: usize) -> Result<ReplayBatch, SacError> {
        self.buffer.sample_batch(batch_size, &mut self.rng)
    }

    /// Perform one soft actor-critic update on a batch sampled from the replay buffer.
    ///
    /// 1. Compute the soft bootstrap targets with the target critics (no gradient).
    /// 2. Take one optimizer step on each online critic toward the targets.
    /// 3. Take one optimizer step on the policy against the updated critics.
    /// 4. Move the target critics toward the online critics.
    ///
    /// If a loss is not finite the update stops before that loss is applied.
    /// Steps already taken by earlier phases of the same update are kept.
    /// A zero `batch_size` is rejected with [`SacError::InvalidConfig`].
    pub fn update<L: StatsLogger + ?Sized>(
        &mut self,
        batch_size: usize,
        logger: &mut L,
    ) -> Result<SacLosses, SacError> {
        if batch_size == 0 {
            return Err(SacError::InvalidConfig {
                what: "batch_size",
                reason: "must be positive",
            });
        }
        let update_index = self.num_updates;
        let batch = self.sample_batch(batch_size)?.to_tensors(self.device);
        let num_samples = batch.states.size()[0];

        let noise = self
            .policy
            .sample_noise(num_samples, &mut self.rng, self.device);
        let targets = self.td_targets(&batch, &noise);

        let mut critic_losses = [0.0; 2];
        for (((critic, optimizer), loss_value), name) in self
            .critics
            .iter()
            .zip(&mut self.critic_optimizers)
            .zip(&mut critic_losses)
            .zip(CRITIC_LOSS_NAMES)
        {
            let loss_fn = || {
                (critic.q_values(&batch.states, &batch.actions) - &targets)
                    .square()
                    .sum(Kind::Float)
            };
            *loss_value = checked_backward_step(optimizer, &loss_fn, update_index, name)?;
        }

        let (actions, log_probs) = self.policy.sample_action(&batch.states, &mut self.rng);
        let min_q = min_q_values(&self.critics, &batch.states, &actions);
        let policy_loss = -(min_q - &log_probs * self.entropy_coefficient).sum(Kind::Float);
        let policy_loss_value = checked_backward_step(
            &mut self.policy_optimizer,
            &|| policy_loss.shallow_clone(),
            update_index,
            "policy_loss",
        )?;
        let entropy = -f64::from(&log_probs.mean(Kind::Float));

        self.sync_targets()?;
        self.check_parameters(update_index)?;
        self.num_updates += 1;

        for (name, loss) in CRITIC_LOSS_NAMES.into_iter().zip(critic_losses) {
            logger.log_scalar(name, loss)?;
        }
        logger.log_scalar("policy_loss", policy_loss_value)?;
        logger.log_scalar("policy_entropy", entropy)?;
        logger.log_counter_increment("update_count", 1)?;

        Ok(SacLosses {
            critic: critic_losses,
            policy: policy_loss_value,
        })
    }

    /// Soft bootstrap targets `r + γ(1 - d)(min_i Q'_i(s', a') - α log π(a'|s'))`.
    ///
    /// The next actions `a'` are sampled from the policy at the next states using `noise`.
    /// No gradients are tracked.
    pub fn td_targets(&self, batch: &TensorBatch, noise: &Tensor) -> Tensor {
        tch::no_grad(|| {
            let (next_actions, next_log_probs) = self
                .policy
                .sample_action_with_noise(&batch.next_states, noise);
            let next_q = min_q_values(&self.target_critics, &batch.next_states, &next_actions);
            let soft_next_values = next_q - next_log_probs * self.entropy_coefficient;
            let not_done = &batch.dones * -1.0 + 1.0;
            &batch.rewards + not_done * soft_next_values * self.discount_factor
        })
    }
}

impl<C, P, O> SacAgent<C, P, O> {
    /// Move each target critic toward its online critic by polyak averaging.
    pub fn sync_targets(&mut self) -> Result<(), SacError> {
        for (target, online) in self.target_critics.iter_mut().zip(&self.critics) {
            target.polyak_update(online, self.polyak)?;
        }
        Ok(())
    }

    fn check_parameters(&self, update_index: u64) -> Result<(), SacError> {
        let divergence = |quantity| SacError::NumericalDivergence {
            update_index,
            quantity,
        };
        for (critic, name) in self.critics.iter().zip(CRITIC_PARAMETER_NAMES) {
            if !critic.parameters_are_finite() {
                return Err(divergence(name));
            }
        }
        for (critic, name) in self.target_critics.iter().zip(TARGET_PARAMETER_NAMES) {
            if !critic.parameters_are_finite() {
                return Err(divergence(name));
            }
        }
        if !self.policy.parameters_are_finite() {
            return Err(divergence("policy parameters"));
        }
        Ok(())
    }

    pub const fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub const fn critics(&self) -> &[Critic<C>; 2] {
        &self.critics
    }

    pub const fn target_critics(&self) -> &[Critic<C>; 2] {
        &self.target_critics
    }

    pub const fn policy(&self) -> &SquashedGaussianPolicy<P> {
        &self.policy
    }

    /// Number of completed updates.
    pub const fn num_updates(&self) -> u64 {
        self.num_updates
    }

    pub const fn device(&self) -> Device {
        self.device
    }
}

/// Take an optimizer step on a loss, reporting a non-finite loss as a numerical divergence.
fn checked_backward_step<O: Optimizer + ?Sized>(
    optimizer: &mut O,
    loss_fn: &dyn Fn() -> Tensor,
    update_index: u64,
    quantity: &'static str,
) -> Result<f64, SacError> {
    match optimizer.backward_step(loss_fn) {
        Ok(loss) => Ok(f64::from(&loss)),
        Err(OptimizerStepError::NonFiniteLoss { .. }) => Err(SacError::NumericalDivergence {
            update_index,
            quantity,
        }),
        Err(err) => Err(err.into()),
    }
}
