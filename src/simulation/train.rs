//! Training loop
use crate::envs::Environment;
use crate::error::SacError;
use crate::logging::StatsLogger;
use crate::torch::agents::SacAgent;
use crate::torch::modules::FeedForwardModule;
use crate::torch::optimizers::Optimizer;
use crate::Prng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for [`train`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of environment steps taken with uniform random actions to fill the replay buffer
    /// before training starts.
    pub initial_random_steps: u64,
    /// Number of training episodes.
    pub num_episodes: u64,
    /// Perform an agent update every this many training steps.
    pub update_period: u64,
    /// Number of transitions sampled for each update.
    pub batch_size: usize,
    /// Training episodes are cut off after this many steps.
    pub max_episode_steps: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            initial_random_steps: 10_000,
            num_episodes: 1000,
            update_period: 1,
            batch_size: 256,
            max_episode_steps: 4000,
        }
    }
}

/// Train a soft actor-critic agent on an environment.
///
/// First fills the replay buffer with `initial_random_steps` transitions from uniform random
/// actions, then runs `num_episodes` episodes acting with the stochastic policy.
/// Every stored transition records whether the step terminated the episode;
/// truncated episodes are stored as non-terminal.
/// An update is performed every `update_period` training steps once the buffer holds at least
/// two transitions.
///
/// # Returns
/// The total reward of each training episode.
pub fn train<C, P, O, E, L>(
    agent: &mut SacAgent<C, P, O>,
    env: &mut E,
    config: &TrainConfig,
    rng: &mut Prng,
    logger: &mut L,
) -> Result<Vec<f64>, SacError>
where
    C: FeedForwardModule,
    P: FeedForwardModule,
    O: Optimizer,
    E: Environment + ?Sized,
    L: StatsLogger + ?Sized,
{
    prefill(agent, env, config.initial_random_steps, rng, logger)?;

    let update_period = config.update_period.max(1);
    let mut total_steps: u64 = 0;
    let mut episode_rewards = Vec::new();
    for _ in 0..config.num_episodes {
        let mut observation = env.reset(rng);
        let mut episode_reward = 0.0;
        let mut episode_length: u64 = 0;
        loop {
            let action = agent.act(&observation)?;
            let step = env.step(&action, rng);
            #[allow(clippy::cast_possible_truncation)]
            let reward = step.reward as f32;
            agent.store(&observation, &action, reward, step.terminated)?;
            logger.log_counter_increment("env_steps", 1)?;

            episode_reward += step.reward;
            episode_length += 1;
            total_steps += 1;

            if total_steps % update_period == 0 && agent.buffer().len() >= 2 {
                agent.update(config.batch_size, logger)?;
            }

            if step.episode_done() || episode_length >= config.max_episode_steps {
                break;
            }
            observation = step.observation;
        }
        logger.log_scalar("episode_reward", episode_reward)?;
        #[allow(clippy::cast_precision_loss)]
        let episode_length = episode_length as f64;
        logger.log_scalar("episode_length", episode_length)?;
        episode_rewards.push(episode_reward);
    }
    logger.flush();
    Ok(episode_rewards)
}

/// Store `num_steps` transitions generated with uniform random actions.
fn prefill<C, P, O, E, L>(
    agent: &mut SacAgent<C, P, O>,
    env: &mut E,
    num_steps: u64,
    rng: &mut Prng,
    logger: &mut L,
) -> Result<(), SacError>
where
    C: FeedForwardModule,
    P: FeedForwardModule,
    O: Optimizer,
    E: Environment + ?Sized,
    L: StatsLogger + ?Sized,
{
    let action_dim = env.action_dim();
    let mut steps = 0;
    while steps < num_steps {
        let mut observation = env.reset(rng);
        while steps < num_steps {
            let action: Vec<f32> = (0..action_dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let step = env.step(&action, rng);
            #[allow(clippy::cast_possible_truncation)]
            let reward = step.reward as f32;
            agent.store(&observation, &action, reward, step.terminated)?;
            logger.log_counter_increment("env_steps", 1)?;
            steps += 1;
            if step.episode_done() {
                break;
            }
            observation = step.observation;
        }
    }
    Ok(())
}
