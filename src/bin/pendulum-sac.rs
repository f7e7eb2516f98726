use rand::SeedableRng;
use softac::envs::{Environment, Pendulum};
use softac::logging::{DisplayLogger, StatsLogger};
use softac::simulation::{train, TrainConfig};
use softac::torch::agents::{SacAgent, SacConfig};
use softac::Prng;
use tch::Device;

fn main() {
    tch::manual_seed(0);
    let agent_config: SacConfig = SacConfig {
        device: Device::cuda_if_available(),
        ..SacConfig::default()
    };
    let training_config = TrainConfig {
        initial_random_steps: 1000,
        num_episodes: 200,
        max_episode_steps: 200,
        ..TrainConfig::default()
    };

    let mut rng = Prng::seed_from_u64(0);
    let mut env = Pendulum::default();
    let mut agent: SacAgent =
        SacAgent::from_env(&env, &agent_config, Prng::from_rng(&mut rng).unwrap()).unwrap();
    let mut logger = DisplayLogger::default();

    let rewards = train(&mut agent, &mut env, &training_config, &mut rng, &mut logger).unwrap();
    logger.flush();

    let tail = &rewards[rewards.len().saturating_sub(10)..];
    #[allow(clippy::cast_precision_loss)]
    let mean_tail = tail.iter().sum::<f64>() / tail.len().max(1) as f64;
    println!("mean reward of the last {} episodes: {:.1}", tail.len(), mean_tail);

    let mut eval_env = Pendulum::default();
    let mut observation = eval_env.reset(&mut rng);
    let mut eval_reward = 0.0;
    loop {
        let action = agent.act_deterministic(&observation).unwrap();
        let step = eval_env.step(&action, &mut rng);
        eval_reward += step.reward;
        if step.episode_done() {
            break;
        }
        observation = step.observation;
    }
    println!("deterministic evaluation reward: {:.1}", eval_reward);
}
