//! State-action value critics
use super::modules::{BuildModule, FeedForwardModule};
use tch::{nn::VarStore, Device, Kind, TchError, Tensor};

/// Estimate the value of taking an action in a state.
pub trait StateActionValue {
    /// Value estimates for a batch of state-action pairs.
    ///
    /// # Args
    /// * `states` - States with shape `[BATCH_SIZE, observation_size]`.
    /// * `actions` - Actions with shape `[BATCH_SIZE, action_dim]`.
    ///
    /// # Returns
    /// A tensor with shape `[BATCH_SIZE]`.
    fn q_values(&self, states: &Tensor, actions: &Tensor) -> Tensor;
}

/// State-action value critic: a module applied to the concatenated state and action features.
///
/// Owns its variables in a dedicated [`VarStore`] so that it can be optimized,
/// copied and blended independently of any other network.
#[derive(Debug)]
pub struct Critic<M> {
    vs: VarStore,
    module: M,
}

impl<M: FeedForwardModule> Critic<M> {
    /// Create a new critic with freshly initialized variables.
    pub fn new<MB>(config: &MB, observation_size: usize, action_dim: usize, device: Device) -> Self
    where
        MB: BuildModule<Module = M>,
    {
        let vs = VarStore::new(device);
        let module = config.build_module(&vs.root(), observation_size + action_dim, 1);
        Self { vs, module }
    }

    /// Create a target critic tracking `online`.
    ///
    /// The target starts as an exact copy of `online` and its variables do not require gradients.
    /// `config` must be the configuration that built `online`.
    pub fn new_target<MB>(
        config: &MB,
        online: &Self,
        observation_size: usize,
        action_dim: usize,
    ) -> Result<Self, TchError>
    where
        MB: BuildModule<Module = M>,
    {
        let mut target = Self::new(config, observation_size, action_dim, online.vs.device());
        target.vs.copy(&online.vs)?;
        target.vs.freeze();
        Ok(target)
    }
}

impl<M> Critic<M> {
    /// The variable store holding the critic parameters.
    pub const fn var_store(&self) -> &VarStore {
        &self.vs
    }

    /// Move the critic parameters toward those of `online` by polyak averaging.
    ///
    /// Every variable is updated in place as `θ ← polyak * θ + (1 - polyak) * θ_online`.
    /// With `polyak = 1` the parameters are unchanged; with `polyak = 0` they become a copy.
    pub fn polyak_update(&mut self, online: &Self, polyak: f64) -> Result<(), TchError> {
        let online_variables = online.vs.variables();
        tch::no_grad(|| {
            for (name, mut variable) in self.vs.variables() {
                let online_variable = online_variables.get(&name).ok_or_else(|| {
                    TchError::Torch(format!("variable {} missing from online critic", name))
                })?;
                let blended = &variable * polyak + online_variable * (1.0 - polyak);
                variable.copy_(&blended);
            }
            Ok(())
        })
    }

    /// Whether every parameter is finite.
    pub fn parameters_are_finite(&self) -> bool {
        all_finite(&self.vs)
    }
}

impl<M: FeedForwardModule> StateActionValue for Critic<M> {
    fn q_values(&self, states: &Tensor, actions: &Tensor) -> Tensor {
        let input = Tensor::cat(&[states, actions], -1);
        self.module.forward(&input).squeeze_dim(-1)
    }
}

/// Elementwise minimum of the value estimates of a set of critics.
///
/// # Panics
/// If `critics` is empty.
pub fn min_q_values<C: StateActionValue>(
    critics: &[C],
    states: &Tensor,
    actions: &Tensor,
) -> Tensor {
    let mut values = critics.iter().map(|critic| critic.q_values(states, actions));
    let first = values.next().expect("at least one critic");
    values.fold(first, |min, q| min.minimum(&q))
}

/// Whether every variable in a variable store is finite.
pub fn all_finite(vs: &VarStore) -> bool {
    tch::no_grad(|| {
        vs.variables()
            .values()
            .all(|variable| variable.isfinite().all().int64_value(&[]) != 0)
    })
}

/// Sum of squared parameter differences between two variable stores with the same structure.
///
/// Variables missing from `other` are ignored.
pub fn squared_distance(vs: &VarStore, other: &VarStore) -> f64 {
    let other_variables = other.variables();
    tch::no_grad(|| {
        vs.variables()
            .iter()
            .filter_map(|(name, variable)| {
                let other_variable = other_variables.get(name)?;
                Some((variable - other_variable).square().sum(Kind::Double).double_value(&[]))
            })
            .sum()
    })
}
