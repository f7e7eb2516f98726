//! Torch optimizer wrappers and configuration
use super::{BaseOptimizer, BuildOptimizer, OnceOptimizer, OptimizerStepError};
use serde::{Deserialize, Serialize};
use std::convert::{TryFrom, TryInto};
use tch::{nn::VarStore, COptimizer, TchError, Tensor};

impl From<TchError> for OptimizerStepError {
    fn from(err: TchError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl BaseOptimizer for COptimizer {
    fn zero_grad(&mut self) -> Result<(), OptimizerStepError> {
        Ok(COptimizer::zero_grad(self)?)
    }
}

impl OnceOptimizer for COptimizer {
    fn step_once(&self) -> Result<(), OptimizerStepError> {
        Ok(COptimizer::step(self)?)
    }

    fn backward_step_once(&mut self, loss: &Tensor) -> Result<(), OptimizerStepError> {
        let loss_value = loss.double_value(&[]);
        if !loss_value.is_finite() {
            return Err(OptimizerStepError::NonFiniteLoss { loss: loss_value });
        }
        BaseOptimizer::zero_grad(self)?;
        loss.backward();
        self.step_once()
    }
}

impl<T> BuildOptimizer for T
where
    for<'a> &'a T: TryInto<COptimizer, Error = TchError>,
{
    type Optimizer = COptimizer;
    type Error = TchError;

    fn build_optimizer(&self, vs: &VarStore) -> Result<COptimizer, TchError> {
        let mut optimizer: COptimizer = self.try_into()?;
        for var in vs.trainable_variables() {
            optimizer.add_parameters(&var, 0)?;
        }
        Ok(optimizer)
    }
}

/// Configuration for the SGD optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Momentum
    pub momentum: f64,
    /// Weight decay (L2 penalty)
    pub weight_decay: f64,
    /// Dampening for momentum
    pub dampening: f64,
    /// Enables Nesterov momentum
    pub nesterov: bool,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-2,
            momentum: 0.0,
            weight_decay: 0.0,
            dampening: 0.0,
            nesterov: false,
        }
    }
}

impl TryFrom<&SgdConfig> for COptimizer {
    type Error = TchError;
    fn try_from(config: &SgdConfig) -> Result<Self, Self::Error> {
        Self::sgd(
            config.learning_rate,
            config.momentum,
            config.dampening,
            config.weight_decay,
            config.nesterov,
        )
    }
}

#[allow(clippy::doc_markdown)] // false positive on RMSProp
/// Configuration for the RMSProp optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RmsPropConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Momentum
    pub momentum: f64,
    /// Smoothing factor
    pub alpha: f64,
    /// A term added to the denominator to improve numerical stability
    pub eps: f64,
    /// If true, normalize the gradient by the estimated variance.
    pub centered: bool,
    /// Weight decay (L2 penalty)
    pub weight_decay: f64,
}

impl Default for RmsPropConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-2,
            momentum: 0.0,
            alpha: 0.99,
            eps: 1e-8,
            centered: false,
            weight_decay: 0.0,
        }
    }
}

impl TryFrom<&RmsPropConfig> for COptimizer {
    type Error = TchError;
    fn try_from(config: &RmsPropConfig) -> Result<Self, Self::Error> {
        Self::rms_prop(
            config.learning_rate,
            config.alpha,
            config.eps,
            config.weight_decay,
            config.momentum,
            config.centered,
        )
    }
}

/// Configuration for the Adam optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Coefficient for the running average of the gradient
    pub beta1: f64,
    /// Coefficient for the running average of the square of the gradient
    pub beta2: f64,
    /// Weight decay (L2 penalty)
    pub weight_decay: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            beta1: 0.9,
            beta2: 0.999,
            weight_decay: 0.0,
        }
    }
}

impl TryFrom<&AdamConfig> for COptimizer {
    type Error = TchError;
    fn try_from(config: &AdamConfig) -> Result<Self, Self::Error> {
        Self::adam(
            config.learning_rate,
            config.beta1,
            config.beta2,
            config.weight_decay,
        )
    }
}

#[allow(clippy::doc_markdown)]
/// Configuration for the AdamW optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamWConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Coefficient for the running average of the gradient
    pub beta1: f64,
    /// Coefficient for the running average of the square of the gradient
    pub beta2: f64,
    /// Weight decay
    pub weight_decay: f64,
}

impl Default for AdamWConfig {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            beta1: 0.9,
            beta2: 0.999,
            weight_decay: 0.01,
        }
    }
}

impl TryFrom<&AdamWConfig> for COptimizer {
    type Error = TchError;
    fn try_from(config: &AdamWConfig) -> Result<Self, Self::Error> {
        Self::adamw(
            config.learning_rate,
            config.beta1,
            config.beta2,
            config.weight_decay,
        )
    }
}

#[cfg(test)]
#[allow(clippy::module_inception)]
mod coptimizer {
    use super::super::{testing, Optimizer};
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn sgd_optimizes_quadratic() {
        let config = SgdConfig {
            learning_rate: 1e-1,
            ..SgdConfig::default()
        };
        testing::check_optimizes_quadratic(&config, 500);
    }

    #[test]
    fn rms_prop_optimizes_quadratic() {
        let config = RmsPropConfig {
            learning_rate: 1e-1,
            ..RmsPropConfig::default()
        };
        testing::check_optimizes_quadratic(&config, 500);
    }

    #[test]
    fn adam_optimizes_quadratic() {
        let config = AdamConfig {
            learning_rate: 1e-1,
            ..AdamConfig::default()
        };
        testing::check_optimizes_quadratic(&config, 500);
    }

    #[test]
    fn adam_w_optimizes_quadratic() {
        let config = AdamWConfig {
            learning_rate: 1e-1,
            weight_decay: 0.0,
            ..AdamWConfig::default()
        };
        testing::check_optimizes_quadratic(&config, 500);
    }

    #[test]
    fn nan_loss_is_rejected_without_step() {
        let vs = VarStore::new(Device::Cpu);
        let x = vs.root().f_zeros("x", &[2]).unwrap();

        let mut optimizer = SgdConfig::default().build_optimizer(&vs).unwrap();
        #[allow(clippy::eq_op)]
        let result = optimizer.backward_step(&(|| (&x / &x).sum(Kind::Float)));
        assert!(matches!(
            result,
            Err(OptimizerStepError::NonFiniteLoss { loss }) if loss.is_nan()
        ));
        assert_eq!(x, Tensor::zeros(&[2], (Kind::Float, Device::Cpu)));
    }

    #[test]
    fn only_registered_variables_step() {
        let vs = VarStore::new(Device::Cpu);
        let x = vs.root().ones("x", &[1]);
        let other_vs = VarStore::new(Device::Cpu);
        let y = other_vs.root().ones("y", &[1]);

        let mut optimizer = SgdConfig::default().build_optimizer(&vs).unwrap();
        optimizer
            .backward_step_once(&(&x * &y).sum(Kind::Float))
            .unwrap();
        assert!(x.double_value(&[0]) < 1.0);
        assert_eq!(y.double_value(&[0]), 1.0);
    }
}
