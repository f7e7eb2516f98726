//! Optimizers
mod coptimizer;

pub use coptimizer::{AdamConfig, AdamWConfig, RmsPropConfig, SgdConfig};

use std::error::Error;
use tch::{nn::VarStore, Tensor};
use thiserror::Error;

/// Base optimizer interface
pub trait BaseOptimizer {
    /// Zero out the gradients of all optimized tensors
    fn zero_grad(&mut self) -> Result<(), OptimizerStepError>;
}

/// Optimizer that minimizes a loss function.
pub trait Optimizer: BaseOptimizer {
    /// Perform a loss minimization step using the gradient of a loss function.
    ///
    /// Obtains gradients by backpropagating the result of `loss_fn`.
    ///
    /// # Args
    /// * `loss_fn` - Loss function to minimize.
    ///     Called to obtain the loss tensor, which is back-propagated to obtain a gradient.
    ///     Always evaluated at least once; may be evaluated multiple times.
    ///
    /// # Returns
    /// The initial value of `loss_fn` on success.
    ///
    /// If an error is detected, the parameters are guaranteed to be unchanged from their initial
    /// values.
    fn backward_step(
        &mut self,
        loss_fn: &dyn Fn() -> Tensor,
    ) -> Result<Tensor, OptimizerStepError>;
}

/// Optimizer that minimizes a loss tensor using a single gradient evaluation per step.
///
/// Only the variables registered with the optimizer are updated.
/// Gradients that back-propagation accumulates on other tensors are left in place.
pub trait OnceOptimizer: BaseOptimizer {
    /// Perform a loss minimization step (parameter update).
    ///
    /// Uses the existing gradients stored with the parameter tensor.
    fn step_once(&self) -> Result<(), OptimizerStepError>;

    /// Zero the gradients, back-propagate `loss`, and perform an optimization step.
    ///
    /// # Args
    /// * `loss` - Scalar loss tensor. Back-propagation is applied to this tensor to obtain a
    ///     gradient.
    ///
    /// If the loss is NaN or infinite, no step is taken and the parameters are unchanged.
    fn backward_step_once(&mut self, loss: &Tensor) -> Result<(), OptimizerStepError>;
}

impl<T: OnceOptimizer> Optimizer for T {
    fn backward_step(
        &mut self,
        loss_fn: &dyn Fn() -> Tensor,
    ) -> Result<Tensor, OptimizerStepError> {
        let loss = loss_fn();
        self.backward_step_once(&loss)?;
        Ok(loss)
    }
}

/// Error performing an optimization step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerStepError {
    #[error("loss is not finite: {loss}")]
    NonFiniteLoss { loss: f64 },
    #[error("optimizer backend error: {0}")]
    Backend(String),
}

/// Build an optimizer
pub trait BuildOptimizer {
    type Optimizer;
    type Error: Error;

    /// Build an optimizer for the trainable variables in a variable store.
    fn build_optimizer(&self, vs: &VarStore) -> Result<Self::Optimizer, Self::Error>;
}

#[cfg(test)]
mod testing {
    use super::*;
    use tch::Device;

    pub fn check_optimizes_quadratic<OC>(optimizer_config: &OC, num_steps: u64)
    where
        OC: BuildOptimizer,
        OC::Optimizer: Optimizer,
    {
        // Minimize f(x) = 1/2*x'Mx + b'x
        // with M = [1  -1]  b = [ 2]
        //          [-1  2]      [-3]
        //
        // which is minimized at x = [-1  1]'
        let m = Tensor::of_slice(&[1.0_f32, -1.0, -1.0, 2.0]).reshape(&[2, 2]);
        let b = Tensor::of_slice(&[2.0_f32, -3.0]);

        let vs = VarStore::new(Device::Cpu);
        let x = vs.root().f_zeros("x", &[2]).unwrap();
        let mut optimizer = optimizer_config.build_optimizer(&vs).unwrap();

        let loss_fn = || m.mv(&x).dot(&x) / 2 + b.dot(&x);

        for _ in 0..num_steps {
            let _ = optimizer.backward_step(&loss_fn).unwrap();
        }

        let expected = Tensor::of_slice(&[-1.0_f32, 1.0]);
        assert!(
            (&x - &expected).norm().double_value(&[]) < 1e-3,
            "expected: {:?}, actual: {:?}",
            expected,
            x
        );
    }
}
