//! Neural network modules
mod ff;
#[cfg(test)]
pub mod testing;

pub use ff::{Activation, Mlp, MlpConfig};

use tch::{nn::Path, Tensor};

/// Build a [`FeedForwardModule`] with variables in a variable store.
pub trait BuildModule {
    type Module: FeedForwardModule;

    /// Build a new module instance.
    ///
    /// # Args
    /// * `vs` - Variable store path under which the module variables are created.
    /// * `in_dim` - Number of input features.
    /// * `out_dim` - Number of output features.
    fn build_module(&self, vs: &Path, in_dim: usize, out_dim: usize) -> Self::Module;
}

/// A differentiable map from a batch of input feature vectors to output feature vectors.
///
/// The module variables are owned by the variable store the module was built in;
/// gradients are obtained by back-propagating through the output.
pub trait FeedForwardModule {
    /// Apply the module to a batch of inputs with shape `[*BATCH_SHAPE, in_dim]`.
    ///
    /// Returns a tensor with shape `[*BATCH_SHAPE, out_dim]`.
    fn forward(&self, input: &Tensor) -> Tensor;
}
