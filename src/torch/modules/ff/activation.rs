//! Activation functions.
use serde::{Deserialize, Serialize};
use tch::Tensor;

/// Activation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    /// No transformation
    Identity,
    /// Rectified linear
    Relu,
    /// Sigmoid function
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
}

impl Default for Activation {
    #[inline]
    fn default() -> Self {
        Self::Relu
    }
}

impl Activation {
    /// The function pointer for this activation function.
    #[inline]
    pub fn function(&self) -> fn(&Tensor) -> Tensor {
        match self {
            Self::Identity => Tensor::shallow_clone,
            Self::Relu => Tensor::relu,
            Self::Sigmoid => Tensor::sigmoid,
            Self::Tanh => Tensor::tanh,
        }
    }

    /// The function pointer for this activation function if not the identity function.
    #[inline]
    pub fn maybe_function(&self) -> Option<fn(&Tensor) -> Tensor> {
        match self {
            Self::Identity => None,
            _ => Some(self.function()),
        }
    }
}
