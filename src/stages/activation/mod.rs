//! Provides nonlinear activation methods.
//!
//! Activation Stages take an input Tensor, provide the activation operation and produce an
//! output Tensor of the same shape. Thanks to the nonlinearity of the activation methods, we can
//! 'learn' and detect nonlinearities in our (complex) datasets.
//!
//! The activation operation used should depend on the task at hand. For binary classification
//! a Sigmoid at the very end of the Pipeline turns a score into a probability. Inside the
//! Pipeline ReLU is usually the best choice.
//!
//! The activation function is also sometimes called transfer function.
use serde::{Deserialize, Serialize};

pub use self::elementwise::Activation;

pub mod elementwise;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The available activation functions.
pub enum ActivationKind {
    /// Rectified Linear Unit: `y = max(0, x)`
    ///
    /// The max function used in ReLU is usually faster to compute than the
    /// exponentiation needed in a Sigmoid.
    ReLU,
    /// Log-Sigmoid: `y = (1 + e^(-x))^(-1)`
    ///
    /// Squashes any value into `(0, 1)`, which makes it the natural output
    /// of a binary classifier.
    Sigmoid,
    /// Hyperbolic tangent: `y = tanh(x)`
    TanH,
}

impl ActivationKind {
    /// Apply the activation function to a single value.
    pub fn apply(&self, x: f32) -> f32 {
        match *self {
            ActivationKind::ReLU => if x > 0f32 { x } else { 0f32 },
            ActivationKind::Sigmoid => sigmoid(x),
            ActivationKind::TanH => x.tanh(),
        }
    }

    /// The derivative of the activation function, expressed through its output `y`.
    ///
    /// All supported functions can be differentiated from their output alone,
    /// so the stage input doesn't need to be kept around.
    pub fn derivative_from_output(&self, y: f32) -> f32 {
        match *self {
            ActivationKind::ReLU => if y > 0f32 { 1f32 } else { 0f32 },
            ActivationKind::Sigmoid => y * (1f32 - y),
            ActivationKind::TanH => 1f32 - y * y,
        }
    }
}

/// The logistic function, evaluated without overflowing for large `|x|`.
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0f32 {
        1f32 / (1f32 + (-x).exp())
    } else {
        let z = x.exp();
        z / (1f32 + z)
    }
}
