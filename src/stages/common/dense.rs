//! Applies a linear transformation to the input data `y = act(x * a + b)`
//!
//! The variables are:
//!
//! - `y`: output value
//! - `a`: kernel (a trainable weight of shape `(input_size, output_size)`)
//! - `x`: input value
//! - `b`: bias (a trainable weight of shape `(output_size)`)
//! - `act`: an optional [activation][1], applied to the result
//!
//! [1]: ../../activation/enum.ActivationKind.html
//!
//! ## Input
//!
//! Every sample has to be a vector; use a [Flatten][2] stage in front of a
//! Dense stage to turn feature maps into a vector.
//!
//! [2]: ../../utility/flatten/struct.Flatten.html
//!
//! In the context of convolutional neural networks this stage is also
//! called a "fully-connected layer" if it is used at the end of the network.
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use crate::context::Phase;
use crate::error::Result;
use crate::stage::*;
use crate::stages::ActivationKind;
use crate::tensor::Tensor;
use crate::weight::{FillerType, Weight};

#[derive(Debug, Clone)]
/// Dense Stage
pub struct Dense {
    output_size: usize,
    activation: Option<ActivationKind>,
}

impl Dense {
    /// Create a Dense stage from a DenseConfig.
    pub fn from_config(config: &DenseConfig) -> Dense {
        Dense {
            output_size: config.output_size,
            activation: config.activation,
        }
    }

    /// Gradient w.r.t. the pre-activation values.
    fn pre_activation_gradient(&self, output: &Tensor, output_gradient: &Tensor) -> Vec<f32> {
        match self.activation {
            Some(kind) => output.data().iter().zip(output_gradient.data())
                .map(|(&y, &dy)| dy * kind.derivative_from_output(y))
                .collect(),
            None => output_gradient.data().to_vec(),
        }
    }
}

impl IStage for Dense {
    fn calculate_output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        if input_shape.len() != 1 {
            shape_err!("a dense stage needs vector samples, got {:?} (flatten first)", input_shape);
        }
        if input_shape[0] == 0 || self.output_size == 0 {
            shape_err!("a dense stage can't map {} inputs to {} outputs", input_shape[0], self.output_size);
        }
        Ok(vec![self.output_size])
    }

    fn init_weights(&self, input_shape: &[usize], rng: &mut StdRng) -> Vec<Weight> {
        let input_size = input_shape.iter().product();
        let filler = FillerType::Glorot {
            input_size: input_size,
            output_size: self.output_size,
        };
        vec![
            Weight::new("kernel", &[input_size, self.output_size], filler, true, rng),
            Weight::new("bias", &[self.output_size], FillerType::Constant { value: 0f32 }, true, rng),
        ]
    }
}

impl ComputeOutput for Dense {
    fn compute_output(&self, weights: &[Weight], input: &Tensor, _phase: Phase) -> Result<Tensor> {
        let kernel = weights[0].values();
        let bias = weights[1].values();
        let input_size = input.sample_shape().iter().product::<usize>();
        let mut output = Vec::with_capacity(input.batch_size() * self.output_size);
        for sample in input.data().chunks(input_size) {
            let mut row = bias.to_vec();
            for (x, kernel_row) in sample.iter().zip(kernel.chunks(self.output_size)) {
                for (o, k) in row.iter_mut().zip(kernel_row) {
                    *o += x * k;
                }
            }
            if let Some(kind) = self.activation {
                for o in &mut row {
                    *o = kind.apply(*o);
                }
            }
            output.extend(row);
        }
        Tensor::new(&[input.batch_size(), self.output_size], output)
    }
}

impl ComputeInputGradient for Dense {
    fn compute_input_gradient(&self,
                              weights: &[Weight],
                              input: &Tensor,
                              output: &Tensor,
                              output_gradient: &Tensor) -> Result<Tensor> {
        let kernel = weights[0].values();
        let dz = self.pre_activation_gradient(output, output_gradient);
        let mut gradient = Vec::with_capacity(input.len());
        for dz_row in dz.chunks(self.output_size) {
            for kernel_row in kernel.chunks(self.output_size) {
                gradient.push(kernel_row.iter().zip(dz_row).map(|(k, g)| k * g).sum::<f32>());
            }
        }
        Tensor::new(input.shape(), gradient)
    }
}

impl ComputeParametersGradient for Dense {
    fn compute_parameters_gradient(&self,
                                   weights: &[Weight],
                                   input: &Tensor,
                                   output: &Tensor,
                                   output_gradient: &Tensor) -> Vec<Vec<f32>> {
        let dz = self.pre_activation_gradient(output, output_gradient);
        let input_size = weights[0].shape()[0];

        // gradient w.r.t. kernel
        let mut kernel_gradient = vec![0f32; weights[0].len()];
        for (sample, dz_row) in input.data().chunks(input_size).zip(dz.chunks(self.output_size)) {
            for (x, kernel_row) in sample.iter().zip(kernel_gradient.chunks_mut(self.output_size)) {
                for (k, g) in kernel_row.iter_mut().zip(dz_row) {
                    *k += x * g;
                }
            }
        }

        // gradient w.r.t. bias
        let mut bias_gradient = vec![0f32; self.output_size];
        for dz_row in dz.chunks(self.output_size) {
            for (b, g) in bias_gradient.iter_mut().zip(dz_row) {
                *b += *g;
            }
        }

        vec![kernel_gradient, bias_gradient]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(missing_copy_implementations)]
/// Specifies configuration parameters for a Dense Stage.
pub struct DenseConfig {
    /// The number of output values
    pub output_size: usize,
    /// Activation applied to the output values
    #[serde(default)]
    pub activation: Option<ActivationKind>,
}

impl DenseConfig {
    /// A Dense stage without activation.
    pub fn linear(output_size: usize) -> DenseConfig {
        DenseConfig {
            output_size: output_size,
            activation: None,
        }
    }
}

impl Into<StageType> for DenseConfig {
    fn into(self) -> StageType {
        StageType::Dense(self)
    }
}
