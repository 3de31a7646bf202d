//! Flattens every sample into a vector.
//!
//! Input of shape n * h * w * c becomes
//! a simple vector output of shape n * (h*w*c).
//!
use crate::context::Phase;
use crate::error::Result;
use crate::stage::*;
use crate::tensor::Tensor;
use crate::weight::Weight;

#[derive(Debug, Clone)]
#[allow(missing_copy_implementations)]
/// Flattening Utility Stage
pub struct Flatten;

impl IStage for Flatten {
    fn calculate_output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        Ok(vec![input_shape.iter().product()])
    }
}

impl ComputeOutput for Flatten {
    fn compute_output(&self, _weights: &[Weight], input: &Tensor, _phase: Phase) -> Result<Tensor> {
        let sample_size = input.sample_shape().iter().product::<usize>();
        input.clone().reshape(&[input.batch_size(), sample_size])
    }
}

impl ComputeInputGradient for Flatten {
    fn compute_input_gradient(&self,
                              _weights: &[Weight],
                              input: &Tensor,
                              _output: &Tensor,
                              output_gradient: &Tensor) -> Result<Tensor> {
        output_gradient.clone().reshape(input.shape())
    }
}

impl ComputeParametersGradient for Flatten {}
