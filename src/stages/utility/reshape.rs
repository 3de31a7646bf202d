//! Utility stage to give every sample another shape.
//!
//! Reshaping is required so that the values become
//! usable for Stages that interpret meaning into the shape of
//! the tensor.
//!
//! Image stages interpret samples as HWC,
//! where the letters stand for:
//!
//! - `H` : height
//! - `W` : width
//! - `C` : number of feature maps
//!
//! The batch axis `N` is kept as it is.
use serde::{Deserialize, Serialize};
use crate::context::Phase;
use crate::error::Result;
use crate::stage::*;
use crate::tensor::{shape_size, Tensor};
use crate::weight::Weight;

#[derive(Debug, Clone)]
/// Reshape Utility Stage
pub struct Reshape {
    shape: Vec<usize>,
}

impl Reshape {
    /// Create a Reshape stage from a ReshapeConfig.
    pub fn from_config(config: &ReshapeConfig) -> Reshape {
        Reshape {
            shape: config.shape.clone(),
        }
    }
}

impl IStage for Reshape {
    fn calculate_output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        if shape_size(input_shape) != shape_size(&self.shape) {
            shape_err!("cannot reshape samples of shape {:?} into {:?}", input_shape, self.shape);
        }
        Ok(self.shape.clone())
    }
}

impl ComputeOutput for Reshape {
    fn compute_output(&self, _weights: &[Weight], input: &Tensor, _phase: Phase) -> Result<Tensor> {
        let mut shape = vec![input.batch_size()];
        shape.extend_from_slice(&self.shape);
        input.clone().reshape(&shape)
    }
}

impl ComputeInputGradient for Reshape {
    fn compute_input_gradient(&self,
                              _weights: &[Weight],
                              input: &Tensor,
                              _output: &Tensor,
                              output_gradient: &Tensor) -> Result<Tensor> {
        output_gradient.clone().reshape(input.shape())
    }
}

impl ComputeParametersGradient for Reshape {}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Specifies configuration parameters for a Reshape Stage.
pub struct ReshapeConfig {
    /// The per-sample shape that the input should assume.
    ///
    /// The batch axis is not part of the shape.
    pub shape: Vec<usize>,
}

impl ReshapeConfig {
    /// Create a ReshapeConfig that describes a Reshape stage with a provided shape.
    pub fn of_shape(shape: &[usize]) -> ReshapeConfig {
        ReshapeConfig {
            shape: shape.to_owned()
        }
    }
}

impl Into<StageType> for ReshapeConfig {
    fn into(self) -> StageType {
        StageType::Reshape(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reshapes_samples() {
        let stage = Reshape::from_config(&ReshapeConfig::of_shape(&[2, 3]));
        assert_eq!(vec![2, 3], stage.calculate_output_shape(&[6]).unwrap());
        assert!(stage.calculate_output_shape(&[5]).unwrap_err().is_shape());

        let input = Tensor::from_fn(&[4, 6], |i| i as f32);
        let output = stage.compute_output(&[], &input, Phase::Test).unwrap();
        assert_eq!(&[4, 2, 3], output.shape());
    }
}
