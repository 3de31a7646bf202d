//! Pads the spatial axes of an image with zeros.
//!
//! Usually placed in front of a Convolution so the feature maps keep the
//! size of the input image.
use serde::{Deserialize, Serialize};
use crate::context::Phase;
use crate::error::Result;
use crate::stage::*;
use crate::tensor::Tensor;
use crate::weight::Weight;
use super::{check_image_shape, ImageDims};

#[derive(Debug, Clone)]
/// Zero Padding Stage
pub struct Padding {
    padding: Vec<usize>,
}

impl Padding {
    /// Create a Padding stage from a PaddingConfig.
    pub fn from_config(config: &PaddingConfig) -> Padding {
        Padding {
            padding: config.padding.clone(),
        }
    }

    fn padding_dims(&self) -> Result<(usize, usize)> {
        match self.padding.len() {
            1 => Ok((self.padding[0], self.padding[0])),
            2 => Ok((self.padding[0], self.padding[1])),
            _ => shape_err!("padding {:?} needs 1 or 2 values", self.padding),
        }
    }
}

impl IStage for Padding {
    fn calculate_output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        check_image_shape(input_shape)?;
        let (pad_h, pad_w) = self.padding_dims()?;
        Ok(vec![input_shape[0] + 2 * pad_h, input_shape[1] + 2 * pad_w, input_shape[2]])
    }
}

impl ComputeOutput for Padding {
    fn compute_output(&self, _weights: &[Weight], input: &Tensor, _phase: Phase) -> Result<Tensor> {
        let (pad_h, pad_w) = self.padding_dims()?;
        let inp = ImageDims::of(input.shape());
        let out = ImageDims { h: inp.h + 2 * pad_h, w: inp.w + 2 * pad_w, ..inp };
        let mut output = vec![0f32; out.size()];
        let row = inp.w * inp.c;
        for n in 0..inp.n {
            for y in 0..inp.h {
                let src = inp.offset(n, y, 0);
                let dst = out.offset(n, y + pad_h, pad_w);
                output[dst..dst + row].copy_from_slice(&input.data()[src..src + row]);
            }
        }
        Tensor::new(&[out.n, out.h, out.w, out.c], output)
    }
}

impl ComputeInputGradient for Padding {
    fn compute_input_gradient(&self,
                              _weights: &[Weight],
                              input: &Tensor,
                              _output: &Tensor,
                              output_gradient: &Tensor) -> Result<Tensor> {
        let (pad_h, pad_w) = self.padding_dims()?;
        let inp = ImageDims::of(input.shape());
        let out = ImageDims::of(output_gradient.shape());
        let mut gradient = vec![0f32; inp.size()];
        let row = inp.w * inp.c;
        for n in 0..inp.n {
            for y in 0..inp.h {
                let dst = inp.offset(n, y, 0);
                let src = out.offset(n, y + pad_h, pad_w);
                gradient[dst..dst + row].copy_from_slice(&output_gradient.data()[src..src + row]);
            }
        }
        Tensor::new(input.shape(), gradient)
    }
}

impl ComputeParametersGradient for Padding {}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Specifies configuration parameters for a Padding Stage.
pub struct PaddingConfig {
    /// Number of zero rows (added above and below) and zero columns (added left and right).
    ///
    /// A single value is used for both axes.
    pub padding: Vec<usize>,
}

impl Into<StageType> for PaddingConfig {
    fn into(self) -> StageType {
        StageType::Padding(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_and_crops() {
        let stage = Padding::from_config(&PaddingConfig { padding: vec![1, 2] });
        assert_eq!(vec![4, 6, 1], stage.calculate_output_shape(&[2, 2, 1]).unwrap());

        let input = Tensor::new(&[1, 2, 2, 1], vec![1f32, 2., 3., 4.]).unwrap();
        let output = stage.compute_output(&[], &input, Phase::Test).unwrap();
        assert_eq!(&[1, 4, 6, 1], output.shape());
        assert_eq!(10f32, output.data().iter().sum::<f32>());
        assert_eq!(1f32, output.data()[1 * 6 + 2]);
        assert_eq!(4f32, output.data()[2 * 6 + 3]);

        let gradient = stage.compute_input_gradient(&[], &input, &output, &output).unwrap();
        assert_eq!(input, gradient);
    }

    #[test]
    fn needs_image_input() {
        let stage = Padding::from_config(&PaddingConfig { padding: vec![3] });
        assert!(stage.calculate_output_shape(&[4, 4]).unwrap_err().is_shape());
    }
}
