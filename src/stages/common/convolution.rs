//! Convolves the input tensor.
//!
//! Does this convolution with a set of learnable filters, each producing one
//! feature map in the output tensor.
//!
//! ## Input Data
//!
//! The stage expects channels-last images `(height, width, channels)`.
//! The filters are stored as `(filter_h, filter_w, input_channels, num_output)`
//! followed by one bias per output feature map.
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use crate::context::Phase;
use crate::error::Result;
use crate::stage::*;
use crate::tensor::Tensor;
use crate::weight::{FillerType, Weight};
use super::{check_image_shape, FilterStage, ImageDims};

#[derive(Debug, Clone)]
/// Convolution Stage
pub struct Convolution {
    num_output: usize,
    filter_shape: Vec<usize>,
    stride: Vec<usize>,
    padding: Vec<usize>,
}

/// Resolved geometry of one convolution.
struct Geometry {
    input: ImageDims,
    output: ImageDims,
    filter: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
}

impl Geometry {
    /// Input position for output position `o` and filter tap `k` along one axis.
    fn source(o: usize, k: usize, stride: usize, padding: usize, size: usize) -> Option<usize> {
        let pos = (o * stride + k) as isize - padding as isize;
        if pos < 0 || pos >= size as isize { None } else { Some(pos as usize) }
    }

    /// Visit every valid (output pixel, filter tap, input pixel) combination.
    ///
    /// `f` receives the output offset, the offset of the filter tap
    /// `(fy, fx, 0, 0)` and the input offset.
    fn for_each_tap<F: FnMut(usize, usize, usize)>(&self, mut f: F) {
        let (filter_h, filter_w) = self.filter;
        let tap_size = self.input.c * self.output.c;
        for n in 0..self.input.n {
            for oy in 0..self.output.h {
                for ox in 0..self.output.w {
                    let out_offset = self.output.offset(n, oy, ox);
                    for fy in 0..filter_h {
                        let iy = match Self::source(oy, fy, self.stride.0, self.padding.0, self.input.h) {
                            Some(iy) => iy,
                            None => continue,
                        };
                        for fx in 0..filter_w {
                            let ix = match Self::source(ox, fx, self.stride.1, self.padding.1, self.input.w) {
                                Some(ix) => ix,
                                None => continue,
                            };
                            f(out_offset, (fy * filter_w + fx) * tap_size, self.input.offset(n, iy, ix));
                        }
                    }
                }
            }
        }
    }
}

impl Convolution {
    /// Create a Convolution stage from a ConvolutionConfig.
    pub fn from_config(config: &ConvolutionConfig) -> Convolution {
        Convolution {
            num_output: config.num_output,

            filter_shape: config.filter_shape.clone(),
            stride: config.stride.clone(),
            padding: config.padding.clone(),
        }
    }

    fn calculate_filter_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        let spatial_dims = self.spatial_filter_dims(2)?;
        let filter_c = input_shape[2]; // number of input feature maps
        Ok(vec![spatial_dims[0], spatial_dims[1], filter_c, self.num_output])
    }

    fn geometry(&self, input_shape: &[usize]) -> Result<Geometry> {
        let input = ImageDims::of(input_shape);
        let filter = self.spatial_filter_dims(2)?;
        let stride = self.stride_dims(2)?;
        let padding = self.padding_dims(2)?;
        let spatial = Self::calculate_spatial_output_dims(&[input.h, input.w], &filter, &padding, &stride)?;
        Ok(Geometry {
            input: input,
            output: ImageDims { n: input.n, h: spatial[0], w: spatial[1], c: self.num_output },
            filter: (filter[0], filter[1]),
            stride: (stride[0], stride[1]),
            padding: (padding[0], padding[1]),
        })
    }
}

impl FilterStage for Convolution {
    fn filter_shape(&self) -> &[usize] {
        &self.filter_shape
    }

    fn stride(&self) -> &[usize] {
        &self.stride
    }

    fn padding(&self) -> &[usize] {
        &self.padding
    }
}

impl IStage for Convolution {
    fn calculate_output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        check_image_shape(input_shape)?;
        if self.num_output == 0 {
            shape_err!("a convolution needs at least one output feature map");
        }
        let filter = self.spatial_filter_dims(2)?;
        let stride = self.stride_dims(2)?;
        let padding = self.padding_dims(2)?;
        let spatial = Self::calculate_spatial_output_dims(&input_shape[0..2], &filter, &padding, &stride)?;

        Ok(vec![spatial[0], spatial[1], self.num_output])
    }

    fn init_weights(&self, input_shape: &[usize], rng: &mut StdRng) -> Vec<Weight> {
        let filter_shape = match self.calculate_filter_shape(input_shape) {
            Ok(shape) => shape,
            Err(_) => return Vec::new(),
        };
        let receptive_field = filter_shape[0] * filter_shape[1];
        let filler = FillerType::Glorot {
            input_size: receptive_field * filter_shape[2],
            output_size: receptive_field * filter_shape[3],
        };
        vec![
            Weight::new("kernel", &filter_shape, filler, true, rng),
            Weight::new("bias", &[self.num_output], FillerType::Constant { value: 0f32 }, true, rng),
        ]
    }
}

impl ComputeOutput for Convolution {
    fn compute_output(&self, weights: &[Weight], input: &Tensor, _phase: Phase) -> Result<Tensor> {
        let geometry = self.geometry(input.shape())?;
        let filter = weights[0].values();
        let bias = weights[1].values();
        let (c_in, c_out) = (geometry.input.c, geometry.output.c);
        let data = input.data();

        let mut output = vec![0f32; geometry.output.size()];
        for chunk in output.chunks_mut(c_out) {
            chunk.copy_from_slice(bias);
        }
        geometry.for_each_tap(|out_offset, tap_offset, in_offset| {
            let out_pixel = &mut output[out_offset..out_offset + c_out];
            for ci in 0..c_in {
                let x = data[in_offset + ci];
                let taps = &filter[tap_offset + ci * c_out..tap_offset + (ci + 1) * c_out];
                for (o, k) in out_pixel.iter_mut().zip(taps) {
                    *o += x * k;
                }
            }
        });
        let out = geometry.output;
        Tensor::new(&[out.n, out.h, out.w, out.c], output)
    }
}

impl ComputeInputGradient for Convolution {
    fn compute_input_gradient(&self,
                              weights: &[Weight],
                              input: &Tensor,
                              _output: &Tensor,
                              output_gradient: &Tensor) -> Result<Tensor> {
        let geometry = self.geometry(input.shape())?;
        let filter = weights[0].values();
        let (c_in, c_out) = (geometry.input.c, geometry.output.c);
        let gradient_out = output_gradient.data();

        // compute gradient w.r.t. input
        let mut gradient = vec![0f32; input.len()];
        geometry.for_each_tap(|out_offset, tap_offset, in_offset| {
            let dy = &gradient_out[out_offset..out_offset + c_out];
            for ci in 0..c_in {
                let taps = &filter[tap_offset + ci * c_out..tap_offset + (ci + 1) * c_out];
                gradient[in_offset + ci] += taps.iter().zip(dy).map(|(k, g)| k * g).sum::<f32>();
            }
        });
        Tensor::new(input.shape(), gradient)
    }
}

impl ComputeParametersGradient for Convolution {
    fn compute_parameters_gradient(&self,
                                   weights: &[Weight],
                                   input: &Tensor,
                                   _output: &Tensor,
                                   output_gradient: &Tensor) -> Vec<Vec<f32>> {
        let geometry = match self.geometry(input.shape()) {
            Ok(geometry) => geometry,
            Err(_) => return Vec::new(),
        };
        let (c_in, c_out) = (geometry.input.c, geometry.output.c);
        let data = input.data();
        let gradient_out = output_gradient.data();

        // compute gradient w.r.t. filter
        let mut filter_gradient = vec![0f32; weights[0].len()];
        geometry.for_each_tap(|out_offset, tap_offset, in_offset| {
            let dy = &gradient_out[out_offset..out_offset + c_out];
            for ci in 0..c_in {
                let x = data[in_offset + ci];
                let taps = &mut filter_gradient[tap_offset + ci * c_out..tap_offset + (ci + 1) * c_out];
                for (k, g) in taps.iter_mut().zip(dy) {
                    *k += x * g;
                }
            }
        });

        // compute gradient w.r.t. bias
        let mut bias_gradient = vec![0f32; c_out];
        for dy in gradient_out.chunks(c_out) {
            for (b, g) in bias_gradient.iter_mut().zip(dy) {
                *b += *g;
            }
        }

        vec![filter_gradient, bias_gradient]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Specifies configuration parameters for a Convolution Stage.
pub struct ConvolutionConfig {
    /// The number of output feature maps
    pub num_output: usize,
    /// The size of the kernel
    pub filter_shape: Vec<usize>,
    /// The stride size
    pub stride: Vec<usize>,
    /// The padding size
    #[serde(default)]
    pub padding: Vec<usize>,
}

impl Into<StageType> for ConvolutionConfig {
    fn into(self) -> StageType {
        StageType::Convolution(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use super::*;

    fn config(num_output: usize, filter: usize, stride: usize, padding: usize) -> ConvolutionConfig {
        ConvolutionConfig {
            num_output: num_output,

            filter_shape: vec![filter],
            stride: vec![stride],
            padding: vec![padding],
        }
    }

    #[test]
    fn correct_shapes() {
        let stage = Convolution::from_config(&config(64, 11, 4, 2));
        assert_eq!(vec![11, 11], stage.spatial_filter_dims(2).unwrap());
        assert_eq!(vec![2, 2], stage.padding_dims(2).unwrap());
        assert_eq!(vec![4, 4], stage.stride_dims(2).unwrap());
        assert_eq!(vec![11, 11, 3, 64], stage.calculate_filter_shape(&[224, 224, 3]).unwrap());
        assert_eq!(vec![55, 55, 64], stage.calculate_output_shape(&[224, 224, 3]).unwrap());
    }

    #[test]
    fn kernel_larger_than_input_fails() {
        let stage = Convolution::from_config(&config(4, 5, 1, 0));
        assert!(stage.calculate_output_shape(&[4, 4, 1]).unwrap_err().is_shape());
    }

    #[test]
    fn parameter_count() {
        let stage = Convolution::from_config(&config(32, 7, 1, 0));
        let weights = stage.init_weights(&[70, 70, 3], Context::seeded(0).rng());
        let count: usize = weights.iter().map(|w| w.len()).sum();
        assert_eq!(32 * (7 * 7 * 3 + 1), count);
    }

    #[test]
    fn computes_cross_correlation() {
        let stage = Convolution::from_config(&config(1, 2, 1, 0));
        let weights = vec![
            Weight::from_values("kernel", &[2, 2, 1, 1], vec![1f32, 0., 0., -1.], true),
            Weight::from_values("bias", &[1], vec![0.5], true),
        ];
        let input = Tensor::new(&[1, 3, 3, 1], (1..10).map(|v| v as f32).collect()).unwrap();
        let output = stage.compute_output(&weights, &input, Phase::Test).unwrap();
        assert_eq!(&[1, 2, 2, 1], output.shape());
        // x[y][x] - x[y+1][x+1] + 0.5 is always 1 - 5 + 0.5
        assert_eq!(&[-3.5f32, -3.5, -3.5, -3.5], output.data());
    }

    #[test]
    fn gradients_match_finite_differences() {
        let stage = Convolution::from_config(&config(2, 3, 2, 1));
        let mut ctx = Context::seeded(3);
        let weights = stage.init_weights(&[5, 5, 2], ctx.rng());
        let input = Tensor::from_fn(&[2, 5, 5, 2], |i| ((i * 7 % 11) as f32 - 5.0) / 5.0);
        let output = stage.compute_output(&weights, &input, Phase::Train).unwrap();
        // loss = sum(output), so the output gradient is all ones
        let ones = output.map(|_| 1f32);
        let input_gradient = stage.compute_input_gradient(&weights, &input, &output, &ones).unwrap();
        let parameter_gradients = stage.compute_parameters_gradient(&weights, &input, &output, &ones);

        let loss = |weights: &[Weight], input: &Tensor| -> f32 {
            stage.compute_output(weights, input, Phase::Train).unwrap().data().iter().sum()
        };
        let h = 1e-2f32;
        for &i in &[0usize, 13, 49, 99] {
            let mut plus = input.clone().into_data();
            let mut minus = plus.clone();
            plus[i] += h;
            minus[i] -= h;
            let numeric = (loss(&weights, &Tensor::new(input.shape(), plus).unwrap())
                - loss(&weights, &Tensor::new(input.shape(), minus).unwrap())) / (2f32 * h);
            assert!((numeric - input_gradient.data()[i]).abs() < 1e-2);
        }
        for &i in &[0usize, 5, 17, 35] {
            let mut plus = weights.clone();
            let mut minus = weights.clone();
            plus[0].values_mut()[i] += h;
            minus[0].values_mut()[i] -= h;
            let numeric = (loss(&plus, &input) - loss(&minus, &input)) / (2f32 * h);
            assert!((numeric - parameter_gradients[0][i]).abs() < 1e-2);
        }
        assert_eq!(2, parameter_gradients[1].len());
        assert_eq!(output.len() as f32 / 2f32, parameter_gradients[1][0]);
    }
}
