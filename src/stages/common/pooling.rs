//! Applies pooling to the input.
//!
//! This stage looks at adjacent values of the input and then computes a
//! simple pooling operation over them (e.g. taking their maximum or average value).
//! *See [PoolingMode][pooling_mode]*
//!
//! [pooling_mode]: ./enum.PoolingMode.html
//!
//! ## Input Data
//!
//! The stage expects channels-last images `(height, width, channels)` and
//! pools every channel independently. Padded cells never take part in a window.
use serde::{Deserialize, Serialize};
use crate::context::Phase;
use crate::error::Result;
use crate::stage::*;
use crate::tensor::Tensor;
use crate::weight::Weight;
use super::{check_image_shape, FilterStage, ImageDims};

#[derive(Debug, Clone)]
/// [Pooling](./index.html) Stage
pub struct Pooling {
    mode: PoolingMode,

    filter_shape: Vec<usize>,
    stride: Vec<usize>,
    padding: Vec<usize>,
}

/// The input rows and columns covered by one pooling window.
struct Window {
    rows: ::std::ops::Range<usize>,
    cols: ::std::ops::Range<usize>,
}

impl Window {
    fn count(&self) -> usize {
        self.rows.len() * self.cols.len()
    }
}

impl Pooling {
    /// Create a Pooling stage from a PoolingConfig.
    pub fn from_config(config: &PoolingConfig) -> Pooling {
        Pooling {
            mode: config.mode,

            filter_shape: config.filter_shape.clone(),
            stride: config.stride.clone(),
            padding: config.padding.clone(),
        }
    }

    /// Visit all windows of a batch with the output pixel they produce.
    fn for_each_window<F: FnMut(usize, usize, &Window)>(&self, input_shape: &[usize], mut f: F) -> Result<ImageDims> {
        let input = ImageDims::of(input_shape);
        let filter = self.spatial_filter_dims(2)?;
        let stride = self.stride_dims(2)?;
        let padding = self.padding_dims(2)?;
        let spatial = Self::calculate_spatial_output_dims(&[input.h, input.w], &filter, &padding, &stride)?;
        let output = ImageDims { h: spatial[0], w: spatial[1], ..input };

        let clip = |start: usize, pad: usize, len: usize, size: usize| {
            let begin = start.saturating_sub(pad).min(size);
            let end = (start + len).saturating_sub(pad).min(size);
            begin..end
        };
        for n in 0..input.n {
            for oy in 0..output.h {
                let rows = clip(oy * stride[0], padding[0], filter[0], input.h);
                for ox in 0..output.w {
                    let cols = clip(ox * stride[1], padding[1], filter[1], input.w);
                    f(n, output.offset(n, oy, ox), &Window { rows: rows.clone(), cols: cols });
                }
            }
        }
        Ok(output)
    }

    /// Flat input index of the maximum of `window` in channel `c`.
    fn argmax(input: &ImageDims, data: &[f32], n: usize, c: usize, window: &Window) -> Option<usize> {
        let mut best: Option<usize> = None;
        for y in window.rows.clone() {
            for x in window.cols.clone() {
                let i = input.offset(n, y, x) + c;
                match best {
                    Some(b) if data[b] >= data[i] => {}
                    _ => best = Some(i),
                }
            }
        }
        best
    }
}

impl FilterStage for Pooling {
    fn filter_shape(&self) -> &[usize] {
        &self.filter_shape
    }

    /// Falls back to the filter shape, so windows don't overlap by default.
    fn stride(&self) -> &[usize] {
        if self.stride.is_empty() { &self.filter_shape } else { &self.stride }
    }

    fn padding(&self) -> &[usize] {
        &self.padding
    }
}

impl IStage for Pooling {
    fn calculate_output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        check_image_shape(input_shape)?;
        let filter = self.spatial_filter_dims(2)?;
        let padding = self.padding_dims(2)?;
        let stride = self.stride_dims(2)?;
        let spatial = Self::calculate_spatial_output_dims(&input_shape[0..2], &filter, &padding, &stride)?;

        Ok(vec![spatial[0], spatial[1], input_shape[2]])
    }
}

impl ComputeOutput for Pooling {
    fn compute_output(&self, _weights: &[Weight], input: &Tensor, _phase: Phase) -> Result<Tensor> {
        let dims = ImageDims::of(input.shape());
        let data = input.data();
        let mut output = Vec::new();
        let out = self.for_each_window(input.shape(), |n, _, window| {
            for c in 0..dims.c {
                let value = match self.mode {
                    PoolingMode::Max => Self::argmax(&dims, data, n, c, window).map_or(0f32, |i| data[i]),
                    PoolingMode::Average => {
                        let mut sum = 0f32;
                        for y in window.rows.clone() {
                            for x in window.cols.clone() {
                                sum += data[dims.offset(n, y, x) + c];
                            }
                        }
                        if window.count() == 0 { 0f32 } else { sum / window.count() as f32 }
                    }
                };
                output.push(value);
            }
        })?;
        Tensor::new(&[out.n, out.h, out.w, out.c], output)
    }
}

impl ComputeInputGradient for Pooling {
    fn compute_input_gradient(&self,
                              _weights: &[Weight],
                              input: &Tensor,
                              _output: &Tensor,
                              output_gradient: &Tensor) -> Result<Tensor> {
        let dims = ImageDims::of(input.shape());
        let data = input.data();
        let gradient_out = output_gradient.data();
        let mut gradient = vec![0f32; input.len()];
        self.for_each_window(input.shape(), |n, out_offset, window| {
            for c in 0..dims.c {
                let dy = gradient_out[out_offset + c];
                match self.mode {
                    PoolingMode::Max => {
                        if let Some(i) = Self::argmax(&dims, data, n, c, window) {
                            gradient[i] += dy;
                        }
                    }
                    PoolingMode::Average => {
                        if window.count() == 0 {
                            continue;
                        }
                        let share = dy / window.count() as f32;
                        for y in window.rows.clone() {
                            for x in window.cols.clone() {
                                gradient[dims.offset(n, y, x) + c] += share;
                            }
                        }
                    }
                }
            }
        })?;
        Tensor::new(input.shape(), gradient)
    }
}

impl ComputeParametersGradient for Pooling {}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Specifies configuration parameters for a Pooling Stage.
pub struct PoolingConfig {
    /// The PoolingMode to use
    pub mode: PoolingMode,
    /// The shape of the filter
    pub filter_shape: Vec<usize>,
    /// The stride size
    ///
    /// Empty means the stride equals the filter shape.
    #[serde(default)]
    pub stride: Vec<usize>,
    /// The padding size
    #[serde(default)]
    pub padding: Vec<usize>,
}

impl PoolingConfig {
    /// Non-overlapping max pooling with a square `window`.
    pub fn max(window: usize) -> PoolingConfig {
        PoolingConfig {
            mode: PoolingMode::Max,
            filter_shape: vec![window],
            stride: Vec::new(),
            padding: Vec::new(),
        }
    }
}

impl Into<StageType> for PoolingConfig {
    fn into(self) -> StageType {
        StageType::Pooling(self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The different modes of pooling that can be calculated.
pub enum PoolingMode {
    /// The maximum value inside the pooling window will be used as result.
    Max,
    /// The average of all values inside the pooling window will be used as result.
    Average,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> Tensor {
        // one 4x4 image with two channels; channel 1 is channel 0 negated
        Tensor::from_fn(&[1, 4, 4, 2], |i| if i % 2 == 0 { (i / 2) as f32 } else { -((i / 2) as f32) })
    }

    #[test]
    fn default_stride_is_the_window() {
        let stage = Pooling::from_config(&PoolingConfig::max(4));
        assert_eq!(vec![1, 1, 32], stage.calculate_output_shape(&[4, 4, 32]).unwrap());
        assert_eq!(vec![16, 16, 32], stage.calculate_output_shape(&[64, 64, 32]).unwrap());
    }

    #[test]
    fn window_larger_than_input_fails() {
        let stage = Pooling::from_config(&PoolingConfig::max(8));
        assert!(stage.calculate_output_shape(&[4, 4, 1]).unwrap_err().is_shape());
    }

    #[test]
    fn max_pooling() {
        let stage = Pooling::from_config(&PoolingConfig::max(2));
        let input = input();
        let output = stage.compute_output(&[], &input, Phase::Test).unwrap();
        assert_eq!(&[1, 2, 2, 2], output.shape());
        assert_eq!(&[5f32, 0., 7., -2., 13., -8., 15., -10.], output.data());

        let ones = output.map(|_| 1f32);
        let gradient = stage.compute_input_gradient(&[], &input, &output, &ones).unwrap();
        assert_eq!(8f32, gradient.data().iter().sum::<f32>());
        // pixel (1, 1) holds the maximum of the first window in channel 0
        assert_eq!(1f32, gradient.data()[(1 * 4 + 1) * 2]);
        // pixel (0, 0) holds the maximum of the first window in channel 1
        assert_eq!(1f32, gradient.data()[1]);
    }

    #[test]
    fn average_pooling() {
        let stage = Pooling::from_config(&PoolingConfig {
            mode: PoolingMode::Average,
            filter_shape: vec![2],
            stride: vec![2],
            padding: vec![],
        });
        let input = input();
        let output = stage.compute_output(&[], &input, Phase::Test).unwrap();
        assert_eq!(&[2.5f32, -2.5, 4.5, -4.5, 10.5, -10.5, 12.5, -12.5], output.data());

        let ones = output.map(|_| 1f32);
        let gradient = stage.compute_input_gradient(&[], &input, &output, &ones).unwrap();
        assert!(gradient.data().iter().all(|&g| g == 0.25));
    }

    #[test]
    fn padded_cells_are_ignored() {
        let stage = Pooling::from_config(&PoolingConfig {
            mode: PoolingMode::Average,
            filter_shape: vec![3],
            stride: vec![1],
            padding: vec![1],
        });
        let input = Tensor::new(&[1, 2, 2, 1], vec![1f32, 2., 3., 4.]).unwrap();
        let output = stage.compute_output(&[], &input, Phase::Test).unwrap();
        assert_eq!(&[1, 2, 2, 1], output.shape());
        assert!(output.data().iter().all(|&v| v == 2.5));
    }
}
