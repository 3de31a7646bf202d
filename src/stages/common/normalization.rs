//! Normalizes the input per channel (batch normalization).
//!
//! During training the mean and variance of the current batch are used and
//! folded into running statistics; during inference the running statistics
//! are used. Every channel is then scaled by a learnable `gamma` and shifted
//! by a learnable `beta`:
//!
//! `y = gamma * (x - mean) / sqrt(variance + epsilon) + beta`
//!
//! The stage owns four weights per channel, in this order: `gamma` and `beta`
//! (trainable), `moving_mean` and `moving_variance` (non-trainable).
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use crate::context::Phase;
use crate::error::Result;
use crate::stage::*;
use crate::tensor::Tensor;
use crate::weight::{FillerType, Weight};

#[derive(Debug, Clone)]
/// Normalization Stage
pub struct Normalization {
    axis: Option<usize>,
    momentum: f32,
    epsilon: f32,
}

/// Layout of a batch tensor relative to the normalized axis.
#[derive(Debug, Clone, Copy)]
struct Layout {
    channels: usize,
    /// number of elements after the channel axis
    inner: usize,
}

impl Layout {
    fn channel(&self, index: usize) -> usize {
        (index / self.inner) % self.channels
    }
}

impl Normalization {
    /// Create a Normalization stage from a NormalizationConfig.
    pub fn from_config(config: &NormalizationConfig) -> Normalization {
        Normalization {
            axis: config.axis,
            momentum: config.momentum,
            epsilon: config.epsilon,
        }
    }

    /// The per-sample axis holding the channels.
    fn channel_axis(&self, sample_shape: &[usize]) -> Result<usize> {
        if sample_shape.is_empty() {
            shape_err!("cannot normalize a scalar input");
        }
        let axis = self.axis.unwrap_or(sample_shape.len() - 1);
        if axis >= sample_shape.len() {
            shape_err!("axis {} is out of range for input {:?}", axis, sample_shape);
        }
        Ok(axis)
    }

    fn layout(&self, batch_shape: &[usize]) -> Result<Layout> {
        let axis = self.channel_axis(&batch_shape[1..])? + 1;
        Ok(Layout {
            channels: batch_shape[axis],
            inner: batch_shape[axis + 1..].iter().product(),
        })
    }

    /// Biased mean and variance of every channel of the batch.
    fn batch_statistics(layout: &Layout, data: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let count = (data.len() / layout.channels) as f32;
        let mut mean = vec![0f32; layout.channels];
        for (i, x) in data.iter().enumerate() {
            mean[layout.channel(i)] += *x;
        }
        for m in &mut mean {
            *m /= count;
        }
        let mut variance = vec![0f32; layout.channels];
        for (i, x) in data.iter().enumerate() {
            let c = layout.channel(i);
            variance[c] += (*x - mean[c]).powi(2);
        }
        for v in &mut variance {
            *v /= count;
        }
        (mean, variance)
    }
}

impl IStage for Normalization {
    fn calculate_output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        self.channel_axis(input_shape)?;
        if !(self.epsilon > 0f32) {
            shape_err!("epsilon must be positive, got {}", self.epsilon);
        }
        Ok(input_shape.to_owned())
    }

    fn init_weights(&self, input_shape: &[usize], rng: &mut StdRng) -> Vec<Weight> {
        let channels = match self.channel_axis(input_shape) {
            Ok(axis) => input_shape[axis],
            Err(_) => return Vec::new(),
        };
        let one = FillerType::Constant { value: 1f32 };
        let zero = FillerType::Constant { value: 0f32 };
        vec![
            Weight::new("gamma", &[channels], one, true, rng),
            Weight::new("beta", &[channels], zero, true, rng),
            Weight::new("moving_mean", &[channels], zero, false, rng),
            Weight::new("moving_variance", &[channels], one, false, rng),
        ]
    }

    fn update_running_statistics(&self, weights: &mut [Weight], input: &Tensor) {
        let layout = match self.layout(input.shape()) {
            Ok(layout) => layout,
            Err(_) => return,
        };
        let (mean, variance) = Self::batch_statistics(&layout, input.data());
        let momentum = self.momentum;
        for (moving, batch) in weights[2].values_mut().iter_mut().zip(&mean) {
            *moving = momentum * *moving + (1f32 - momentum) * batch;
        }
        for (moving, batch) in weights[3].values_mut().iter_mut().zip(&variance) {
            *moving = momentum * *moving + (1f32 - momentum) * batch;
        }
    }
}

impl ComputeOutput for Normalization {
    fn compute_output(&self, weights: &[Weight], input: &Tensor, phase: Phase) -> Result<Tensor> {
        let layout = self.layout(input.shape())?;
        let (mean, variance) = match phase {
            Phase::Train => Self::batch_statistics(&layout, input.data()),
            Phase::Test => (weights[2].values().to_vec(), weights[3].values().to_vec()),
        };
        let gamma = weights[0].values();
        let beta = weights[1].values();
        let inv_std: Vec<f32> = variance.iter().map(|v| 1f32 / (v + self.epsilon).sqrt()).collect();
        let output = input.data().iter().enumerate()
            .map(|(i, x)| {
                let c = layout.channel(i);
                gamma[c] * (x - mean[c]) * inv_std[c] + beta[c]
            })
            .collect();
        Tensor::new(input.shape(), output)
    }
}

impl ComputeInputGradient for Normalization {
    /// Gradient through the batch statistics of a training pass.
    fn compute_input_gradient(&self,
                              weights: &[Weight],
                              input: &Tensor,
                              _output: &Tensor,
                              output_gradient: &Tensor) -> Result<Tensor> {
        let layout = self.layout(input.shape())?;
        let data = input.data();
        let gradient_out = output_gradient.data();
        let gamma = weights[0].values();
        let (mean, variance) = Self::batch_statistics(&layout, data);
        let inv_std: Vec<f32> = variance.iter().map(|v| 1f32 / (v + self.epsilon).sqrt()).collect();
        let count = (data.len() / layout.channels) as f32;

        let mut sum_dxhat = vec![0f32; layout.channels];
        let mut sum_dxhat_xhat = vec![0f32; layout.channels];
        for (i, (x, dy)) in data.iter().zip(gradient_out).enumerate() {
            let c = layout.channel(i);
            let dxhat = dy * gamma[c];
            sum_dxhat[c] += dxhat;
            sum_dxhat_xhat[c] += dxhat * (x - mean[c]) * inv_std[c];
        }
        let gradient = data.iter().zip(gradient_out).enumerate()
            .map(|(i, (x, dy))| {
                let c = layout.channel(i);
                let xhat = (x - mean[c]) * inv_std[c];
                inv_std[c] / count * (count * dy * gamma[c] - sum_dxhat[c] - xhat * sum_dxhat_xhat[c])
            })
            .collect();
        Tensor::new(input.shape(), gradient)
    }
}

impl ComputeParametersGradient for Normalization {
    fn compute_parameters_gradient(&self,
                                   _weights: &[Weight],
                                   input: &Tensor,
                                   _output: &Tensor,
                                   output_gradient: &Tensor) -> Vec<Vec<f32>> {
        let layout = match self.layout(input.shape()) {
            Ok(layout) => layout,
            Err(_) => return Vec::new(),
        };
        let data = input.data();
        let (mean, variance) = Self::batch_statistics(&layout, data);
        let mut gamma_gradient = vec![0f32; layout.channels];
        let mut beta_gradient = vec![0f32; layout.channels];
        for (i, (x, dy)) in data.iter().zip(output_gradient.data()).enumerate() {
            let c = layout.channel(i);
            let xhat = (x - mean[c]) / (variance[c] + self.epsilon).sqrt();
            gamma_gradient[c] += dy * xhat;
            beta_gradient[c] += dy;
        }
        vec![gamma_gradient, beta_gradient]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Specifies configuration parameters for a Normalization Stage.
pub struct NormalizationConfig {
    /// The per-sample axis holding the channels; the batch axis isn't counted.
    ///
    /// Default: the last axis
    #[serde(default)]
    pub axis: Option<usize>,
    /// Weight of the old value when updating the running statistics.
    ///
    /// Default: 0.99
    pub momentum: f32,
    /// Added to the variance before taking the square root.
    ///
    /// Default: 0.001
    pub epsilon: f32,
}

impl NormalizationConfig {
    /// Normalize along a specific per-sample axis.
    pub fn with_axis(axis: usize) -> NormalizationConfig {
        NormalizationConfig {
            axis: Some(axis),
            ..NormalizationConfig::default()
        }
    }
}

impl Default for NormalizationConfig {
    fn default() -> NormalizationConfig {
        NormalizationConfig {
            axis: None,
            momentum: 0.99f32,
            epsilon: 0.001f32,
        }
    }
}

impl Into<StageType> for NormalizationConfig {
    fn into(self) -> StageType {
        StageType::Normalization(self)
    }
}
