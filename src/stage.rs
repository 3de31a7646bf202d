//! Provides the generics and interfaces for the specific [Stages][stages].
//!
//! A Stage is a single deterministic transformation step of a [Pipeline][pipeline].
//! It takes one Tensor and produces a new one; the input is never modified.
//! Stages may own [Weights][weight], which are the trainable parameters
//! (and running statistics) of the Pipeline.
//!
//! Every stage implementation is split into the three computations of
//! backpropagation learning:
//!
//! - [ComputeOutput][1]: the forward pass.
//! - [ComputeInputGradient][2]: the gradient w.r.t. the stage input.
//! - [ComputeParametersGradient][3]: the gradient w.r.t. the stage's own weights.
//!
//! [stages]: ../stages/index.html
//! [pipeline]: ../pipeline/index.html
//! [weight]: ../weight/struct.Weight.html
//! [1]: ./trait.ComputeOutput.html
//! [2]: ./trait.ComputeInputGradient.html
//! [3]: ./trait.ComputeParametersGradient.html
use std::fmt;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use crate::context::{Context, Phase};
use crate::error::Result;
use crate::stages::*;
use crate::tensor::{shape_size, Tensor};
use crate::weight::{Weight, WeightConfig};

#[derive(Debug)]
/// The generic Stage, wrapping a specific [IStage][1] implementation together with its weights.
/// [1]: ./trait.IStage.html
pub struct Stage {
    /// Identifies the Stage in logs and summaries.
    pub name: String,
    /// The configuration the Stage was created from.
    pub config: Box<StageConfig>,

    worker: Box<dyn IStage>,
    weights: Vec<Weight>,

    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
}

impl Stage {
    /// Create a Stage from a [StageConfig][1] for a given per-sample input shape.
    /// [1]: ./struct.StageConfig.html
    ///
    /// Fails with a shape error if the configuration cannot be applied to `input_shape`.
    pub fn from_config(config: &StageConfig, input_shape: &[usize], ctx: &mut Context) -> Result<Stage> {
        let worker = Self::worker_from_config(config);
        let output_shape = worker.calculate_output_shape(input_shape)
            .map_err(|e| e.in_stage(&config.name))?;
        let mut weights = worker.init_weights(input_shape, ctx.rng());
        if config.weights.len() > weights.len() {
            shape_err!("stage '{}' has {} weights but {} weight configs were given",
                       config.name, weights.len(), config.weights.len());
        }
        for (weight, weight_config) in weights.iter_mut().zip(&config.weights) {
            weight.configure(weight_config, ctx.rng());
        }
        debug!("{} {:?} -> {:?} ({} parameters)",
               config.name, input_shape, output_shape,
               weights.iter().map(|w| w.len()).sum::<usize>());

        Ok(Stage {
            name: config.name.clone(),
            config: Box::new(config.clone()),
            worker: worker,
            weights: weights,
            input_shape: input_shape.to_owned(),
            output_shape: output_shape,
        })
    }

    /// Helper for [from_config] to match a [StageType][2] to its [implementation][3].
    /// [1]: #method.from_config
    /// [2]: ./enum.StageType.html
    /// [3]: ../stages/index.html
    fn worker_from_config(config: &StageConfig) -> Box<dyn IStage> {
        match config.stage_type.clone() {
            StageType::Padding(cfg) => Box::new(Padding::from_config(&cfg)),
            StageType::Convolution(cfg) => Box::new(Convolution::from_config(&cfg)),
            StageType::Normalization(cfg) => Box::new(Normalization::from_config(&cfg)),
            StageType::ReLU => Box::new(Activation::new(ActivationKind::ReLU)),
            StageType::Sigmoid => Box::new(Activation::new(ActivationKind::Sigmoid)),
            StageType::TanH => Box::new(Activation::new(ActivationKind::TanH)),
            StageType::Pooling(cfg) => Box::new(Pooling::from_config(&cfg)),
            StageType::Flatten => Box::new(Flatten),
            StageType::Dense(cfg) => Box::new(Dense::from_config(&cfg)),
            StageType::Reshape(cfg) => Box::new(Reshape::from_config(&cfg)),
        }
    }

    /// Compute the output for a batch.
    ///
    /// Fails with a shape error unless the batch is `(N, input_shape)` with `N > 0`.
    pub fn forward(&self, input: &Tensor, phase: Phase) -> Result<Tensor> {
        trace!("Forward {} {}", self.name, input.shape_string());
        check_batch_shape(input, &self.input_shape).map_err(|e| e.in_stage(&self.name))?;
        self.worker.compute_output(&self.weights, input, phase)
    }

    /// Let the stage fold the statistics of a training batch into its running state.
    pub fn update_running_statistics(&mut self, input: &Tensor) {
        self.worker.update_running_statistics(&mut self.weights, input);
    }

    /// Backpropagate `output_gradient` through the stage.
    ///
    /// Accumulates the parameter gradients into the stage's weights and returns
    /// the gradient w.r.t. the input if `propagate_down` is set.
    pub fn backward(&mut self,
                    input: &Tensor,
                    output: &Tensor,
                    output_gradient: &Tensor,
                    propagate_down: bool) -> Result<Option<Tensor>> {
        self.check_backward_shapes(input, output, output_gradient)
            .map_err(|e| e.in_stage(&self.name))?;
        let gradients = self.worker.compute_parameters_gradient(&self.weights, input, output, output_gradient);
        for (weight, gradient) in self.weights.iter_mut().zip(gradients) {
            weight.accumulate_gradient(&gradient);
        }
        if propagate_down {
            let input_gradient = self.worker.compute_input_gradient(&self.weights, input, output, output_gradient)?;
            Ok(Some(input_gradient))
        } else {
            Ok(None)
        }
    }

    /// Input, output and output gradient must describe the same batch.
    fn check_backward_shapes(&self, input: &Tensor, output: &Tensor, output_gradient: &Tensor) -> Result<()> {
        check_batch_shape(input, &self.input_shape)?;
        check_batch_shape(output, &self.output_shape)?;
        check_batch_shape(output_gradient, &self.output_shape)?;
        if output.batch_size() != input.batch_size() || output_gradient.batch_size() != input.batch_size() {
            shape_err!("batch sizes differ: input {}, output {}, output gradient {}",
                       input.batch_size(), output.batch_size(), output_gradient.batch_size());
        }
        Ok(())
    }

    /// The per-sample shape the stage accepts.
    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    /// The per-sample shape the stage produces.
    pub fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    /// All weights of the stage, trainable ones first.
    pub fn weights(&self) -> &[Weight] {
        &self.weights
    }

    /// Mutable access to all weights of the stage.
    pub fn weights_mut(&mut self) -> &mut [Weight] {
        &mut self.weights
    }

    /// Number of parameters, including non-trainable ones.
    pub fn param_count(&self) -> usize {
        self.weights.iter().map(|w| w.len()).sum()
    }

    /// Number of trainable parameters.
    pub fn trainable_param_count(&self) -> usize {
        self.weights.iter().filter(|w| w.is_trainable()).map(|w| w.len()).sum()
    }

    /// Reset the accumulated gradients of all weights.
    pub fn clear_weights_gradients(&mut self) {
        for weight in &mut self.weights {
            weight.clear_gradient();
        }
    }
}

/// A Stage in a [Pipeline][1].
/// [1]: ../pipeline/struct.Pipeline.html
///
/// See [Stages][2]
/// [2]: ../stages/index.html
pub trait IStage : ComputeOutput + ComputeInputGradient + ComputeParametersGradient + fmt::Debug {
    /// Calculate the per-sample output shape for a per-sample input shape.
    ///
    /// Fails with a shape error if the stage's configuration is incompatible
    /// with `input_shape`.
    fn calculate_output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>>;

    /// Create the weights of the stage, trainable weights first.
    ///
    /// Stages without parameters don't need to override this.
    fn init_weights(&self, _input_shape: &[usize], _rng: &mut StdRng) -> Vec<Weight> {
        Vec::new()
    }

    /// Fold the statistics of a training batch into non-trainable weights.
    ///
    /// Only used by stages with running statistics.
    fn update_running_statistics(&self, _weights: &mut [Weight], _input: &Tensor) {}
}

/// A Stage that can compute its output.
pub trait ComputeOutput {
    /// Compute the output for a batch `input` in the given `phase`.
    fn compute_output(&self,
                      weights: &[Weight],
                      input: &Tensor,
                      phase: Phase) -> Result<Tensor>;
}

/// A Stage that can compute the gradient with respect to its input.
pub trait ComputeInputGradient {
    /// Compute the gradient with respect to the input.
    fn compute_input_gradient(&self,
                              weights: &[Weight],
                              input: &Tensor,
                              output: &Tensor,
                              output_gradient: &Tensor) -> Result<Tensor>;
}

/// A Stage that can compute the gradient with respect to its parameters.
pub trait ComputeParametersGradient {
    /// Compute the gradients with respect to the trainable weights, in weight order.
    ///
    /// Stages without trainable weights don't need to override this.
    fn compute_parameters_gradient(&self,
                                   _weights: &[Weight],
                                   _input: &Tensor,
                                   _output: &Tensor,
                                   _output_gradient: &Tensor) -> Vec<Vec<f32>> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Stage Configuration Struct
pub struct StageConfig {
    /// The name of the Stage
    pub name: String,

    /// The type of the Stage
    pub stage_type: StageType,

    /// Training configuration for the weights of the stage, in weight order.
    #[serde(default)]
    pub weights: Vec<WeightConfig>,
}

impl StageConfig {
    /// Creates a new StageConfig
    pub fn new<L: Into<StageType>>(name: &str, stage_type: L) -> StageConfig {
        StageConfig {
            name: name.to_owned(),
            stage_type: stage_type.into(),
            weights: Vec::new(),
        }
    }

    /// Add a weight configuration; the n-th call configures the n-th weight.
    pub fn add_weight_config(&mut self, config: WeightConfig) {
        self.weights.push(config);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// The Stage Types
pub enum StageType {
    // Common stages
    /// Zero padding of the spatial axes
    Padding(PaddingConfig),
    /// Convolution Stage
    Convolution(ConvolutionConfig),
    /// Batch Normalization Stage
    Normalization(NormalizationConfig),
    /// Pooling Stage
    Pooling(PoolingConfig),
    /// Fully connected Stage
    Dense(DenseConfig),
    // Activation stages
    /// ReLU Stage
    ReLU,
    /// Sigmoid Stage
    Sigmoid,
    /// TanH Stage
    TanH,
    // Utility stages
    /// Flatten Stage
    Flatten,
    /// Reshape Stage
    Reshape(ReshapeConfig),
}

impl StageType {
    /// Short name of the stage kind, as shown in [Pipeline summaries][1].
    /// [1]: ../pipeline/struct.Pipeline.html#method.summary
    pub fn kind(&self) -> &'static str {
        match *self {
            StageType::Padding(_) => "Padding",
            StageType::Convolution(_) => "Convolution",
            StageType::Normalization(_) => "Normalization",
            StageType::Pooling(_) => "Pooling",
            StageType::Dense(_) => "Dense",
            StageType::ReLU => "ReLU",
            StageType::Sigmoid => "Sigmoid",
            StageType::TanH => "TanH",
            StageType::Flatten => "Flatten",
            StageType::Reshape(_) => "Reshape",
        }
    }
}

impl From<ActivationKind> for StageType {
    fn from(kind: ActivationKind) -> StageType {
        match kind {
            ActivationKind::ReLU => StageType::ReLU,
            ActivationKind::Sigmoid => StageType::Sigmoid,
            ActivationKind::TanH => StageType::TanH,
        }
    }
}

/// Check that a batch tensor carries the per-sample shape `sample_shape`.
pub fn check_batch_shape(batch: &Tensor, sample_shape: &[usize]) -> Result<()> {
    if batch.rank() != sample_shape.len() + 1 || batch.sample_shape() != sample_shape {
        shape_err!("expected a batch of shape (N, {}), got {:?}",
                   sample_shape.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", "),
                   batch.shape());
    }
    if batch.batch_size() == 0 {
        shape_err!("batch of shape {:?} holds no samples", batch.shape());
    }
    debug_assert_eq!(batch.len(), batch.batch_size() * shape_size(sample_shape));
    Ok(())
}
