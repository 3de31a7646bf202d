//! Provides the Trainer that optimizes a [Pipeline][1] against a Dataset.
//!
//! The Trainer drives the repeated forward evaluation of the Pipeline, compares
//! the output with the labels through an [Objective][2] and asks an
//! [Optimizer][3] to update the trainable weights.
//!
//! See [Optimizers][optimizers]
//!
//! [1]: ../pipeline/struct.Pipeline.html
//! [2]: ./objective/enum.Objective.html
//! [3]: ./trait.Optimizer.html
//! [optimizers]: ../optimizers/index.html

pub mod confusion_matrix;
pub mod objective;

pub use self::confusion_matrix::ConfusionMatrix;
pub use self::objective::Objective;

use std::fmt;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use crate::context::{Context, Phase};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::optimizers::*;
use crate::pipeline::Pipeline;
use crate::stage::check_batch_shape;
use crate::tensor::Tensor;
use crate::weight::Weight;

/// Trainer that optimizes a [Pipeline][1] with a given objective.
/// [1]: ../pipeline/struct.Pipeline.html
pub struct Trainer {
    pipeline: Pipeline,
    /// The implementation of the Optimizer
    pub worker: Box<dyn Optimizer>,

    config: TrainerConfig,

    /// The current iteration / number of times weights have been updated
    iter: usize,
}

impl fmt::Debug for Trainer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Trainer")
            .field("pipeline", &self.pipeline.name())
            .field("config", &self.config)
            .field("iter", &self.iter)
            .finish()
    }
}

impl Trainer {
    /// Create a Trainer from a [TrainerConfig][1]
    /// [1]: ./struct.TrainerConfig.html
    ///
    /// This is the **preferred method** to create a Trainer for a Pipeline.
    pub fn from_config(pipeline: Pipeline, config: &TrainerConfig) -> Trainer {
        let worker = config.optimizer.with_config(config);
        Self::with_optimizer(pipeline, worker, config)
    }

    /// Create a Trainer with any [Optimizer][1] implementation.
    /// [1]: ./trait.Optimizer.html
    pub fn with_optimizer(pipeline: Pipeline, mut worker: Box<dyn Optimizer>, config: &TrainerConfig) -> Trainer {
        info!("Initializing trainer from configuration");
        worker.init(&pipeline.learnable_weights());
        Trainer {
            pipeline: pipeline,
            worker: worker,
            config: config.clone(),
            iter: 0,
        }
    }

    /// Train the Pipeline with one minibatch.
    ///
    /// Returns the loss of the batch and the output of the Pipeline, computed
    /// before the weights were updated.
    ///
    /// Features and labels are checked against the Pipeline before anything
    /// runs; a failed call leaves the Pipeline untouched.
    pub fn train_minibatch(&mut self, features: &Tensor, labels: &Tensor) -> Result<(f32, Tensor)> {
        check_batch_shape(features, self.pipeline.input_shape())?;
        let mut label_shape = vec![features.batch_size()];
        label_shape.extend_from_slice(self.pipeline.output_shape());
        if labels.shape() != &label_shape[..] {
            shape_err!("labels of shape {:?} don't match the output {:?} of pipeline '{}'",
                       labels.shape(), label_shape, self.pipeline.name());
        }
        self.pipeline.clear_weights_gradients();

        // forward through pipeline and objective
        let trace = self.pipeline.forward_trace(features, Phase::Train)?;
        let output = match trace.last() {
            Some(output) => output.clone(),
            None => shape_err!("forward pass produced no output"),
        };
        let loss = self.config.objective.loss(&output, labels)?;

        // backward through objective and pipeline
        let objective_gradient = self.config.objective.gradient(&output, labels)?;
        self.pipeline.backward(&trace, &objective_gradient)?;

        self.worker.apply_update(&self.config, &mut self.pipeline.learnable_weights_mut(), self.iter);
        self.iter += 1;

        Ok((loss, output))
    }

    /// Train the Pipeline for `epochs` passes over `dataset`.
    ///
    /// Every epoch the dataset is split into consecutive batches of `batch_size`
    /// samples; the last batch holds the remainder. With
    /// [TrainerConfig.shuffle][1] the samples are permuted with the random
    /// generator of `ctx` first.
    /// [1]: ./struct.TrainerConfig.html#structfield.shuffle
    ///
    /// The returned history holds the sample-weighted mean loss and accuracy of
    /// every epoch, as observed while training.
    pub fn fit(&mut self, dataset: &Dataset, epochs: usize, batch_size: usize, ctx: &mut Context) -> Result<TrainingState> {
        if dataset.is_empty() {
            data_err!("cannot train on an empty dataset");
        }
        if batch_size == 0 {
            data_err!("batch size must be positive");
        }
        if batch_size > dataset.len() {
            data_err!("batch size {} exceeds the {} samples of the dataset", batch_size, dataset.len());
        }
        if self.pipeline.output_shape() != [1] {
            shape_err!("pipeline '{}' outputs {:?} per sample, binary labels need [1]",
                       self.pipeline.name(), self.pipeline.output_shape());
        }
        if dataset.sample_shape() != self.pipeline.input_shape() {
            shape_err!("samples of shape {:?} don't fit the input {:?} of pipeline '{}'",
                       dataset.sample_shape(), self.pipeline.input_shape(), self.pipeline.name());
        }

        let mut state = TrainingState::default();
        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        for epoch in 0..epochs {
            if self.config.shuffle {
                indices.shuffle(ctx.rng());
            }
            let mut matrix = ConfusionMatrix::binary(self.config.threshold);
            let mut loss_sum = 0f32;
            for batch_indices in indices.chunks(batch_size) {
                let (features, labels) = if self.config.shuffle {
                    dataset.select(batch_indices)?
                } else {
                    dataset.batch(batch_indices[0], batch_indices[0] + batch_indices.len())?
                };
                let (loss, output) = self.train_minibatch(&features, &labels)?;
                loss_sum += loss * batch_indices.len() as f32;
                let predictions = matrix.get_predictions(&output);
                let targets = matrix.get_targets(&labels);
                matrix.add_samples(&predictions, &targets);
                debug!("Iteration {}: loss {}", self.iter, loss);
            }

            let record = EpochRecord {
                epoch: epoch + 1,
                loss: loss_sum / dataset.len() as f32,
                accuracy: matrix.accuracy().ratio(),
            };
            info!("Epoch {}/{} - loss: {:.4} - accuracy: {}", record.epoch, epochs, record.loss, matrix.accuracy());
            state.epoch = record.epoch;
            state.history.push(record);
        }
        Ok(state)
    }

    /// Evaluate the Pipeline on `dataset` in a single inference pass.
    ///
    /// Returns `(loss, accuracy)`. Nothing about the Pipeline changes, so
    /// repeated calls return the same result.
    pub fn evaluate(&self, dataset: &Dataset) -> Result<(f32, f32)> {
        if dataset.is_empty() {
            data_err!("cannot evaluate on an empty dataset");
        }
        let output = self.pipeline.forward(dataset.features())?;
        let loss = self.config.objective.loss(&output, dataset.labels())?;

        let mut matrix = ConfusionMatrix::binary(self.config.threshold);
        let predictions = matrix.get_predictions(&output);
        let targets = matrix.get_targets(dataset.labels());
        matrix.add_samples(&predictions, &targets);
        info!("Evaluation - loss: {:.4} - accuracy: {}", loss, matrix.accuracy());

        Ok((loss, matrix.accuracy().ratio()))
    }

    /// Returns the Pipeline trained by the Trainer.
    ///
    /// This is the recommended method to get a usable trained Pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the Pipeline trained by the Trainer.
    ///
    /// Keep in mind that altering the Pipeline might render the Trainer unusable
    /// and continuing training the Pipeline with it will yield unexpected results.
    pub fn mut_pipeline(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    /// Give up the Trainer and keep the trained Pipeline.
    pub fn into_pipeline(self) -> Pipeline {
        self.pipeline
    }

    /// Number of weight updates so far.
    pub fn iter(&self) -> usize {
        self.iter
    }
}

/// Implementation of a specific Optimizer.
///
/// See [Optimizers][1]
/// [1]: ../optimizers/index.html
pub trait Optimizer {
    /// Initialize the optimizer, setting up state for every trainable weight.
    fn init(&mut self, weights: &[&Weight]);

    /// Compute the update of every weight from its gradient.
    ///
    /// The [second phase of backpropagation learning][1].
    /// Replaces the accumulated gradient of every weight with the value that
    /// should be subtracted from it.
    ///
    /// [1]: https://en.wikipedia.org/wiki/Backpropagation#Phase_2:_Weight_update
    fn compute_update(&mut self, config: &TrainerConfig, weights: &mut [&mut Weight], iter: usize);

    /// Compute the update and apply it to the weights.
    fn apply_update(&mut self, config: &TrainerConfig, weights: &mut [&mut Weight], iter: usize) {
        self.compute_update(config, weights, iter);
        for weight in weights.iter_mut() {
            weight.apply_update();
        }
    }
}

impl fmt::Debug for dyn Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({})", "Optimizer")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Configuration for a Trainer
pub struct TrainerConfig {
    /// Name of the trainer.
    pub name: String,
    /// The [Optimizer implementation][1] to be used.
    /// [1]: ../optimizers/index.html
    pub optimizer: OptimizerKind,
    /// The objective that is minimized.
    ///
    /// Default: BinaryCrossEntropy
    pub objective: Objective,
    /// The learning rate policy to be used.
    ///
    /// Default: Fixed
    pub lr_policy: LRPolicy,
    /// The base learning rate.
    ///
    /// Default: 0.001
    pub base_lr: f32,
    /// gamma as used in the calculation of most learning rate policies.
    ///
    /// Default: 0.1
    pub gamma: f32,
    /// The stepsize used in Step learning policies.
    ///
    /// Default: 10
    pub stepsize: usize,
    /// The threshold for clipping gradients.
    ///
    /// Gradient values will be scaled to their [L2 norm][1] of length `clip_gradients`
    /// if their L2 norm is larger than `clip_gradients`.
    /// If set to `None` gradients will not be clipped.
    ///
    /// [1]: https://en.wikipedia.org/wiki/Norm_(mathematics)#Euclidean_norm
    ///
    /// Default: None
    pub clip_gradients: Option<f32>,
    /// The global [weight decay][1] multiplier for [regularization][1].
    /// [1]: https://cs231n.github.io/neural-networks-2/#reg
    ///
    /// If set to `None` no regularization will be performed.
    ///
    /// Default: None
    pub weight_decay: Option<f32>,
    /// The method of [regularization][1] to use.
    /// [1]: https://cs231n.github.io/neural-networks-2/#reg
    ///
    /// Only applied together with a `weight_decay`.
    ///
    /// Default: L2
    pub regularization_method: Option<RegularizationMethod>,
    /// The [momentum][1] multiplier for [SGD with momentum][2].
    /// [1]: https://en.wikipedia.org/wiki/Stochastic_gradient_descent#Momentum
    /// [2]: ../optimizers/sgd/momentum/index.html
    ///
    /// The value should always be between 0 and 1 and dictates how much of the previous
    /// update will be added to the current one.
    ///
    /// Default: 0.9
    pub momentum: f32,
    /// Decay rate of the first moment estimate used by Adam.
    ///
    /// Default: 0.9
    pub beta1: f32,
    /// Decay rate of the second moment estimate used by Adam.
    ///
    /// Default: 0.999
    pub beta2: f32,
    /// Added to the denominator of the Adam update.
    ///
    /// Default: 1e-7
    pub epsilon: f32,
    /// Permute the training samples before every epoch.
    ///
    /// Default: false
    pub shuffle: bool,
    /// Outputs above the threshold are predicted as the positive class.
    ///
    /// Default: 0.5
    pub threshold: f32,
}

impl Default for TrainerConfig {
    fn default() -> TrainerConfig {
        TrainerConfig {
            name: "".to_owned(),
            optimizer: OptimizerKind::Adam,
            objective: Objective::BinaryCrossEntropy,

            lr_policy: LRPolicy::Fixed,
            base_lr: 0.001f32,
            gamma: 0.1f32,
            stepsize: 10,

            clip_gradients: None,

            weight_decay: None,
            regularization_method: Some(RegularizationMethod::L2),

            momentum: 0.9f32,
            beta1: 0.9f32,
            beta2: 0.999f32,
            epsilon: 1e-7f32,

            shuffle: false,
            threshold: 0.5f32,
        }
    }
}

impl TrainerConfig {
    /// Return the learning rate for a supplied iteration.
    ///
    /// The way the learning rate is calculated depends on the configured [LRPolicy][1].
    ///
    /// [1]: ./enum.LRPolicy.html
    ///
    /// Used by the [Optimizers][2] to calculate the learning rate for the current iteration.
    ///
    /// [2]: ../optimizers/index.html
    pub fn get_learning_rate(&self, iter: usize) -> f32 {
        match self.lr_policy {
            LRPolicy::Fixed => {
                self.base_lr
            }
            LRPolicy::Step => {
                let current_step = self.step(iter);
                self.base_lr * self.gamma.powf(current_step as f32)
            }
            LRPolicy::Exp => {
                self.base_lr * self.gamma.powf(iter as f32)
            }
        }
    }

    /// Return current step at iteration `iter`.
    ///
    /// Small helper for learning rate calculation.
    fn step(&self, iter: usize) -> usize {
        iter / self.stepsize.max(1)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a configuration from JSON.
    pub fn from_json(json: &str) -> Result<TrainerConfig> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// All available types of optimizers.
pub enum OptimizerKind {
    /// Stochastic Gradient Descent with Momentum. See [implementation][1]
    /// [1]: ../optimizers/sgd/momentum/index.html
    Momentum,
    /// Adaptive moment estimation. See [implementation][1]
    /// [1]: ../optimizers/sgd/adam/index.html
    Adam,
}

impl OptimizerKind {
    /// Create an Optimizer of the specified kind with the supplied TrainerConfig.
    pub fn with_config(&self, _config: &TrainerConfig) -> Box<dyn Optimizer> {
        match *self {
            OptimizerKind::Momentum => Box::new(Momentum::new()),
            OptimizerKind::Adam => Box::new(Adam::new()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Learning Rate Policy for a [Trainer][1]
/// [1]: ./struct.Trainer.html
///
/// The variables mentioned below are defined in the [TrainerConfig][2] apart from
/// iter, which is the current iteration of the trainer, that is supplied as a parameter
/// for the learning rate calculation.
///
/// [2]: ./struct.TrainerConfig.html
pub enum LRPolicy {
    /// always return base_lr
    Fixed,
    /// learning rate decays every `step` iterations.
    /// return base_lr * gamma ^ (floor(iter / step))
    Step,
    /// return base_lr * gamma ^ iter
    Exp,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// [Regularization][1] method
/// [1]: https://cs231n.github.io/neural-networks-2/#reg
pub enum RegularizationMethod {
    /// L2 regularization
    L2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Loss and accuracy of one epoch.
pub struct EpochRecord {
    /// The epoch, counted from 1.
    pub epoch: usize,
    /// Sample-weighted mean loss over the epoch.
    pub loss: f32,
    /// Fraction of correctly classified samples in `[0, 1]`.
    pub accuracy: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// The progress of [fit][1].
/// [1]: ./struct.Trainer.html#method.fit
pub struct TrainingState {
    /// Number of completed epochs.
    pub epoch: usize,
    /// One record per completed epoch, in order.
    pub history: Vec<EpochRecord>,
}

impl TrainingState {
    /// Serialize the history to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
