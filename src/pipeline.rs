//! Provides a linear chain of [Stages][stage] and the configuration it is built from.
//!
//! A Pipeline is created once from a [PipelineConfig][1] and is then reused for
//! training and evaluation. The output of every stage is the input of the next one,
//! which is checked when the Pipeline is built: a configuration that doesn't fit the
//! preceding output shape fails with a shape error before any data is processed.
//!
//! ```
//! # use sapling::context::Context;
//! # use sapling::pipeline::{Pipeline, PipelineConfig};
//! # use sapling::stage::{StageConfig, StageType};
//! # use sapling::stages::*;
//! let mut cfg = PipelineConfig::new("tiny", &[4, 4, 1]);
//! cfg.add_stage(StageConfig::new("pool", PoolingConfig::max(2)));
//! cfg.add_stage(StageConfig::new("flatten", StageType::Flatten));
//! cfg.add_stage(StageConfig::new("dense", DenseConfig::linear(1)));
//!
//! let pipeline = Pipeline::build(&cfg, &mut Context::seeded(0)).unwrap();
//! assert_eq!(&[1], pipeline.output_shape());
//! assert_eq!(5, pipeline.param_count());
//! ```
//!
//! [stage]: ../stage/index.html
//! [1]: ./struct.PipelineConfig.html
use serde::{Deserialize, Serialize};
use crate::context::{Context, Phase};
use crate::error::Result;
use crate::stage::{check_batch_shape, Stage, StageConfig};
use crate::tensor::Tensor;
use crate::weight::Weight;

#[derive(Debug)]
/// An ordered sequence of Stages.
pub struct Pipeline {
    name: String,
    input_shape: Vec<usize>,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Build a Pipeline from a [PipelineConfig][1].
    /// [1]: ./struct.PipelineConfig.html
    ///
    /// Creates every stage for the output shape of its predecessor and fills the
    /// weights with the random generator of `ctx`.
    pub fn build(config: &PipelineConfig, ctx: &mut Context) -> Result<Pipeline> {
        if config.input_shape.is_empty() || config.input_shape.iter().any(|&d| d == 0) {
            shape_err!("input shape {:?} must be non-empty without zero dimensions", config.input_shape);
        }

        let mut stages = Vec::with_capacity(config.stages.len());
        let mut shape = config.input_shape.clone();
        for stage_config in &config.stages {
            info!("Creating Stage {}", &stage_config.name);
            let stage = Stage::from_config(stage_config, &shape, ctx)?;
            shape = stage.output_shape().to_owned();
            stages.push(stage);
        }

        let pipeline = Pipeline {
            name: config.name.clone(),
            input_shape: config.input_shape.clone(),
            stages: stages,
        };
        info!("{} -> {:?} with {} parameters", pipeline.name, pipeline.output_shape(), pipeline.param_count());
        info!("Pipeline initialization done.");
        Ok(pipeline)
    }

    /// Compute the output for a batch in the inference phase.
    ///
    /// Doesn't change any state of the Pipeline.
    pub fn forward(&self, batch: &Tensor) -> Result<Tensor> {
        check_batch_shape(batch, &self.input_shape)?;
        let mut activation = batch.clone();
        for stage in &self.stages {
            activation = stage.forward(&activation, Phase::Test)?;
        }
        Ok(activation)
    }

    /// Compute the output for a batch and keep every intermediate activation.
    ///
    /// The returned trace starts with the batch itself and ends with the output
    /// of the last stage. In the training phase stages with running statistics
    /// fold the batch into them.
    pub fn forward_trace(&mut self, batch: &Tensor, phase: Phase) -> Result<Vec<Tensor>> {
        check_batch_shape(batch, &self.input_shape)?;
        let mut trace = Vec::with_capacity(self.stages.len() + 1);
        trace.push(batch.clone());
        for stage in &mut self.stages {
            let output = {
                let input = &trace[trace.len() - 1];
                let output = stage.forward(input, phase)?;
                if phase == Phase::Train {
                    stage.update_running_statistics(input);
                }
                output
            };
            trace.push(output);
        }
        Ok(trace)
    }

    /// Backpropagate the gradient of the objective w.r.t. the output.
    ///
    /// `trace` has to come from [forward_trace][1] on the same Pipeline.
    /// The parameter gradients are accumulated into the weights; the gradient
    /// w.r.t. the batch is never computed.
    /// [1]: #method.forward_trace
    ///
    /// The whole trace is checked before any weight is touched, so a shape error
    /// leaves the accumulated gradients as they were.
    pub fn backward(&mut self, trace: &[Tensor], output_gradient: &Tensor) -> Result<()> {
        self.check_trace(trace, output_gradient)?;
        let mut gradient = output_gradient.clone();
        for (i, stage) in self.stages.iter_mut().enumerate().rev() {
            match stage.backward(&trace[i], &trace[i + 1], &gradient, i > 0)? {
                Some(input_gradient) => gradient = input_gradient,
                None => break,
            }
        }
        Ok(())
    }

    fn check_trace(&self, trace: &[Tensor], output_gradient: &Tensor) -> Result<()> {
        if trace.len() != self.stages.len() + 1 {
            shape_err!("trace holds {} tensors, expected {}", trace.len(), self.stages.len() + 1);
        }
        let batch_size = trace[0].batch_size();
        for (activation, stage) in trace.iter().zip(&self.stages) {
            check_batch_shape(activation, stage.input_shape()).map_err(|e| e.in_stage(&stage.name))?;
        }
        check_batch_shape(&trace[self.stages.len()], self.output_shape())?;
        check_batch_shape(output_gradient, self.output_shape())?;
        if trace.iter().chain(Some(output_gradient)).any(|t| t.batch_size() != batch_size) {
            shape_err!("trace and output gradient don't share a batch size of {}", batch_size);
        }
        Ok(())
    }

    /// All trainable weights, in stage order.
    pub fn learnable_weights(&self) -> Vec<&Weight> {
        self.stages.iter()
            .flat_map(|stage| stage.weights().iter())
            .filter(|weight| weight.is_trainable())
            .collect()
    }

    /// Mutable access to all trainable weights, in stage order.
    pub fn learnable_weights_mut(&mut self) -> Vec<&mut Weight> {
        self.stages.iter_mut()
            .flat_map(|stage| stage.weights_mut().iter_mut())
            .filter(|weight| weight.is_trainable())
            .collect()
    }

    /// Reset the accumulated gradients of all stages.
    pub fn clear_weights_gradients(&mut self) {
        for stage in &mut self.stages {
            stage.clear_weights_gradients();
        }
    }

    /// Number of parameters, including the running statistics of normalization stages.
    pub fn param_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.param_count()).sum()
    }

    /// Number of parameters updated by an optimizer.
    pub fn trainable_param_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.trainable_param_count()).sum()
    }

    /// The name of the Pipeline.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The per-sample input shape.
    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    /// The per-sample output shape.
    pub fn output_shape(&self) -> &[usize] {
        match self.stages.last() {
            Some(stage) => stage.output_shape(),
            None => &self.input_shape,
        }
    }

    /// The stages in execution order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// A table of stages with their output shapes and parameter counts.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(72);
        let mut lines = vec![
            format!("Pipeline: {}", self.name),
            rule.clone(),
            format!("{:<32}{:<24}{:>16}", "Stage (kind)", "Output shape", "Params"),
            rule.clone(),
            format!("{:<32}{:<24}{:>16}", "input", format!("{:?}", self.input_shape), 0),
        ];
        for stage in &self.stages {
            let label = format!("{} ({})", stage.name, stage.config.stage_type.kind());
            lines.push(format!("{:<32}{:<24}{:>16}", label, format!("{:?}", stage.output_shape()), stage.param_count()));
        }
        lines.push(rule);
        lines.push(format!("Total params: {}", self.param_count()));
        lines.push(format!("Trainable params: {}", self.trainable_param_count()));
        lines.push(format!("Non-trainable params: {}", self.param_count() - self.trainable_param_count()));
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Specifies configuration parameters for a Pipeline.
pub struct PipelineConfig {
    /// The name of the Pipeline
    pub name: String,
    /// The per-sample shape of the input, without the batch axis.
    pub input_shape: Vec<usize>,
    /// The stages, in execution order.
    pub stages: Vec<StageConfig>,
}

impl PipelineConfig {
    /// Create a PipelineConfig without stages.
    pub fn new(name: &str, input_shape: &[usize]) -> PipelineConfig {
        PipelineConfig {
            name: name.to_owned(),
            input_shape: input_shape.to_owned(),
            stages: Vec::new(),
        }
    }

    /// Append a stage to the end of the Pipeline.
    pub fn add_stage(&mut self, stage: StageConfig) {
        self.stages.push(stage);
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a configuration from JSON.
    pub fn from_json(json: &str) -> Result<PipelineConfig> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::stage::StageType;
    use crate::stages::*;
    use super::*;

    fn tiny() -> PipelineConfig {
        let mut cfg = PipelineConfig::new("tiny", &[3]);
        cfg.add_stage(StageConfig::new("hidden", DenseConfig { output_size: 2, activation: Some(ActivationKind::TanH) }));
        cfg.add_stage(StageConfig::new("out", DenseConfig::linear(1)));
        cfg
    }

    #[test]
    fn rejects_empty_input_shape() {
        let cfg = PipelineConfig::new("empty", &[4, 0, 3]);
        assert!(Pipeline::build(&cfg, &mut Context::seeded(0)).unwrap_err().is_shape());
    }

    #[test]
    fn rejects_mismatching_batch() {
        let pipeline = Pipeline::build(&tiny(), &mut Context::seeded(0)).unwrap();
        let batch = Tensor::zeros(&[2, 4]);
        assert!(pipeline.forward(&batch).unwrap_err().is_shape());
        let unbatched = Tensor::zeros(&[3]);
        assert!(pipeline.forward(&unbatched).unwrap_err().is_shape());
    }

    #[test]
    fn trace_holds_every_activation() {
        let mut pipeline = Pipeline::build(&tiny(), &mut Context::seeded(0)).unwrap();
        let batch = Tensor::from_fn(&[5, 3], |i| i as f32 / 10.0);
        let trace = pipeline.forward_trace(&batch, Phase::Train).unwrap();
        assert_eq!(3, trace.len());
        assert_eq!(&[5, 2], trace[1].shape());
        assert_eq!(pipeline.forward(&batch).unwrap(), trace[2]);
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut pipeline = Pipeline::build(&tiny(), &mut Context::seeded(4)).unwrap();
        let batch = Tensor::from_fn(&[2, 3], |i| i as f32 / 4.0 - 0.5);
        let trace = pipeline.forward_trace(&batch, Phase::Train).unwrap();
        let ones = Tensor::new(&[2, 1], vec![1f32, 1.]).unwrap();
        pipeline.backward(&trace, &ones).unwrap();
        let analytic = pipeline.learnable_weights()[0].gradient()[1];

        let h = 1e-2f32;
        let mut loss_at = |delta: f32| -> f32 {
            pipeline.learnable_weights_mut()[0].values_mut()[1] += delta;
            let loss = pipeline.forward(&batch).unwrap().data().iter().sum::<f32>();
            pipeline.learnable_weights_mut()[0].values_mut()[1] -= delta;
            loss
        };
        let numeric = (loss_at(h) - loss_at(-h)) / (2f32 * h);
        assert!((numeric - analytic).abs() < 1e-3);
    }

    #[test]
    fn config_json_roundtrip() {
        let mut cfg = tiny();
        cfg.add_stage(StageConfig::new("sigmoid", StageType::Sigmoid));
        let json = cfg.to_json().unwrap();
        let restored = PipelineConfig::from_json(&json).unwrap();
        let pipeline = Pipeline::build(&restored, &mut Context::seeded(0)).unwrap();
        assert_eq!(3, pipeline.stages().len());
        assert_eq!(11, pipeline.param_count());
        assert!(pipeline.summary().contains("sigmoid (Sigmoid)"));
    }
}
