//! Provides the parameter storage of stages and their initialization.
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::tensor::shape_size;

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Specifies training configuration for a weight.
pub struct WeightConfig {
    /// The multiplier on the global learning rate for this weight.
    ///
    /// Default: 1.0f32
    pub lr_mult: Option<f32>,

    /// The multiplier on the global weight decay for this weight.
    ///
    /// Default: 1.0f32
    pub decay_mult: Option<f32>,

    /// The filler that initializes the weight, replacing the stage's default filler.
    ///
    /// Default: None
    pub filler: Option<FillerType>,
}

impl Default for WeightConfig {
    fn default() -> WeightConfig {
        WeightConfig {
            lr_mult: None,
            decay_mult: None,
            filler: None,
        }
    }
}

impl WeightConfig {
    /// The multiplier on the global learning rate for this weight.
    pub fn lr_mult(&self) -> f32 {
        self.lr_mult.unwrap_or(1.0f32)
    }

    /// The multiplier on the global weight decay for this weight.
    pub fn decay_mult(&self) -> f32 {
        self.decay_mult.unwrap_or(1.0f32)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
/// Enum for specifing the type of Filler.
pub enum FillerType {
    /// Fills the weight with a constant `value` (all values are the same).
    Constant {
        /// The value that will be used to fill the weight.
        value: f32
    },
    /// Fills the weight based on the paper:
    ///
    /// `[Bengio and Glorot 2010]: Understanding the difficulty of training deep feedforward neural networks.`
    ///
    /// Also known as Xavier filler.
    Glorot {
        /// Number of input nodes for each output.
        input_size: usize,
        /// Number of output nodes for each input.
        output_size: usize,
    },
}

impl FillerType {
    /// Fill `values` as specified by this FillerType.
    ///
    /// This filling of weights is usually done directly after creation of the weight.
    pub fn fill<R: Rng>(&self, values: &mut [f32], rng: &mut R) {
        match *self {
            FillerType::Constant { value } => Self::fill_constant(values, value),
            FillerType::Glorot { input_size, output_size } => Self::fill_glorot(values, input_size, output_size, rng),
        }
    }

    /// Directly use the [Constant Filler](#variant.Constant).
    pub fn fill_constant(values: &mut [f32], value: f32) {
        for e in values {
            *e = value;
        }
    }

    /// Directly use the [Glorot Filler](#variant.Glorot).
    pub fn fill_glorot<R: Rng>(values: &mut [f32], num_inputs: usize, num_outputs: usize, rng: &mut R) {
        let init_range = (6.0f32 / (num_inputs as f32 + num_outputs as f32)).sqrt();

        let between = Uniform::new_inclusive(-init_range, init_range);
        for e in values {
            *e = between.sample(rng);
        }
    }
}

#[derive(Debug, Clone)]
/// A named parameter owned by a stage, together with its accumulated gradient.
///
/// Weights are the only mutable numeric state of a Pipeline. Trainable weights
/// are changed by an [Optimizer][1]; non-trainable weights (running statistics)
/// are changed by their stage during a training pass.
///
/// [1]: ../trainer/trait.Optimizer.html
pub struct Weight {
    name: String,
    shape: Vec<usize>,
    data: Vec<f32>,
    gradient: Vec<f32>,
    trainable: bool,
    lr_mult: f32,
    decay_mult: f32,
}

impl Weight {
    /// Create a weight of the given shape, filled by `filler`.
    pub fn new<R: Rng>(name: &str, shape: &[usize], filler: FillerType, trainable: bool, rng: &mut R) -> Weight {
        let size = shape_size(shape);
        let mut data = vec![0f32; size];
        filler.fill(&mut data, rng);
        Weight {
            name: name.to_owned(),
            shape: shape.to_owned(),
            data: data,
            gradient: vec![0f32; size],
            trainable: trainable,
            lr_mult: 1f32,
            decay_mult: 1f32,
        }
    }

    /// Create a weight from existing values.
    pub fn from_values(name: &str, shape: &[usize], values: Vec<f32>, trainable: bool) -> Weight {
        let size = values.len();
        Weight {
            name: name.to_owned(),
            shape: shape.to_owned(),
            data: values,
            gradient: vec![0f32; size],
            trainable: trainable,
            lr_mult: 1f32,
            decay_mult: 1f32,
        }
    }

    /// Apply the multipliers of a [WeightConfig][1].
    /// [1]: ./struct.WeightConfig.html
    pub fn configure<R: Rng>(&mut self, config: &WeightConfig, rng: &mut R) {
        self.lr_mult = config.lr_mult();
        self.decay_mult = config.decay_mult();
        if let Some(filler) = config.filler {
            filler.fill(&mut self.data, rng);
        }
    }

    /// The weight's name, unique within its stage.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shape of the weight.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of scalar parameters.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the weight holds no values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the weight is updated by optimizers.
    pub fn is_trainable(&self) -> bool {
        self.trainable
    }

    /// Learning rate multiplier of this weight.
    pub fn lr_mult(&self) -> f32 {
        self.lr_mult
    }

    /// Weight decay multiplier of this weight.
    pub fn decay_mult(&self) -> f32 {
        self.decay_mult
    }

    /// Current values.
    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access to the current values.
    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Accumulated gradient.
    pub fn gradient(&self) -> &[f32] {
        &self.gradient
    }

    /// Mutable access to the accumulated gradient.
    pub fn gradient_mut(&mut self) -> &mut [f32] {
        &mut self.gradient
    }

    /// Add `gradient` onto the accumulated gradient.
    pub fn accumulate_gradient(&mut self, gradient: &[f32]) {
        for (acc, g) in self.gradient.iter_mut().zip(gradient) {
            *acc += *g;
        }
    }

    /// Reset the accumulated gradient to zero.
    pub fn clear_gradient(&mut self) {
        for g in &mut self.gradient {
            *g = 0f32;
        }
    }

    /// Subtract the update value stored in the gradient from the values.
    pub fn apply_update(&mut self) {
        for (w, update) in self.data.iter_mut().zip(&self.gradient) {
            *w -= *update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn constant_filler() {
        let mut ctx = Context::seeded(1);
        let weight = Weight::new("w", &[2, 3], FillerType::Constant { value: 0.5 }, true, ctx.rng());
        assert_eq!(6, weight.len());
        assert!(weight.values().iter().all(|&v| v == 0.5));
        assert!(weight.gradient().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn glorot_filler_stays_in_range() {
        let mut ctx = Context::seeded(7);
        let weight = Weight::new("w", &[10, 20], FillerType::Glorot { input_size: 10, output_size: 20 }, true, ctx.rng());
        let range = (6f32 / 30f32).sqrt();
        assert!(weight.values().iter().all(|&v| v >= -range && v <= range));
        assert!(weight.values().iter().any(|&v| v != 0.0));
    }

    #[test]
    fn apply_update_subtracts_gradient() {
        let mut weight = Weight::from_values("w", &[2], vec![1.0, 2.0], true);
        weight.accumulate_gradient(&[0.5, -1.0]);
        weight.apply_update();
        assert_eq!(&[0.5f32, 3.0], weight.values());
        weight.clear_gradient();
        assert_eq!(&[0f32, 0.0], weight.gradient());
    }

    #[test]
    fn configure_applies_multipliers() {
        let mut ctx = Context::seeded(1);
        let mut weight = Weight::from_values("w", &[1], vec![0.0], true);
        let cfg = WeightConfig { lr_mult: Some(2.0), filler: Some(FillerType::Constant { value: 3.0 }), ..WeightConfig::default() };
        weight.configure(&cfg, ctx.rng());
        assert_eq!(2.0, weight.lr_mult());
        assert_eq!(1.0, weight.decay_mult());
        assert_eq!(&[3f32], weight.values());
    }
}
