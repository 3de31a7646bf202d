//! Provides methods to calculate the loss (cost) of some output.
//!
//! A loss function is also sometimes called cost function. Both objectives
//! average over every element of the output, so the loss of a batch doesn't
//! depend on its size.
use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::tensor::Tensor;

/// Outputs of a sigmoid are clipped to `[EPSILON, 1 - EPSILON]` before taking a logarithm.
pub const EPSILON: f32 = 1e-7;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The available objectives.
pub enum Objective {
    /// `-mean(y * ln(p) + (1 - y) * ln(1 - p))` for probabilities `p`.
    BinaryCrossEntropy,
    /// `mean((p - y)^2)`
    MeanSquaredError,
}

impl Default for Objective {
    fn default() -> Objective {
        Objective::BinaryCrossEntropy
    }
}

impl Objective {
    /// The loss of `output` against `target`.
    pub fn loss(&self, output: &Tensor, target: &Tensor) -> Result<f32> {
        Self::check(output, target)?;
        let n = output.len() as f32;
        let total: f32 = match *self {
            Objective::BinaryCrossEntropy => output.data().iter().zip(target.data())
                .map(|(&p, &y)| {
                    let p = clip(p);
                    -(y * p.ln() + (1f32 - y) * (1f32 - p).ln())
                })
                .sum(),
            Objective::MeanSquaredError => output.data().iter().zip(target.data())
                .map(|(&p, &y)| (p - y) * (p - y))
                .sum(),
        };
        Ok(total / n)
    }

    /// The gradient of the [loss](#method.loss) w.r.t. `output`.
    pub fn gradient(&self, output: &Tensor, target: &Tensor) -> Result<Tensor> {
        Self::check(output, target)?;
        let n = output.len() as f32;
        let gradient = output.data().iter().zip(target.data())
            .map(|(&p, &y)| match *self {
                Objective::BinaryCrossEntropy => {
                    let p = clip(p);
                    (p - y) / (p * (1f32 - p)) / n
                }
                Objective::MeanSquaredError => 2f32 * (p - y) / n,
            })
            .collect();
        Tensor::new(output.shape(), gradient)
    }

    fn check(output: &Tensor, target: &Tensor) -> Result<()> {
        if output.shape() != target.shape() {
            shape_err!("output {:?} and target {:?} differ in shape", output.shape(), target.shape());
        }
        if output.is_empty() {
            data_err!("cannot compute a loss over zero samples");
        }
        Ok(())
    }
}

fn clip(p: f32) -> f32 {
    p.max(EPSILON).min(1f32 - EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(values: &[f32]) -> Tensor {
        Tensor::new(&[values.len(), 1], values.to_vec()).unwrap()
    }

    #[test]
    fn cross_entropy() {
        let output = tensor(&[0.5, 0.5]);
        let loss = Objective::BinaryCrossEntropy.loss(&output, &tensor(&[0., 1.])).unwrap();
        assert!((loss - 2f32.ln()).abs() < 1e-6);

        let perfect = Objective::BinaryCrossEntropy.loss(&tensor(&[0., 1.]), &tensor(&[0., 1.])).unwrap();
        assert!(perfect >= 0.0 && perfect < 1e-5);

        let gradient = Objective::BinaryCrossEntropy.gradient(&tensor(&[0.8]), &tensor(&[1.])).unwrap();
        assert!((gradient.data()[0] + 1.25).abs() < 1e-5);
    }

    #[test]
    fn squared_error() {
        let output = tensor(&[1., 3.]);
        let target = tensor(&[0., 1.]);
        assert_eq!(2.5f32, Objective::MeanSquaredError.loss(&output, &target).unwrap());
        assert_eq!(&[1f32, 2.], Objective::MeanSquaredError.gradient(&output, &target).unwrap().data());
    }

    #[test]
    fn shapes_must_match() {
        let err = Objective::default().loss(&tensor(&[0.5]), &tensor(&[0., 1.])).unwrap_err();
        assert!(err.is_shape());
    }
}
