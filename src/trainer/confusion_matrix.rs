//! Collects predictions and targets to report how well a Pipeline classifies.
use std::fmt;

use crate::tensor::Tensor;

/// A binary [ConfusionMatrix][wiki].
///
/// [wiki]: https://en.wikipedia.org/wiki/Confusion_matrix
///
/// The Pipeline outputs one probability per sample, which is compared against
/// `threshold` to predict the positive class.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    threshold: f32,
    /// counts indexed by `[target][prediction]`
    counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    /// Create an empty ConfusionMatrix predicting the positive class above `threshold`.
    pub fn binary(threshold: f32) -> ConfusionMatrix {
        ConfusionMatrix {
            threshold: threshold,
            counts: [[0; 2]; 2],
        }
    }

    /// Add a batch of samples by providing the `predictions` and the expected `targets`.
    pub fn add_samples(&mut self, predictions: &[bool], targets: &[bool]) {
        for (&prediction, &target) in predictions.iter().zip(targets) {
            self.counts[target as usize][prediction as usize] += 1;
        }
    }

    /// Get the predicted classes from an output of shape `(batch, 1)`.
    pub fn get_predictions(&self, output: &Tensor) -> Vec<bool> {
        output.data().iter().map(|&p| p > self.threshold).collect()
    }

    /// Get the target classes from binary labels of shape `(batch, 1)`.
    pub fn get_targets(&self, labels: &Tensor) -> Vec<bool> {
        labels.data().iter().map(|&y| y >= 0.5).collect()
    }

    /// Number of samples with the given target that were predicted as `prediction`.
    pub fn count(&self, target: bool, prediction: bool) -> usize {
        self.counts[target as usize][prediction as usize]
    }

    /// Return the accuracy of the collected predictions.
    pub fn accuracy(&self) -> Accuracy {
        let num_correct = self.counts[0][0] + self.counts[1][1];
        let num_samples = num_correct + self.counts[0][1] + self.counts[1][0];
        Accuracy { num_samples: num_samples, num_correct: num_correct }
    }
}

#[derive(Debug, Clone, Copy)]
/// The accuracy of the predictions in a ConfusionMatrix.
///
/// Used to print the accuracy.
pub struct Accuracy {
    num_samples: usize,
    num_correct: usize,
}

impl Accuracy {
    /// Fraction of correct predictions in `[0, 1]`; zero without samples.
    pub fn ratio(&self) -> f32 {
        if self.num_samples == 0 {
            return 0f32;
        }
        (self.num_correct as f32) / (self.num_samples as f32)
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{} = {:.2}%", self.num_correct, self.num_samples, self.ratio() * 100f32)
    }
}
