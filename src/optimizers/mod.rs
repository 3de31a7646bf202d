//! Provides the optimizers for the Pipelines.
//!
//! The optimal state of a Pipeline would be the one where
//! for any given input, it would produce an output perfectly
//! matching the target function. In that state the loss function would have its
//! [global minimum][minimum].
//! This statement can also be reversed to *if we manage to minimize
//! the loss function of the Pipeline, we map the target function*.
//!
//! We can change the way a Pipeline works by adjusting its individual
//! [weights][weight]. So to optimize the Pipeline we want to adjust
//! the weights in a way that the loss function will be minimized.
//! If we want to know how to correctly adjust a single weight,
//! we have to get to know the effect of that weight
//! on the loss function (= the *gradient*).
//! This is done via [*backpropagation*][backprop], where every Stage computes
//! the gradients of its own weights.
//!
//! The optimizers mostly differ in how they compute the weight update from
//! the gradient.
//!
//! [weight]: ../weight/struct.Weight.html
//! [minimum]: http://mathworld.wolfram.com/GlobalMinimum.html
//! [backprop]: https://en.wikipedia.org/wiki/Backpropagation

#[allow(unused_import_braces)]
pub use self::sgd::{Adam, Momentum};
pub mod sgd;

use crate::trainer::{Optimizer, RegularizationMethod, TrainerConfig};
use crate::weight::Weight;

/// The steps shared by all gradient descent optimizers.
pub trait SGDOptimizer : Optimizer {
    /// Turn the gradient of a weight into the value that is subtracted from it.
    fn compute_update_value(&mut self,
                            config: &TrainerConfig,
                            weight: &mut Weight,
                            history_id: usize,
                            global_lr: f32,
                            iter: usize);

    /// [Clip gradients][1] when they exceed [TrainerConfig.clip_gradients][2].
    /// [1]: http://arxiv.org/abs/1211.5063
    /// [2]: ../trainer/struct.TrainerConfig.html
    ///
    /// When the [L2 norm][3] of the gradients of all weights exceeds a threshold
    /// it is "clipped" to that threshold. The naming can be misleading since the
    /// gradients are not actually clipped (as in cut off), but rescaled to the threshold.
    ///
    /// [3]: https://en.wikipedia.org/wiki/Norm_(mathematics)#Euclidean_norm
    fn clip_gradients(&self, config: &TrainerConfig, weights: &mut [&mut Weight]) {
        // skip clipping gradients if TrainerConfig.clip_gradients is set to None
        if let Some(clip_threshold) = config.clip_gradients {
            let sumsq_diff: f32 = weights.iter()
                .flat_map(|weight| weight.gradient().iter())
                .map(|g| g * g)
                .sum();
            let l2norm_diff = sumsq_diff.sqrt();
            if l2norm_diff > clip_threshold {
                let scale_factor = clip_threshold / l2norm_diff;
                info!("Gradient clipping: scaling down gradients (L2 norm {} > {}) by scale factor {}",
                      l2norm_diff,
                      clip_threshold,
                      scale_factor);

                for weight in weights.iter_mut() {
                    for g in weight.gradient_mut() {
                        *g *= scale_factor;
                    }
                }
            }
        }
    }

    /// [Regularize][1] the gradient according to the configured [RegularizationMethod][2].
    /// [1]: https://cs231n.github.io/neural-networks-2/#reg
    /// [2]: ../trainer/enum.RegularizationMethod.html
    fn regularize(&self, config: &TrainerConfig, weight: &mut Weight) {
        if let Some(global_weight_decay) = config.weight_decay {
            if let Some(regularization_method) = config.regularization_method {
                let local_decay = global_weight_decay * weight.decay_mult();
                match regularization_method {
                    RegularizationMethod::L2 => {
                        let values = weight.values().to_vec();
                        for (g, w) in weight.gradient_mut().iter_mut().zip(values) {
                            *g += local_decay * w;
                        }
                    }
                }
            }
        }
    }
}
