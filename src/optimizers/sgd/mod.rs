//! Provides [Optimizer][1] implementations based on [Stochastic Gradient Descent][2].
//! [1]: ../../trainer/trait.Optimizer.html
//! [2]: https://en.wikipedia.org/wiki/Stochastic_gradient_descent

/// Implement [Optimizer][1] for [SGD optimizers][2].
/// [1]: ../trainer/trait.Optimizer.html
/// [2]: ./optimizers/sgd/index.html
///
/// The type needs an inherent `init_history(&mut self, &[&Weight])`.
#[macro_export]
macro_rules! impl_optimizer_sgd {
    ($t:ty) => (
        impl $crate::trainer::Optimizer for $t {
            fn init(&mut self, weights: &[&$crate::weight::Weight]) {
                self.init_history(weights);
            }

            fn compute_update(&mut self,
                              config: &$crate::trainer::TrainerConfig,
                              weights: &mut [&mut $crate::weight::Weight],
                              iter: usize) {
                let rate = config.get_learning_rate(iter);

                self.clip_gradients(config, weights);
                for (weight_id, weight) in weights.iter_mut().enumerate() {
                    self.regularize(config, weight);
                    self.compute_update_value(config, weight, weight_id, rate, iter);
                }
            }
        }
    )
}

pub use self::adam::Adam;
pub use self::momentum::Momentum;

pub mod adam;
pub mod momentum;
