//! A [Stochastic Gradient Descent with Momentum][1]
//! [1]: https://en.wikipedia.org/wiki/Stochastic_gradient_descent#Momentum
//!
//! Momentum in optimizing a Pipeline works similar to
//! the way it does in physics.
//! If you travel into a direction with a high velocity,
//! it becomes very hard to change (or reverse)
//! the direction in which you are moving.
//!
//! Similarly when adjusting weights during training,
//! keeping a part of the previous update can make training faster,
//! since if you keep adjusting the weights
//! into the same direction you will reach the optimum faster.
//! It also makes training more stable.
use crate::optimizers::SGDOptimizer;
use crate::trainer::TrainerConfig;
use crate::weight::Weight;

#[derive(Debug, Clone, Default)]
/// Stochastic Gradient Descent with Momentum.
///
/// See [module description][1] for more information.
/// [1]: ./index.html
pub struct Momentum {
    /// The update from the previous iteration for each weight.
    history: Vec<Vec<f32>>,
}

impl Momentum {
    /// Create a new SGD Momentum optimizer.
    ///
    /// Its history is allocated by [Optimizer::init][1].
    /// [1]: ../../../trainer/trait.Optimizer.html#tymethod.init
    pub fn new() -> Momentum {
        Momentum {
            history: Vec::new(),
        }
    }

    /// Allocate one zeroed history per weight.
    fn init_history(&mut self, weights: &[&Weight]) {
        self.history = weights.iter().map(|weight| vec![0f32; weight.len()]).collect();
    }
}

impl SGDOptimizer for Momentum {
    fn compute_update_value(&mut self,
                            config: &TrainerConfig,
                            weight: &mut Weight,
                            history_id: usize,
                            global_lr: f32,
                            _iter: usize) {
        if history_id >= self.history.len() {
            self.history.resize(history_id + 1, Vec::new());
        }
        let history = &mut self.history[history_id];
        if history.len() != weight.len() {
            *history = vec![0f32; weight.len()];
        }
        let momentum = config.momentum;
        let local_lr = global_lr * weight.lr_mult();

        // Compute the update to history, then copy it to the weight's gradient.
        for (h, g) in history.iter_mut().zip(weight.gradient_mut()) {
            *h = momentum * *h + local_lr * *g;
            *g = *h;
        }
    }
}

impl_optimizer_sgd!(Momentum);
