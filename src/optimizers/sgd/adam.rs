//! [Adam][1]: adaptive moment estimation.
//! [1]: https://arxiv.org/abs/1412.6980
//!
//! Keeps exponentially decaying averages of the gradient (first moment) and of
//! the squared gradient (second moment) per parameter. The step of every
//! parameter is its first moment divided by the square root of its second
//! moment, so parameters with consistently small gradients still move.
//!
//! Both averages start at zero; the learning rate is corrected for that bias:
//!
//! `lr_t = lr * sqrt(1 - beta2^t) / (1 - beta1^t)`
use crate::optimizers::SGDOptimizer;
use crate::trainer::TrainerConfig;
use crate::weight::Weight;

#[derive(Debug, Clone, Default)]
/// Adam optimizer.
///
/// See [module description][1] for more information.
/// [1]: ./index.html
pub struct Adam {
    /// First moment estimate for each weight.
    m: Vec<Vec<f32>>,
    /// Second moment estimate for each weight.
    v: Vec<Vec<f32>>,
}

impl Adam {
    /// Create a new Adam optimizer.
    pub fn new() -> Adam {
        Adam {
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Allocate zeroed moments per weight.
    fn init_history(&mut self, weights: &[&Weight]) {
        self.m = weights.iter().map(|weight| vec![0f32; weight.len()]).collect();
        self.v = self.m.clone();
    }
}

impl SGDOptimizer for Adam {
    fn compute_update_value(&mut self,
                            config: &TrainerConfig,
                            weight: &mut Weight,
                            history_id: usize,
                            global_lr: f32,
                            iter: usize) {
        if history_id >= self.m.len() {
            self.m.resize(history_id + 1, Vec::new());
            self.v.resize(history_id + 1, Vec::new());
        }
        if self.m[history_id].len() != weight.len() {
            self.m[history_id] = vec![0f32; weight.len()];
            self.v[history_id] = vec![0f32; weight.len()];
        }
        let (beta1, beta2) = (config.beta1, config.beta2);
        let t = (iter + 1) as i32;
        let local_lr = global_lr * weight.lr_mult()
            * (1f32 - beta2.powi(t)).sqrt() / (1f32 - beta1.powi(t));

        let m = &mut self.m[history_id];
        let v = &mut self.v[history_id];
        for ((g, m), v) in weight.gradient_mut().iter_mut().zip(m.iter_mut()).zip(v.iter_mut()) {
            *m = beta1 * *m + (1f32 - beta1) * *g;
            *v = beta2 * *v + (1f32 - beta2) * *g * *g;
            *g = local_lr * *m / (v.sqrt() + config.epsilon);
        }
    }
}

impl_optimizer_sgd!(Adam);
