extern crate env_logger;
extern crate sapling;

#[cfg(test)]
mod optimizer_spec {
    use sapling::optimizers::*;
    use sapling::trainer::{Optimizer, OptimizerKind, TrainerConfig};
    use sapling::weight::{Weight, WeightConfig};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Coefficients of the cost `x0 * w^2 + x1 * w + x2`, minimal at `w = 5`.
    const COEFFICIENTS: [f32; 3] = [1.0, -10.0, 25.0];

    fn cost(w: f32) -> f32 {
        COEFFICIENTS[0] * w * w + COEFFICIENTS[1] * w + COEFFICIENTS[2]
    }

    /// Minimize the quadratic cost starting from `w = 0` and return the final `w`.
    fn minimize(optimizer: &mut dyn Optimizer, config: &TrainerConfig, iterations: usize) -> f32 {
        let mut w = Weight::from_values("w", &[1], vec![0f32], true);
        optimizer.init(&[&w]);
        for iter in 0..iterations {
            let value = w.values()[0];
            w.clear_gradient();
            w.accumulate_gradient(&[2.0 * COEFFICIENTS[0] * value + COEFFICIENTS[1]]);
            optimizer.apply_update(config, &mut [&mut w], iter);
        }
        w.values()[0]
    }

    #[test]
    fn gradient_descent_minimizes_quadratic_cost() {
        init_logger();
        let config = TrainerConfig { base_lr: 0.01, momentum: 0.0, ..TrainerConfig::default() };
        let w = minimize(&mut Momentum::new(), &config, 1000);
        assert!((w - 5.0).abs() < 1e-3, "w = {}", w);
        assert!(cost(w) < 1e-5);
    }

    #[test]
    fn momentum_minimizes_quadratic_cost() {
        init_logger();
        let config = TrainerConfig { base_lr: 0.01, momentum: 0.9, ..TrainerConfig::default() };
        let w = minimize(&mut Momentum::new(), &config, 1000);
        assert!((w - 5.0).abs() < 1e-2, "w = {}", w);
    }

    #[test]
    fn adam_minimizes_quadratic_cost() {
        init_logger();
        let config = TrainerConfig { base_lr: 0.05, ..TrainerConfig::default() };
        let w = minimize(&mut Adam::new(), &config, 1000);
        assert!((w - 5.0).abs() < 5e-2, "w = {}", w);
    }

    #[test]
    fn optimizer_from_kind() {
        init_logger();
        let config = TrainerConfig { optimizer: OptimizerKind::Momentum, base_lr: 0.01, momentum: 0.0, ..TrainerConfig::default() };
        let mut optimizer = config.optimizer.with_config(&config);
        let w = minimize(&mut *optimizer, &config, 1000);
        assert!((w - 5.0).abs() < 1e-3);
    }

    #[test]
    fn clip_gradients_rescales_global_norm() {
        init_logger();
        let config = TrainerConfig { clip_gradients: Some(1.0), ..TrainerConfig::default() };
        let mut a = Weight::from_values("a", &[1], vec![0f32], true);
        let mut b = Weight::from_values("b", &[1], vec![0f32], true);
        a.accumulate_gradient(&[3.0]);
        b.accumulate_gradient(&[4.0]);
        let optimizer = Momentum::new();
        optimizer.clip_gradients(&config, &mut [&mut a, &mut b]);
        assert!((a.gradient()[0] - 0.6).abs() < 1e-6);
        assert!((b.gradient()[0] - 0.8).abs() < 1e-6);

        // gradients below the threshold are kept
        optimizer.clip_gradients(&config, &mut [&mut a, &mut b]);
        assert!((a.gradient()[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn l2_regularization_uses_decay_mult() {
        init_logger();
        let config = TrainerConfig { weight_decay: Some(0.1), ..TrainerConfig::default() };
        let mut rng = rand::thread_rng();
        let mut w = Weight::from_values("w", &[2], vec![2f32, -4.], true);
        w.configure(&WeightConfig { decay_mult: Some(0.5), ..WeightConfig::default() }, &mut rng);
        Momentum::new().regularize(&config, &mut w);
        assert_eq!(&[0.1f32, -0.2], w.gradient());

        let mut unregularized = Weight::from_values("w", &[1], vec![2f32], true);
        Momentum::new().regularize(&TrainerConfig::default(), &mut unregularized);
        assert_eq!(&[0f32], unregularized.gradient());
    }

    #[test]
    fn lr_mult_scales_the_step() {
        init_logger();
        let config = TrainerConfig { base_lr: 0.1, momentum: 0.0, ..TrainerConfig::default() };
        let mut rng = rand::thread_rng();
        let mut w = Weight::from_values("w", &[1], vec![1f32], true);
        w.configure(&WeightConfig { lr_mult: Some(0.5), ..WeightConfig::default() }, &mut rng);
        let mut optimizer = Momentum::new();
        optimizer.init(&[&w]);
        w.accumulate_gradient(&[1.0]);
        optimizer.apply_update(&config, &mut [&mut w], 0);
        assert!((w.values()[0] - 0.95).abs() < 1e-6);
    }
}
