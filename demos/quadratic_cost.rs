//! Minimizes `w^2 - 10w + 25` with a single trainable weight.
//!
//! The coefficients are plain data, so the same setup minimizes any quadratic
//! `x0 * w^2 + x1 * w + x2`:
//!
//! `cargo run --example quadratic_cost -- 1 -20 100`
extern crate env_logger;
extern crate sapling;

use std::env;

use sapling::trainer::{Optimizer, OptimizerKind, TrainerConfig};
use sapling::weight::Weight;

fn main() {
    env_logger::init();

    let mut coefficients = [1f32, -10., 25.];
    for (i, arg) in env::args().skip(1).take(3).enumerate() {
        match arg.parse() {
            Ok(value) => coefficients[i] = value,
            Err(_) => {
                println!("Coefficient '{}' is not a number.", arg);
                return;
            }
        }
    }

    for &kind in &[OptimizerKind::Momentum, OptimizerKind::Adam] {
        let config = TrainerConfig {
            optimizer: kind,
            base_lr: match kind {
                OptimizerKind::Momentum => 0.01,
                OptimizerKind::Adam => 0.05,
            },
            momentum: 0.0,
            ..TrainerConfig::default()
        };
        let mut optimizer = config.optimizer.with_config(&config);
        let w = minimize(&mut *optimizer, &config, &coefficients, 1000);
        println!("{:?}: w = {}", kind, w);
    }
}

fn minimize(optimizer: &mut dyn Optimizer, config: &TrainerConfig, x: &[f32; 3], iterations: usize) -> f32 {
    let mut w = Weight::from_values("w", &[1], vec![0f32], true);
    optimizer.init(&[&w]);
    for iter in 0..iterations {
        let value = w.values()[0];
        if iter % 100 == 0 {
            println!("iteration {:4}: w = {:.5}, cost = {:.5}", iter, value, x[0] * value * value + x[1] * value + x[2]);
        }
        w.clear_gradient();
        w.accumulate_gradient(&[2.0 * x[0] * value + x[1]]);
        optimizer.apply_update(config, &mut [&mut w], iter);
    }
    w.values()[0]
}
