#[macro_use]
extern crate timeit;
extern crate env_logger;
extern crate sapling;

use std::env;

use sapling::context::{Context, Phase};
use sapling::pipeline::{Pipeline, PipelineConfig};
use sapling::stage::{StageConfig, StageType};
use sapling::stages::*;
use sapling::tensor::Tensor;

fn main() {
    env_logger::init();

    let nets: Vec<String> = vec!("happy".to_string(), "deep_happy".to_string());
    if let Some(net) = env::args().nth(1) {
        if nets.contains(&net) {
            println!("Executing Model: {:?}", net);
            if net == "happy" {
                bench_pipeline(happy_model(), 16);
            } else if net == "deep_happy" {
                bench_pipeline(deep_happy_model(), 16);
            }
        } else {
            println!("Sorry, no model found with name '{:?}'. Valid options: {:?}", net, nets);
        }
    } else {
        println!("No `net` argument specified. Default: `happy`. Valid options: {:?}", nets);
        bench_pipeline(happy_model(), 16);
    }
}

#[inline(never)]
fn bench_profile<F: FnMut() -> ()>(
    name: &str,
    mut bench_func: F,
    times: usize)
{
    println!("Running benchmark {}", name);
    println!("----------");
    for _ in 0..2 {
        bench_func();
    }
    let average_time = timeit_loops!(times, {
        bench_func();
    });
    println!("----------");
    println!("Average time {}", autoscale_time(average_time));
    println!("");
}

fn autoscale_time(sec: f64) -> String {
    let (div, unit_str) = get_time_scale(sec);
    format!("{:.5} {}", sec / div, unit_str)
}

// get fitting order of magnitude for a time measurement
fn get_time_scale<'a>(sec: f64) -> (f64, &'a str) {
    if sec > 1.0 {
        (1.0, "s")
    } else if sec > 0.001 {
        (0.001, "ms")
    } else if sec > 0.000_001 {
        (0.000_001, "µs")
    } else {
        (0.000_000_001, "ns")
    }
}

fn bench_pipeline(cfg: PipelineConfig, batch_size: usize) {
    let mut pipeline = match Pipeline::build(&cfg, &mut Context::seeded(0)) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            println!("Could not build {}: {}", cfg.name, err);
            return;
        }
    };
    println!("{}", pipeline.summary());

    let mut shape = vec![batch_size];
    shape.extend_from_slice(pipeline.input_shape());
    let input = Tensor::from_fn(&shape, |i| ((i * 131) % 256) as f32 / 255.0);
    let mut output_shape = vec![batch_size];
    output_shape.extend_from_slice(pipeline.output_shape());
    let output_gradient = Tensor::from_fn(&output_shape, |_| 1.0);

    {
        let pipeline = &pipeline;
        let func = || {
            let forward_time = timeit_loops!(1, {
                if let Err(err) = pipeline.forward(&input) {
                    println!("Forward failed: {}", err);
                }
            });
            println!("Forward step: {}", autoscale_time(forward_time));
        };
        bench_profile(&format!("{}_forward", cfg.name), func, 10);
    }
    {
        let func = || {
            let train_time = timeit_loops!(1, {
                let result = pipeline.forward_trace(&input, Phase::Train)
                    .and_then(|trace| pipeline.backward(&trace, &output_gradient));
                if let Err(err) = result {
                    println!("Training step failed: {}", err);
                }
                pipeline.clear_weights_gradients();
            });
            println!("Forward and backward step: {}", autoscale_time(train_time));
        };
        bench_profile(&format!("{}_forward_backward", cfg.name), func, 10);
    }
}

fn happy_model() -> PipelineConfig {
    let mut cfg = PipelineConfig::new("happy", &[64, 64, 3]);
    cfg.add_stage(StageConfig::new("zero_padding", PaddingConfig { padding: vec![3] }));
    cfg.add_stage(StageConfig::new("conv0", ConvolutionConfig { num_output: 32, filter_shape: vec![7], stride: vec![1], padding: vec![] }));
    cfg.add_stage(StageConfig::new("bn0", NormalizationConfig::default()));
    cfg.add_stage(StageConfig::new("relu0", StageType::ReLU));
    cfg.add_stage(StageConfig::new("max_pool", PoolingConfig::max(2)));
    cfg.add_stage(StageConfig::new("flatten", StageType::Flatten));
    cfg.add_stage(StageConfig::new("fc", DenseConfig { output_size: 1, activation: Some(ActivationKind::Sigmoid) }));
    cfg
}

fn deep_happy_model() -> PipelineConfig {
    let mut cfg = PipelineConfig::new("deep_happy", &[64, 64, 3]);
    cfg.add_stage(StageConfig::new("conv1", ConvolutionConfig { num_output: 16, filter_shape: vec![3], stride: vec![1], padding: vec![1] }));
    cfg.add_stage(StageConfig::new("bn1", NormalizationConfig::default()));
    cfg.add_stage(StageConfig::new("conv1/relu", StageType::ReLU));
    cfg.add_stage(StageConfig::new("pool1", PoolingConfig::max(2)));

    cfg.add_stage(StageConfig::new("conv2", ConvolutionConfig { num_output: 32, filter_shape: vec![3], stride: vec![1], padding: vec![1] }));
    cfg.add_stage(StageConfig::new("bn2", NormalizationConfig::default()));
    cfg.add_stage(StageConfig::new("conv2/relu", StageType::ReLU));
    let pool2_stage_cfg = PoolingConfig { mode: PoolingMode::Average, filter_shape: vec![3], stride: vec![2], padding: vec![1] };
    cfg.add_stage(StageConfig::new("pool2", pool2_stage_cfg));

    cfg.add_stage(StageConfig::new("flatten", StageType::Flatten));
    cfg.add_stage(StageConfig::new("fc1", DenseConfig { output_size: 64, activation: Some(ActivationKind::ReLU) }));
    cfg.add_stage(StageConfig::new("fc2", DenseConfig { output_size: 1, activation: Some(ActivationKind::Sigmoid) }));
    cfg
}
