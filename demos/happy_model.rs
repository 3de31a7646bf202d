//! Trains the HappyModel to tell happy from unhappy faces.
//!
//! Run with the path of a dataset document to train on real images:
//!
//! `cargo run --release --example happy_model -- happy_house.json`
//!
//! Without an argument a synthetic dataset is generated, where the "happy"
//! images are brighter than the "unhappy" ones.
extern crate env_logger;
extern crate sapling;

use std::env;

use sapling::context::Context;
use sapling::dataset::{DatasetBundle, DatasetLoader, InMemoryLoader, JsonFileLoader};
use sapling::pipeline::{Pipeline, PipelineConfig};
use sapling::stage::{StageConfig, StageType};
use sapling::stages::*;
use sapling::tensor::Tensor;
use sapling::trainer::{Trainer, TrainerConfig};

const IMAGE_SIZE: usize = 64;

fn main() {
    env_logger::init();

    let bundle = match load(env::args().nth(1)) {
        Ok(bundle) => bundle,
        Err(err) => {
            println!("Could not load the dataset: {}", err);
            return;
        }
    };
    println!("number of training examples = {}", bundle.train.len());
    println!("number of test examples = {}", bundle.test.len());
    println!("classes = {:?}", bundle.classes);

    if let Err(err) = run(&bundle) {
        println!("Training failed: {}", err);
    }
}

fn load(path: Option<String>) -> sapling::Result<DatasetBundle> {
    match path {
        Some(path) => JsonFileLoader::new(path).load_dataset(),
        None => synthetic_loader(600, 150).load_dataset(),
    }
}

fn run(bundle: &DatasetBundle) -> sapling::Result<()> {
    let mut ctx = Context::seeded(1);
    let pipeline = Pipeline::build(&happy_model(), &mut ctx)?;
    println!("{}", pipeline.summary());

    let config = TrainerConfig { name: "happy_trainer".to_owned(), ..TrainerConfig::default() };
    let mut trainer = Trainer::from_config(pipeline, &config);
    let state = trainer.fit(&bundle.train, 10, 16, &mut ctx)?;
    println!("{}", state.to_json()?);

    let (loss, accuracy) = trainer.evaluate(&bundle.test)?;
    println!("Test loss = {:.4}", loss);
    println!("Test accuracy = {:.4}", accuracy);
    Ok(())
}

fn happy_model() -> PipelineConfig {
    let mut cfg = PipelineConfig::new("HappyModel", &[IMAGE_SIZE, IMAGE_SIZE, 3]);
    cfg.add_stage(StageConfig::new("zero_padding", PaddingConfig { padding: vec![3, 3] }));
    cfg.add_stage(StageConfig::new("conv0", ConvolutionConfig {
        num_output: 32,
        filter_shape: vec![7, 7],
        stride: vec![1, 1],
        padding: vec![],
    }));
    cfg.add_stage(StageConfig::new("bn0", NormalizationConfig::with_axis(2)));
    cfg.add_stage(StageConfig::new("relu0", StageType::ReLU));
    cfg.add_stage(StageConfig::new("max_pool", PoolingConfig::max(2)));
    cfg.add_stage(StageConfig::new("flatten", StageType::Flatten));
    cfg.add_stage(StageConfig::new("fc", DenseConfig { output_size: 1, activation: Some(ActivationKind::Sigmoid) }));
    cfg
}

fn synthetic_loader(train: usize, test: usize) -> InMemoryLoader {
    let (train_x, train_y) = synthetic_images(train, 0);
    let (test_x, test_y) = synthetic_images(test, train);
    InMemoryLoader::new(train_x, train_y, test_x, test_y,
                        vec!["unhappy".to_owned(), "happy".to_owned()])
}

fn synthetic_images(count: usize, offset: usize) -> (Tensor, Tensor) {
    let sample_size = IMAGE_SIZE * IMAGE_SIZE * 3;
    let label = |sample: usize| ((sample * 7 + 3) % 5 < 2) as usize as f32;
    let features = Tensor::from_fn(&[count, IMAGE_SIZE, IMAGE_SIZE, 3], |i| {
        let sample = offset + i / sample_size;
        let pixel = (i.wrapping_mul(40_503) % 1000) as f32 / 4000.0;
        0.3 + 0.4 * label(sample) + pixel
    });
    let labels = Tensor::from_fn(&[count, 1], |i| label(offset + i));
    (features, labels)
}
