//! Sapling is a small, modular framework for sequential pipelines of learnable
//! stages, made to describe, train and evaluate compact image classifiers.
//!
//! ## Architecture
//!
//! Sapling's [Pipeline][pipeline] is a linear chain of [stages][stages], making
//! operations over numerical data.
//!
//! The Pipeline defines the entire model, by defining the order of the stages from
//! input to output. At execution time, the Pipeline passes a batch of data from one
//! stage to the next. The output of one stage is the input for the following one. On a
//! backward pass, the Pipeline passes the derivatives inverted through the stages.
//!
//! Stages, the building block of a Pipeline, are small units, describing computation over
//! numerical input data. Every stage takes one [Tensor][tensor] and produces a new one, and
//! knows how to compute the gradients w.r.t. its input and its own [weights][weight].
//! Any Stage can be grouped in one of three Stage types which are closer defined at the
//! [Stages page][stages].
//!
//! The learning and optimization of the Pipeline happens at the [Trainer][trainer] and is
//! decoupled from the Pipeline making the setup clean and flexible. The Trainer compares the
//! output of the Pipeline with the labels of a [Dataset][dataset] through an objective, and
//! an [Optimizer][optimizers] turns the resulting gradients into parameter updates.
//!
//! There is no global session: randomness used for weight initialization and shuffling comes
//! from an explicit [Context][context] handed to [Pipeline::build][build] and
//! [Trainer::fit][fit].
//!
//! ## Examples
//!
//! ```
//! # use sapling::context::Context;
//! # use sapling::pipeline::{Pipeline, PipelineConfig};
//! # use sapling::stage::{StageConfig, StageType};
//! # use sapling::stages::*;
//! let mut cfg = PipelineConfig::new("HappyModel", &[64, 64, 3]);
//! cfg.add_stage(StageConfig::new("zero_padding", PaddingConfig { padding: vec![3, 3] }));
//! cfg.add_stage(StageConfig::new("conv0", ConvolutionConfig {
//!     num_output: 32, filter_shape: vec![7], stride: vec![1], padding: vec![] }));
//! cfg.add_stage(StageConfig::new("bn0", NormalizationConfig::default()));
//! cfg.add_stage(StageConfig::new("relu0", StageType::ReLU));
//! cfg.add_stage(StageConfig::new("max_pool", PoolingConfig::max(2)));
//! cfg.add_stage(StageConfig::new("flatten", StageType::Flatten));
//! cfg.add_stage(StageConfig::new("fc", DenseConfig { output_size: 1, activation: Some(ActivationKind::Sigmoid) }));
//!
//! let pipeline = Pipeline::build(&cfg, &mut Context::seeded(0)).unwrap();
//! assert_eq!(&[1], pipeline.output_shape());
//! assert_eq!(37_633, pipeline.param_count());
//! ```
//!
//! [pipeline]: ./pipeline/index.html
//! [stages]: ./stages/index.html
//! [tensor]: ./tensor/struct.Tensor.html
//! [weight]: ./weight/struct.Weight.html
//! [trainer]: ./trainer/index.html
//! [dataset]: ./dataset/index.html
//! [optimizers]: ./optimizers/index.html
//! [context]: ./context/struct.Context.html
//! [build]: ./pipeline/struct.Pipeline.html#method.build
//! [fit]: ./trainer/struct.Trainer.html#method.fit
#![deny(missing_docs, unsafe_code)]
#![warn(missing_debug_implementations, missing_copy_implementations,
        trivial_casts, trivial_numeric_casts,
        unused_import_braces)]

#[macro_use]
extern crate log;

#[macro_use]
pub mod error;
pub mod tensor;
pub mod context;
pub mod weight;
pub mod stage;
pub mod stages;
pub mod pipeline;
pub mod dataset;
pub mod trainer;
pub mod optimizers;

pub use crate::error::{Error, Result};
