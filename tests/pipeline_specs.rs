extern crate env_logger;
extern crate sapling;

#[cfg(test)]
mod pipeline_spec {
    use sapling::context::{Context, Phase};
    use sapling::pipeline::*;
    use sapling::stage::*;
    use sapling::stages::*;
    use sapling::tensor::Tensor;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// The HappyModel for images of `size` x `size` pixels.
    fn happy_model(size: usize) -> PipelineConfig {
        let mut cfg = PipelineConfig::new("HappyModel", &[size, size, 3]);
        cfg.add_stage(StageConfig::new("zero_padding", PaddingConfig { padding: vec![3, 3] }));
        cfg.add_stage(StageConfig::new("conv0", ConvolutionConfig {
            num_output: 32,
            filter_shape: vec![7, 7],
            stride: vec![1],
            padding: vec![],
        }));
        cfg.add_stage(StageConfig::new("bn0", NormalizationConfig::default()));
        cfg.add_stage(StageConfig::new("relu0", StageType::ReLU));
        cfg.add_stage(StageConfig::new("max_pool", PoolingConfig::max(2)));
        cfg.add_stage(StageConfig::new("flatten", StageType::Flatten));
        cfg.add_stage(StageConfig::new("fc", DenseConfig { output_size: 1, activation: Some(ActivationKind::Sigmoid) }));
        cfg
    }

    #[test]
    fn happy_model_shapes_and_parameters() {
        init_logger();
        let pipeline = Pipeline::build(&happy_model(64), &mut Context::seeded(0)).unwrap();
        assert_eq!(&[1], pipeline.output_shape());
        assert_eq!(37_633, pipeline.param_count());
        assert_eq!(37_569, pipeline.trainable_param_count());

        let shapes: Vec<Vec<usize>> = pipeline.stages().iter().map(|s| s.output_shape().to_vec()).collect();
        assert_eq!(vec![70, 70, 3], shapes[0]);
        assert_eq!(vec![64, 64, 32], shapes[1]);
        assert_eq!(vec![32, 32, 32], shapes[4]);
        assert_eq!(vec![32768], shapes[5]);

        let summary = pipeline.summary();
        assert!(summary.contains("Total params: 37633"));
        assert!(summary.contains("Non-trainable params: 64"));
    }

    #[test]
    fn forward_is_deterministic() {
        init_logger();
        let pipeline = Pipeline::build(&happy_model(16), &mut Context::seeded(1)).unwrap();
        let batch = Tensor::from_fn(&[3, 16, 16, 3], |i| ((i * 31) % 255) as f32 / 255.0);
        let first = pipeline.forward(&batch).unwrap();
        let second = pipeline.forward(&batch).unwrap();
        assert_eq!(first, second);
        assert_eq!(&[3, 1], first.shape());
        assert!(first.data().iter().all(|&p| p > 0.0 && p < 1.0));
    }

    #[test]
    fn same_seed_same_pipeline() {
        init_logger();
        let a = Pipeline::build(&happy_model(16), &mut Context::seeded(7)).unwrap();
        let b = Pipeline::build(&happy_model(16), &mut Context::seeded(7)).unwrap();
        let batch = Tensor::from_fn(&[2, 16, 16, 3], |i| (i % 17) as f32 / 17.0);
        assert_eq!(a.forward(&batch).unwrap(), b.forward(&batch).unwrap());
    }

    #[test]
    fn oversized_window_fails_to_build() {
        init_logger();
        let mut cfg = PipelineConfig::new("too_small", &[4, 4, 3]);
        cfg.add_stage(StageConfig::new("pool", PoolingConfig::max(8)));
        assert!(Pipeline::build(&cfg, &mut Context::seeded(0)).unwrap_err().is_shape());

        let mut cfg = PipelineConfig::new("too_small", &[4, 4, 3]);
        cfg.add_stage(StageConfig::new("conv", ConvolutionConfig {
            num_output: 1, filter_shape: vec![7], stride: vec![1], padding: vec![1] }));
        assert!(Pipeline::build(&cfg, &mut Context::seeded(0)).unwrap_err().is_shape());
    }

    #[test]
    fn incompatible_stages_fail_to_build() {
        init_logger();
        let mut cfg = PipelineConfig::new("unflattened", &[4, 4, 3]);
        cfg.add_stage(StageConfig::new("fc", DenseConfig::linear(1)));
        assert!(Pipeline::build(&cfg, &mut Context::seeded(0)).unwrap_err().is_shape());

        let mut cfg = PipelineConfig::new("bad_axis", &[4, 4, 3]);
        cfg.add_stage(StageConfig::new("bn", NormalizationConfig::with_axis(3)));
        assert!(Pipeline::build(&cfg, &mut Context::seeded(0)).unwrap_err().is_shape());
    }

    #[test]
    fn forward_rejects_wrong_batches() {
        init_logger();
        let pipeline = Pipeline::build(&happy_model(16), &mut Context::seeded(0)).unwrap();
        assert!(pipeline.forward(&Tensor::zeros(&[2, 16, 16, 1])).unwrap_err().is_shape());
        assert!(pipeline.forward(&Tensor::zeros(&[16, 16, 3])).unwrap_err().is_shape());
        assert!(pipeline.forward(&Tensor::zeros(&[0, 16, 16, 3])).unwrap_err().is_shape());
    }

    #[test]
    fn training_phase_updates_running_statistics_only() {
        init_logger();
        let mut pipeline = Pipeline::build(&happy_model(16), &mut Context::seeded(0)).unwrap();
        let batch = Tensor::from_fn(&[2, 16, 16, 3], |i| (i % 13) as f32 / 13.0);
        let before = pipeline.forward(&batch).unwrap();
        let trainable: Vec<Vec<f32>> = pipeline.learnable_weights().iter().map(|w| w.values().to_vec()).collect();

        let trace = pipeline.forward_trace(&batch, Phase::Train).unwrap();
        assert_eq!(pipeline.stages().len() + 1, trace.len());
        let after: Vec<Vec<f32>> = pipeline.learnable_weights().iter().map(|w| w.values().to_vec()).collect();
        assert_eq!(trainable, after);
        assert!(before != pipeline.forward(&batch).unwrap());
    }

    #[test]
    fn build_from_json() {
        init_logger();
        let json = happy_model(64).to_json().unwrap();
        let cfg = PipelineConfig::from_json(&json).unwrap();
        let pipeline = Pipeline::build(&cfg, &mut Context::seeded(0)).unwrap();
        assert_eq!(37_633, pipeline.param_count());
    }

    #[test]
    fn backward_rejects_malformed_traces() {
        init_logger();
        let mut cfg = PipelineConfig::new("pool_and_dense", &[4, 4, 1]);
        cfg.add_stage(StageConfig::new("max_pool", PoolingConfig::max(2)));
        cfg.add_stage(StageConfig::new("flatten", StageType::Flatten));
        cfg.add_stage(StageConfig::new("fc", DenseConfig::linear(1)));
        let mut pipeline = Pipeline::build(&cfg, &mut Context::seeded(0)).unwrap();
        let batch = Tensor::from_fn(&[2, 4, 4, 1], |i| i as f32 / 32.0);
        let trace = pipeline.forward_trace(&batch, Phase::Train).unwrap();
        let gradient = Tensor::zeros(&[2, 1]);

        assert!(pipeline.backward(&trace, &Tensor::zeros(&[1])).unwrap_err().is_shape());
        assert!(pipeline.backward(&trace, &Tensor::zeros(&[3, 1])).unwrap_err().is_shape());
        assert!(pipeline.backward(&trace[..2], &gradient).unwrap_err().is_shape());

        let mut broken = trace.clone();
        broken[3] = Tensor::zeros(&[2, 1, 1, 1]);
        assert!(pipeline.backward(&broken, &gradient.map(|_| 1f32)).unwrap_err().is_shape());
        let mut broken = trace.clone();
        broken[1] = Tensor::zeros(&[2, 4, 4, 1]);
        assert!(pipeline.backward(&broken, &gradient.map(|_| 1f32)).unwrap_err().is_shape());
        assert!(pipeline.learnable_weights().iter().all(|w| w.gradient().iter().all(|&g| g == 0.0)));

        pipeline.backward(&trace, &gradient.map(|_| 1f32)).unwrap();
        assert!(pipeline.learnable_weights().iter().any(|w| w.gradient().iter().any(|&g| g != 0.0)));
    }
}
