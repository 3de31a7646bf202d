extern crate env_logger;
extern crate sapling;

#[cfg(test)]
mod stage_spec {
    use sapling::context::{Context, Phase};
    use sapling::stage::*;
    use sapling::stages::*;
    use sapling::tensor::Tensor;
    use sapling::weight::{FillerType, WeightConfig};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn conv_config() -> StageConfig {
        StageConfig::new("conv", ConvolutionConfig {
            num_output: 4,
            filter_shape: vec![3],
            stride: vec![1],
            padding: vec![1],
        })
    }

    #[test]
    fn create_stage_from_config() {
        init_logger();
        let stage = Stage::from_config(&conv_config(), &[8, 8, 2], &mut Context::seeded(0)).unwrap();
        assert_eq!("conv", stage.name);
        assert_eq!(&[8, 8, 4], stage.output_shape());
        assert_eq!(vec!["kernel", "bias"], stage.weights().iter().map(|w| w.name()).collect::<Vec<_>>());
        assert_eq!(3 * 3 * 2 * 4 + 4, stage.param_count());
    }

    #[test]
    fn shape_errors_name_the_stage() {
        init_logger();
        let cfg = StageConfig::new("pool", PoolingConfig::max(5));
        let err = Stage::from_config(&cfg, &[4, 4, 1], &mut Context::seeded(0)).unwrap_err();
        assert!(err.is_shape());
        assert!(err.to_string().contains("pool"));
    }

    #[test]
    fn weight_configs_apply_in_order() {
        init_logger();
        let mut cfg = conv_config();
        cfg.add_weight_config(WeightConfig { lr_mult: Some(0.5), ..WeightConfig::default() });
        cfg.add_weight_config(WeightConfig { filler: Some(FillerType::Constant { value: 0.25 }), ..WeightConfig::default() });
        let stage = Stage::from_config(&cfg, &[8, 8, 2], &mut Context::seeded(0)).unwrap();
        assert_eq!(0.5, stage.weights()[0].lr_mult());
        assert!(stage.weights()[1].values().iter().all(|&b| b == 0.25));

        cfg.add_weight_config(WeightConfig::default());
        assert!(Stage::from_config(&cfg, &[8, 8, 2], &mut Context::seeded(0)).unwrap_err().is_shape());
    }

    #[test]
    fn backward_accumulates_until_cleared() {
        init_logger();
        let cfg = StageConfig::new("fc", DenseConfig::linear(2));
        let mut stage = Stage::from_config(&cfg, &[3], &mut Context::seeded(0)).unwrap();
        let input = Tensor::from_fn(&[2, 3], |i| i as f32);
        let output = stage.forward(&input, Phase::Train).unwrap();
        let gradient = output.map(|_| 1f32);

        assert!(stage.backward(&input, &output, &gradient, false).unwrap().is_none());
        let once = stage.weights()[1].gradient().to_vec();
        assert_eq!(vec![2f32, 2.], once);
        let input_gradient = stage.backward(&input, &output, &gradient, true).unwrap().unwrap();
        assert_eq!(input.shape(), input_gradient.shape());
        assert_eq!(vec![4f32, 4.], stage.weights()[1].gradient().to_vec());

        stage.clear_weights_gradients();
        assert!(stage.weights().iter().all(|w| w.gradient().iter().all(|&g| g == 0.0)));
    }

    #[test]
    fn normalization_statistics_are_not_trainable() {
        init_logger();
        let cfg = StageConfig::new("bn", NormalizationConfig::default());
        let mut stage = Stage::from_config(&cfg, &[4, 4, 3], &mut Context::seeded(0)).unwrap();
        assert_eq!(12, stage.param_count());
        assert_eq!(6, stage.trainable_param_count());

        let batch = Tensor::from_fn(&[2, 4, 4, 3], |i| (i % 5) as f32);
        let before = stage.forward(&batch, Phase::Test).unwrap();
        stage.update_running_statistics(&batch);
        let after = stage.forward(&batch, Phase::Test).unwrap();
        assert!(before != after);
    }

    #[test]
    fn stage_kinds() {
        assert_eq!("Convolution", conv_config().stage_type.kind());
        assert_eq!("Sigmoid", StageType::from(ActivationKind::Sigmoid).kind());
        assert_eq!("Flatten", StageConfig::new("f", StageType::Flatten).stage_type.kind());
    }

    #[test]
    fn forward_and_backward_reject_malformed_batches() {
        init_logger();
        let cfg = StageConfig::new("pool", PoolingConfig::max(2));
        let mut stage = Stage::from_config(&cfg, &[4, 4, 1], &mut Context::seeded(0)).unwrap();
        assert!(stage.forward(&Tensor::zeros(&[2, 16]), Phase::Test).unwrap_err().is_shape());
        assert!(stage.forward(&Tensor::zeros(&[0, 4, 4, 1]), Phase::Test).unwrap_err().is_shape());

        let input = Tensor::from_fn(&[2, 4, 4, 1], |i| i as f32);
        let output = stage.forward(&input, Phase::Train).unwrap();
        let gradient = output.map(|_| 1f32);
        assert!(stage.backward(&input, &Tensor::zeros(&[2, 4, 4, 1]), &gradient, true).unwrap_err().is_shape());
        assert!(stage.backward(&input, &output, &Tensor::zeros(&[2, 1, 1, 1]), true).unwrap_err().is_shape());
        assert!(stage.backward(&input, &output, &Tensor::zeros(&[3, 2, 2, 1]), true).unwrap_err().is_shape());
        assert!(stage.backward(&Tensor::zeros(&[1, 4, 4, 1]), &output, &gradient, true).unwrap_err().is_shape());
        assert!(stage.backward(&input, &output, &gradient, true).is_ok());
    }

    #[test]
    fn rejected_backward_leaves_gradients_alone() {
        init_logger();
        let cfg = StageConfig::new("fc", DenseConfig::linear(2));
        let mut stage = Stage::from_config(&cfg, &[3], &mut Context::seeded(0)).unwrap();
        let input = Tensor::from_fn(&[2, 3], |i| i as f32);
        let output = stage.forward(&input, Phase::Train).unwrap();
        let err = stage.backward(&input, &output, &Tensor::zeros(&[1, 2]), true).unwrap_err();
        assert!(err.is_shape());
        assert!(err.to_string().contains("fc"));
        assert!(stage.weights().iter().all(|w| w.gradient().iter().all(|&g| g == 0.0)));
    }
}
