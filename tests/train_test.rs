#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Tensor;
    use ndarray::Array3;
    use reseq2seq::config::ReSeq2SeqConfig;
    use reseq2seq::data::{tensor_from_array3, BatchSource, LearnedSamples, SequentialBatchIterator};
    use reseq2seq::error::{Error, Result};
    use reseq2seq::loss::MismatchSource;
    use reseq2seq::model::ReSeq2SeqModelConfig;
    use reseq2seq::train::ReSeq2Seq;

    type Backend = Autodiff<NdArray<f32>>;

    fn small_config() -> ReSeq2SeqConfig {
        ReSeq2SeqConfig::new()
            .with_input_neuron_count(4)
            .with_hidden_neuron_count(3)
            .with_seq_len(5)
            .with_batch_size(3)
            .with_dropout_rate(0.0)
            .with_learning_rate(5e-3)
    }

    fn waves(samples: usize, seq_len: usize, features: usize) -> Array3<f32> {
        Array3::from_shape_fn((samples, seq_len, features), |(i, j, k)| {
            ((i as f32 * 0.7) + (j as f32 * 0.3) + (k as f32 * 1.1)).sin()
        })
    }

    /// Hands out one batch with distinct train and test sets
    struct SplitBatch {
        train: Array3<f32>,
        test: Array3<f32>,
        served: bool,
    }

    impl BatchSource<Backend> for SplitBatch {
        fn next_samples(
            &mut self,
            device: &<Backend as burn::tensor::backend::Backend>::Device,
        ) -> Option<Result<LearnedSamples<Backend>>> {
            if self.served {
                return None;
            }
            self.served = true;
            let train = tensor_from_array3::<Backend>(&self.train, device);
            let test = tensor_from_array3::<Backend>(&self.test, device);
            Some(Ok(LearnedSamples {
                train_observed: train.clone(),
                train_target: train,
                test_observed: test.clone(),
                test_target: test,
            }))
        }
    }

    /// Replays the same batch a fixed number of times
    struct FixedBatch {
        data: Array3<f32>,
        remaining: usize,
    }

    impl BatchSource<Backend> for FixedBatch {
        fn next_samples(
            &mut self,
            device: &<Backend as burn::tensor::backend::Backend>::Device,
        ) -> Option<Result<LearnedSamples<Backend>>> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            let observed = tensor_from_array3::<Backend>(&self.data, device);
            Some(Ok(LearnedSamples {
                train_observed: observed.clone(),
                train_target: observed.clone(),
                test_observed: observed.clone(),
                test_target: observed,
            }))
        }
    }

    #[test]
    fn test_learn_logs_every_epoch() {
        let device = Default::default();
        let mut re_seq2seq = ReSeq2Seq::<Backend>::new(small_config(), &device).unwrap();

        let mut source = SequentialBatchIterator::new(waves(8, 5, 4), waves(4, 5, 4), 3, 4)
            .unwrap()
            .with_seed(1);
        re_seq2seq.learn(&mut source, &device).unwrap();

        let logs = re_seq2seq.logs_arr();
        assert_eq!(logs.dim(), (4, 2));
        assert!(logs.iter().all(|v| v.is_finite()));
        assert_eq!(re_seq2seq.logs().len(), 4);
    }

    #[test]
    fn test_learning_lowers_training_loss() {
        let device = Default::default();
        // Equal widths: no random dimension selection between epochs
        let config = small_config().with_hidden_neuron_count(4);
        let mut re_seq2seq = ReSeq2Seq::<Backend>::new(config, &device).unwrap();

        let mut source = FixedBatch {
            data: waves(3, 5, 4),
            remaining: 25,
        };
        re_seq2seq.learn(&mut source, &device).unwrap();

        let entries = re_seq2seq.logs().entries();
        let first = entries[0].train;
        let last = entries[entries.len() - 1].train;
        assert!(last < first, "loss went from {} to {}", first, last);
    }

    #[test]
    fn test_learning_updates_parameters() {
        let device = Default::default();
        let mut re_seq2seq = ReSeq2Seq::<Backend>::new(small_config(), &device).unwrap();
        let held_out = tensor_from_array3::<Backend>(&waves(2, 5, 4), &device);

        let before = re_seq2seq.valid().inference(held_out.clone().inner()).decoded;

        let mut source = FixedBatch {
            data: waves(3, 5, 4),
            remaining: 3,
        };
        re_seq2seq.learn(&mut source, &device).unwrap();

        let after = re_seq2seq.valid().inference(held_out.inner()).decoded;
        let gap: f32 = (before - after).abs().sum().into_scalar();
        assert!(gap > 0.0);
    }

    #[test]
    fn test_learn_until_stops_early() {
        let device = Default::default();
        let mut re_seq2seq = ReSeq2Seq::<Backend>::new(small_config(), &device).unwrap();

        let mut source = FixedBatch {
            data: waves(3, 5, 4),
            remaining: 10,
        };
        let mut polls = 0;
        re_seq2seq
            .learn_until(&mut source, &device, || {
                polls += 1;
                polls > 2
            })
            .unwrap();

        assert_eq!(re_seq2seq.logs().len(), 2);
        assert_eq!(source.remaining, 8);
    }

    #[test]
    fn test_timestep_negatives_train_too() {
        let device = Default::default();
        let config = small_config().with_mismatch_source(MismatchSource::Timesteps);
        let mut re_seq2seq = ReSeq2Seq::<Backend>::new(config, &device).unwrap();

        let mut source = FixedBatch {
            data: waves(2, 5, 4),
            remaining: 2,
        };
        re_seq2seq.learn(&mut source, &device).unwrap();

        assert_eq!(re_seq2seq.logs().len(), 2);
    }

    #[test]
    fn test_learn_rejects_wrong_feature_width() {
        let device = Default::default();
        let mut re_seq2seq = ReSeq2Seq::<Backend>::new(small_config(), &device).unwrap();

        let mut source = FixedBatch {
            data: waves(3, 5, 7),
            remaining: 1,
        };
        let result = re_seq2seq.learn(&mut source, &device);

        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
        assert!(re_seq2seq.logs().is_empty());
    }

    #[test]
    fn test_learn_rejects_wrong_test_batch_width() {
        let device = Default::default();
        let mut re_seq2seq = ReSeq2Seq::<Backend>::new(small_config(), &device).unwrap();
        let sample = tensor_from_array3::<Backend>(&waves(2, 5, 4), &device);
        let before = re_seq2seq.valid().inference(sample.clone().inner()).decoded;

        let mut source = SplitBatch {
            train: waves(2, 5, 4),
            test: waves(2, 5, 7),
            served: false,
        };
        let result = re_seq2seq.learn(&mut source, &device);

        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
        assert!(re_seq2seq.logs().is_empty());

        let after = re_seq2seq.valid().inference(sample.inner()).decoded;
        let gap: f32 = (before - after).abs().sum().into_scalar();
        assert_eq!(gap, 0.0);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let device = Default::default();
        let config = small_config().with_margin_param(-1.0);

        assert!(matches!(
            ReSeq2Seq::<Backend>::new(config, &device),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_parts_checks_widths() {
        let device = Default::default();
        let model = ReSeq2SeqModelConfig::new(4, 6).init::<Backend>(&device);

        assert!(matches!(
            ReSeq2Seq::from_parts(model, small_config()),
            Err(Error::ShapeMismatch { .. })
        ));

        let model = ReSeq2SeqModelConfig::new(4, 3).init::<Backend>(&device);
        assert!(ReSeq2Seq::from_parts(model, small_config()).is_ok());
    }

    #[test]
    fn test_inference_and_loss_per_sample() {
        let device = Default::default();
        let mut re_seq2seq = ReSeq2Seq::<Backend>::new(small_config(), &device).unwrap();

        let observed = Tensor::<Backend, 3>::zeros([6, 5, 4], &device);
        let inference = re_seq2seq.inference(observed);

        assert_eq!(inference.encoded.dims(), [6, 5, 3]);
        assert_eq!(inference.decoded.dims(), [6, 5, 4]);
        assert_eq!(inference.re_encoded.dims(), [6, 5, 3]);

        let loss = re_seq2seq.compute_retrospective_loss(&inference).unwrap();
        assert_eq!(loss.dims(), [6]);
    }
}
