//! Batching sources for the learning loop.
//!
//! The learning loop only needs something that hands out training and test
//! batches as 3-D tensors, `[batch, seq_len, features]`. Anything that
//! implements [`BatchSource`] will do. [`SequentialBatchIterator`] covers
//! the common case of two in-memory `ndarray` sets.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use ndarray::{Array3, Axis};
use rand::prelude::*;

use crate::config::ReSeq2SeqConfig;
use crate::error::{Error, Result};

/// One step worth of training and test samples
#[derive(Debug, Clone)]
pub struct LearnedSamples<B: Backend> {
    pub train_observed: Tensor<B, 3>,
    pub train_target: Tensor<B, 3>,
    pub test_observed: Tensor<B, 3>,
    pub test_target: Tensor<B, 3>,
}

/// Producer of [`LearnedSamples`], one per epoch
pub trait BatchSource<B: Backend> {
    /// `None` once the source is exhausted
    fn next_samples(&mut self, device: &B::Device) -> Option<Result<LearnedSamples<B>>>;
}

/// Random mini-batches over in-memory sequences
///
/// Every call draws `batch_size` sequences from the training set and
/// `test_batch_size` from the test set, with replacement. Targets equal the
/// observed batches since learning is unsupervised.
#[derive(Debug, Clone)]
pub struct SequentialBatchIterator {
    train: Array3<f32>,
    test: Array3<f32>,
    batch_size: usize,
    test_batch_size: usize,
    epochs: usize,
    epoch: usize,
    rng: StdRng,
}

impl SequentialBatchIterator {
    /// # Arguments
    /// * `train` - `[samples, seq_len, features]`
    /// * `test` - `[samples, seq_len, features]`, same trailing shape as `train`
    /// * `batch_size` - Samples drawn per epoch from each set
    /// * `epochs` - Number of batches handed out
    pub fn new(
        train: Array3<f32>,
        test: Array3<f32>,
        batch_size: usize,
        epochs: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig(
                "`batch_size` must be more than 0".to_string(),
            ));
        }
        if train.len_of(Axis(0)) == 0 || test.len_of(Axis(0)) == 0 {
            return Err(Error::EmptyBatch);
        }
        if train.shape()[1..] != test.shape()[1..] {
            return Err(Error::ShapeMismatch {
                expected: format!("test [_, {}, {}]", train.shape()[1], train.shape()[2]),
                actual: format!("test {:?}", test.shape()),
            });
        }

        Ok(Self {
            train,
            test,
            batch_size,
            test_batch_size: batch_size,
            epochs,
            epoch: 0,
            rng: StdRng::seed_from_u64(0),
        })
    }

    /// Same as [`new`](Self::new) with `config.batch_size` and `config.seed`,
    /// also checking that sequences are `[_, seq_len, input_neuron_count]`.
    pub fn for_config(
        train: Array3<f32>,
        test: Array3<f32>,
        config: &ReSeq2SeqConfig,
        epochs: usize,
    ) -> Result<Self> {
        let (_, seq_len, features) = train.dim();
        if seq_len != config.seq_len || features != config.input_neuron_count {
            return Err(Error::ShapeMismatch {
                expected: format!("train [_, {}, {}]", config.seq_len, config.input_neuron_count),
                actual: format!("train {:?}", train.shape()),
            });
        }
        Ok(Self::new(train, test, config.batch_size, epochs)?.with_seed(config.seed))
    }

    pub fn with_test_batch_size(mut self, test_batch_size: usize) -> Self {
        self.test_batch_size = test_batch_size.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Batches handed out so far
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    fn draw(rng: &mut StdRng, set: &Array3<f32>, size: usize) -> Array3<f32> {
        let samples = set.len_of(Axis(0));
        let indices: Vec<usize> = (0..size).map(|_| rng.gen_range(0..samples)).collect();
        set.select(Axis(0), &indices)
    }
}

impl<B: Backend> BatchSource<B> for SequentialBatchIterator {
    fn next_samples(&mut self, device: &B::Device) -> Option<Result<LearnedSamples<B>>> {
        if self.epoch >= self.epochs {
            return None;
        }
        self.epoch += 1;

        let train = Self::draw(&mut self.rng, &self.train, self.batch_size);
        let test = Self::draw(&mut self.rng, &self.test, self.test_batch_size);

        let train_observed = tensor_from_array3::<B>(&train, device);
        let test_observed = tensor_from_array3::<B>(&test, device);

        Some(Ok(LearnedSamples {
            train_target: train_observed.clone(),
            train_observed,
            test_target: test_observed.clone(),
            test_observed,
        }))
    }
}

/// Copy an `ndarray` into a tensor on `device`
pub fn tensor_from_array3<B: Backend>(array: &Array3<f32>, device: &B::Device) -> Tensor<B, 3> {
    let (samples, seq_len, features) = array.dim();
    let values: Vec<f32> = array.iter().copied().collect();
    Tensor::from_data(TensorData::new(values, [samples, seq_len, features]), device)
}

/// Read a tensor back into an `ndarray`
pub fn array3_from_tensor<B: Backend>(tensor: Tensor<B, 3>) -> Result<Array3<f32>> {
    let [samples, seq_len, features] = tensor.dims();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| Error::Data(format!("{err:?}")))?;

    Array3::from_shape_vec((samples, seq_len, features), values)
        .map_err(|err| Error::Data(err.to_string()))
}
