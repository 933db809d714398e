//! Learning loop for re-seq2seq.
//!
//! [`ReSeq2Seq`] owns the three sub-networks, the retrospective loss and the
//! per-epoch loss log. Each epoch it:
//!
//! 1. attenuates the learning rate when `(epoch + 1) % attenuate_epoch == 0`,
//! 2. runs encoder, decoder and retrospective encoder on the training batch,
//! 3. back-propagates the mean retrospective loss,
//! 4. steps one Adam optimizer for the encoder-decoder and another for the
//!    retrospective encoder, both with gradient norm clipping,
//! 5. evaluates the test batch without autodiff and logs both losses.

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::ReSeq2SeqConfig;
use crate::data::BatchSource;
use crate::error::{Error, Result};
use crate::loss::{RetrospectiveLoss, RetrospectiveLossConfig};
use crate::model::{EncoderDecoder, Inference, ReSeq2SeqModel, ReSeq2SeqModelConfig};
use crate::rnn::LSTMNetworks;

/// Step-wise learning rate attenuation
///
/// Formula: the rate is multiplied by `rate` at every epoch `e` (1-based)
/// where `(e + 1) % every == 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRateAttenuation {
    learning_rate: f64,
    rate: f64,
    every: usize,
}

impl LearningRateAttenuation {
    pub fn new(learning_rate: f64, rate: f64, every: usize) -> Self {
        Self {
            learning_rate,
            rate,
            every: every.max(1),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Learning rate to use for `epoch`
    pub fn on_epoch(&mut self, epoch: usize) -> f64 {
        if (epoch + 1) % self.every == 0 {
            self.learning_rate *= self.rate;
        }
        self.learning_rate
    }
}

/// Mean training and test loss of one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochLoss {
    pub train: f32,
    pub test: f32,
}

/// Append-only history of [`EpochLoss`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingLog {
    entries: Vec<EpochLoss>,
}

impl TrainingLog {
    pub fn entries(&self) -> &[EpochLoss] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<EpochLoss> {
        self.entries.last().copied()
    }

    /// `[epochs, 2]` matrix, columns are training and test loss
    pub fn to_array(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.entries.len(), 2), |(epoch, column)| {
            let entry = self.entries[epoch];
            if column == 0 {
                entry.train
            } else {
                entry.test
            }
        })
    }

    fn push(&mut self, entry: EpochLoss) {
        self.entries.push(entry);
    }
}

/// Retrospective sequence-to-sequence learner
///
/// ```rust
/// use burn::backend::{Autodiff, NdArray};
/// use ndarray::Array3;
/// use reseq2seq::config::ReSeq2SeqConfig;
/// use reseq2seq::data::SequentialBatchIterator;
/// use reseq2seq::train::ReSeq2Seq;
///
/// type Backend = Autodiff<NdArray<f32>>;
/// let device = Default::default();
///
/// let config = ReSeq2SeqConfig::new()
///     .with_input_neuron_count(4)
///     .with_hidden_neuron_count(4)
///     .with_seq_len(3)
///     .with_batch_size(2)
///     .with_learning_rate(1e-3);
/// let mut re_seq2seq = ReSeq2Seq::<Backend>::new(config, &device).unwrap();
///
/// let data = Array3::<f32>::from_elem((6, 3, 4), 0.5);
/// let mut source = SequentialBatchIterator::new(data.clone(), data, 2, 2).unwrap();
/// re_seq2seq.learn(&mut source, &device).unwrap();
///
/// assert_eq!(re_seq2seq.logs_arr().dim(), (2, 2));
/// ```
#[derive(Debug, Clone)]
pub struct ReSeq2Seq<B: Backend> {
    model: ReSeq2SeqModel<B>,
    loss: RetrospectiveLoss,
    config: ReSeq2SeqConfig,
    logs: TrainingLog,
}

impl<B: Backend> ReSeq2Seq<B> {
    /// Validate `config` and build fresh sub-networks on `device`.
    pub fn new(config: ReSeq2SeqConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let model = ReSeq2SeqModelConfig::new(config.input_neuron_count, config.hidden_neuron_count)
            .with_dropout_rate(config.dropout_rate)
            .init(device);
        Self::from_parts(model, config)
    }

    /// Use caller-built sub-networks. Their widths must agree with `config`.
    pub fn from_parts(model: ReSeq2SeqModel<B>, config: ReSeq2SeqConfig) -> Result<Self> {
        config.validate()?;

        let encoder_decoder = model.encoder_decoder();
        let retrospective_encoder = model.retrospective_encoder();
        let widths = [
            ("encoder input", encoder_decoder.encoder().input_size(), config.input_neuron_count),
            ("encoder output", encoder_decoder.encoder().output_size(), config.hidden_neuron_count),
            ("decoder input", encoder_decoder.decoder().input_size(), config.hidden_neuron_count),
            ("decoder output", encoder_decoder.decoder().output_size(), config.input_neuron_count),
            ("retrospective encoder input", retrospective_encoder.input_size(), config.input_neuron_count),
            ("retrospective encoder output", retrospective_encoder.output_size(), config.hidden_neuron_count),
        ];
        for (name, actual, expected) in widths {
            if actual != expected {
                return Err(Error::ShapeMismatch {
                    expected: format!("{name} width {expected}"),
                    actual: format!("{name} width {actual}"),
                });
            }
        }

        let loss = RetrospectiveLossConfig::new()
            .with_margin_param(config.margin_param)
            .with_retrospective_lambda(config.retrospective_lambda)
            .with_retrospective_eta(config.retrospective_eta)
            .with_grad_clip_threshold(config.grad_clip_threshold)
            .with_mismatch_source(config.mismatch_source)
            .with_seed(config.seed)
            .init();

        Ok(Self {
            model,
            loss,
            config,
            logs: TrainingLog::default(),
        })
    }

    pub fn config(&self) -> &ReSeq2SeqConfig {
        &self.config
    }

    pub fn model(&self) -> &ReSeq2SeqModel<B> {
        &self.model
    }

    pub fn into_model(self) -> ReSeq2SeqModel<B> {
        self.model
    }

    pub fn encoder_decoder(&self) -> &EncoderDecoder<B> {
        self.model.encoder_decoder()
    }

    pub fn retrospective_encoder(&self) -> &LSTMNetworks<B> {
        self.model.retrospective_encoder()
    }

    pub fn logs(&self) -> &TrainingLog {
        &self.logs
    }

    /// Training and test loss per epoch, `[epochs, 2]`
    pub fn logs_arr(&self) -> Array2<f32> {
        self.logs.to_array()
    }

    /// Encode, decode and re-encode `observed` (`[batch, seq, input]`)
    pub fn inference(&self, observed: Tensor<B, 3>) -> Inference<B> {
        self.model.inference(observed)
    }

    /// Per-sample retrospective loss, `[batch]`
    pub fn compute_retrospective_loss(&mut self, inference: &Inference<B>) -> Result<Tensor<B, 1>> {
        self.loss.forward(inference)
    }

    fn check_observed(&self, observed: &Tensor<B, 3>) -> Result<()> {
        let [batch_size, seq_len, features] = observed.dims();
        if batch_size == 0 || seq_len == 0 {
            return Err(Error::EmptyBatch);
        }
        if seq_len != self.config.seq_len || features != self.config.input_neuron_count {
            return Err(Error::ShapeMismatch {
                expected: format!(
                    "observed [_, {}, {}]",
                    self.config.seq_len, self.config.input_neuron_count
                ),
                actual: format!("observed {:?}", observed.dims()),
            });
        }
        Ok(())
    }

    /// Check the shape of `observed`, then run inference and the loss.
    pub(crate) fn evaluate(&mut self, observed: Tensor<B, 3>) -> Result<Tensor<B, 1>> {
        self.check_observed(&observed)?;
        let inference = self.model.inference(observed);
        self.loss.forward(&inference)
    }
}

impl<B: AutodiffBackend> ReSeq2Seq<B> {
    /// Copy without autodiff, for deterministic inference and summarization.
    pub fn valid(&self) -> ReSeq2Seq<B::InnerBackend> {
        ReSeq2Seq {
            model: self.model.valid(),
            loss: self.loss.clone(),
            config: self.config.clone(),
            logs: self.logs.clone(),
        }
    }

    /// Learn until `source` is exhausted.
    pub fn learn<S: BatchSource<B>>(&mut self, source: &mut S, device: &B::Device) -> Result<()> {
        self.learn_until(source, device, || false)
    }

    /// Learn until `source` is exhausted or `should_stop` returns true.
    ///
    /// `should_stop` is polled before every epoch. Stopping keeps the
    /// parameters and log entries of the epochs already completed.
    pub fn learn_until<S, F>(
        &mut self,
        source: &mut S,
        device: &B::Device,
        mut should_stop: F,
    ) -> Result<()>
    where
        S: BatchSource<B>,
        F: FnMut() -> bool,
    {
        let clipping = GradientClippingConfig::Norm(self.config.grad_clip_threshold);
        let mut encoder_decoder_optim = AdamConfig::new()
            .with_grad_clipping(Some(clipping.clone()))
            .init::<B, EncoderDecoder<B>>();
        let mut retrospective_optim = AdamConfig::new()
            .with_grad_clipping(Some(clipping))
            .init::<B, LSTMNetworks<B>>();

        let mut attenuation = LearningRateAttenuation::new(
            self.config.learning_rate,
            self.config.learning_attenuate_rate,
            self.config.attenuate_epoch,
        );

        tracing::info!(
            learning_rate = self.config.learning_rate,
            attenuate_epoch = self.config.attenuate_epoch,
            mismatch_source = ?self.config.mismatch_source,
            "Starting re-seq2seq learning"
        );

        let mut epoch = 0;
        loop {
            if should_stop() {
                tracing::debug!(epoch, "Interrupt.");
                break;
            }
            let Some(samples) = source.next_samples(device) else {
                break;
            };
            let samples = samples?;
            // Reject a bad test batch before the parameters move
            self.check_observed(&samples.test_observed)?;

            epoch += 1;
            let learning_rate = attenuation.on_epoch(epoch);

            let loss = self.evaluate(samples.train_observed)?.mean();
            let train_loss: f32 = loss.clone().into_scalar().elem();

            let mut grads = loss.backward();
            let (encoder_decoder, retrospective_encoder) = self.model.clone().into_parts();
            let encoder_decoder_grads = GradientsParams::from_module(&mut grads, &encoder_decoder);
            let retrospective_grads =
                GradientsParams::from_module(&mut grads, &retrospective_encoder);

            let encoder_decoder =
                encoder_decoder_optim.step(learning_rate, encoder_decoder, encoder_decoder_grads);
            let retrospective_encoder =
                retrospective_optim.step(learning_rate, retrospective_encoder, retrospective_grads);
            self.model = ReSeq2SeqModel::new(encoder_decoder, retrospective_encoder);

            let test_loss = self.test_loss(samples.test_observed.inner())?;
            self.verify_retrospective_loss(train_loss, test_loss, learning_rate);
        }

        tracing::debug!(epochs = epoch, "end.");
        Ok(())
    }

    fn test_loss(&mut self, observed: Tensor<B::InnerBackend, 3>) -> Result<f32> {
        let model = self.model.valid();
        let inference = model.inference(observed);
        let loss = self.loss.forward(&inference)?;
        Ok(loss.mean().into_scalar().elem())
    }

    fn verify_retrospective_loss(&mut self, train: f32, test: f32, learning_rate: f64) {
        tracing::debug!(
            epoch = self.logs.len() + 1,
            train_loss = train,
            test_loss = test,
            learning_rate,
            "Loss"
        );
        self.logs.push(EpochLoss { train, test });
    }
}
