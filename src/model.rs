//! Encoder-decoder with a retrospective encoder.
//!
//! The encoder reads the observed sequence and emits feature points (its
//! hidden sequence). The decoder maps those feature points back to the
//! observed feature space. The retrospective encoder then re-embeds the
//! decoded sequence so its embedding can be compared with the original one.

use crate::rnn::{LSTMNetworks, LSTMNetworksConfig};
use burn::config::Config;
use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Configuration for [`ReSeq2SeqModel`]
#[derive(Config, Debug)]
pub struct ReSeq2SeqModelConfig {
    pub input_neuron_count: usize,
    pub hidden_neuron_count: usize,
    #[config(default = 0.5)]
    pub dropout_rate: f64,
}

impl ReSeq2SeqModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ReSeq2SeqModel<B> {
        ReSeq2SeqModel::new(
            self.init_encoder_decoder(device),
            self.init_retrospective_encoder(device),
        )
    }

    /// Encoder `input -> hidden` and decoder `hidden -> hidden -> input`.
    pub fn init_encoder_decoder<B: Backend>(&self, device: &B::Device) -> EncoderDecoder<B> {
        let encoder = LSTMNetworksConfig::new(self.input_neuron_count, self.hidden_neuron_count)
            .with_dropout_rate(self.dropout_rate)
            .init(device);

        let decoder = LSTMNetworksConfig::new(self.hidden_neuron_count, self.hidden_neuron_count)
            .with_output_size(Some(self.input_neuron_count))
            .with_output_bias(false)
            .with_dropout_rate(self.dropout_rate)
            .init(device);

        EncoderDecoder { encoder, decoder }
    }

    /// Re-encoder `input -> hidden`, sharing the encoder's embedding width.
    pub fn init_retrospective_encoder<B: Backend>(&self, device: &B::Device) -> LSTMNetworks<B> {
        LSTMNetworksConfig::new(self.input_neuron_count, self.hidden_neuron_count)
            .with_dropout_rate(self.dropout_rate)
            .init(device)
    }
}

/// Seq2seq pair whose encoder output doubles as the semantic embedding
#[derive(Module, Debug)]
pub struct EncoderDecoder<B: Backend> {
    encoder: LSTMNetworks<B>,
    decoder: LSTMNetworks<B>,
}

impl<B: Backend> EncoderDecoder<B> {
    pub fn encoder(&self) -> &LSTMNetworks<B> {
        &self.encoder
    }

    pub fn decoder(&self) -> &LSTMNetworks<B> {
        &self.decoder
    }

    /// Returns `(encoded, decoded)`: `[batch, seq, hidden]` and `[batch, seq, input]`
    pub fn forward(&self, observed: Tensor<B, 3>) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let encoded = self.encoder.forward(observed);
        let decoded = self.decoder.forward(encoded.clone());
        (encoded, decoded)
    }
}

/// All tensors produced by one inference pass
#[derive(Debug, Clone)]
pub struct Inference<B: Backend> {
    /// `[batch, seq, input]`
    pub observed: Tensor<B, 3>,
    /// Encoder feature points, `[batch, seq, hidden]`
    pub encoded: Tensor<B, 3>,
    /// Summary in observed space, `[batch, seq, input]`
    pub decoded: Tensor<B, 3>,
    /// Retrospective embedding of the summary, `[batch, seq, hidden]`
    pub re_encoded: Tensor<B, 3>,
}

impl<B: Backend> Inference<B> {
    pub fn batch_size(&self) -> usize {
        self.observed.dims()[0]
    }

    pub fn seq_len(&self) -> usize {
        self.observed.dims()[1]
    }
}

/// The three trainable sub-networks of re-seq2seq
#[derive(Module, Debug)]
pub struct ReSeq2SeqModel<B: Backend> {
    encoder_decoder: EncoderDecoder<B>,
    retrospective_encoder: LSTMNetworks<B>,
}

impl<B: Backend> ReSeq2SeqModel<B> {
    pub fn new(encoder_decoder: EncoderDecoder<B>, retrospective_encoder: LSTMNetworks<B>) -> Self {
        Self {
            encoder_decoder,
            retrospective_encoder,
        }
    }

    pub fn encoder_decoder(&self) -> &EncoderDecoder<B> {
        &self.encoder_decoder
    }

    pub fn retrospective_encoder(&self) -> &LSTMNetworks<B> {
        &self.retrospective_encoder
    }

    pub(crate) fn into_parts(self) -> (EncoderDecoder<B>, LSTMNetworks<B>) {
        (self.encoder_decoder, self.retrospective_encoder)
    }

    pub fn input_neuron_count(&self) -> usize {
        self.encoder_decoder.encoder.input_size()
    }

    pub fn hidden_neuron_count(&self) -> usize {
        self.encoder_decoder.encoder.output_size()
    }

    /// Encode, decode and re-encode `observed` (`[batch, seq, input]`).
    pub fn inference(&self, observed: Tensor<B, 3>) -> Inference<B> {
        let (encoded, decoded) = self.encoder_decoder.forward(observed.clone());
        let re_encoded = self.retrospective_encoder.forward(decoded.clone());

        Inference {
            observed,
            encoded,
            decoded,
            re_encoded,
        }
    }
}
