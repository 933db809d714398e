//! # re-seq2seq - Retrospective Sequence-to-Sequence Learning (Rust)
//!
//! Unsupervised summarization with retrospective encoders, built on the Burn
//! framework.
//!
//! An LSTM encoder observes the original sequence and emits feature points.
//! An LSTM decoder turns those into a summary. A retrospective encoder then
//! re-embeds the summary. A good summary is one whose embedding sits close to
//! the original's and far from the embeddings of mismatched samples.
//!
//! ## Features
//!
//! - **Retrospective loss**: summary, match and margin-based mismatch terms
//!   with delta clipping
//! - **Learning loop**: two Adam optimizers, gradient norm clipping and
//!   step-wise learning rate attenuation
//! - **Batching**: pluggable [`BatchSource`](data::BatchSource) with an
//!   in-memory `ndarray` implementation
//! - **Summarization**: ranks sequences by loss and maps them back to sentences
//!
//! ## Quick Start
//!
//! ```rust
//! use reseq2seq::prelude::*;
//!
//! let config = ReSeq2SeqConfig::new()
//!     .with_input_neuron_count(16)
//!     .with_hidden_neuron_count(16);
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Training
//!
//! ```ignore
//! use burn::backend::{Autodiff, NdArray};
//!
//! type Backend = Autodiff<NdArray<f32>>;
//!
//! let mut re_seq2seq = ReSeq2Seq::<Backend>::new(config, &device)?;
//! let mut source = SequentialBatchIterator::new(train, test, 20, 500)?;
//! re_seq2seq.learn(&mut source, &device)?;
//!
//! let summary = re_seq2seq
//!     .valid()
//!     .summarize(&test_arr, &vectorizer, &sentences, 5, &device)?;
//! ```

pub mod cells;
pub mod config;
pub mod data;
pub mod error;
pub mod loss;
pub mod model;
pub mod rnn;
pub mod summarize;
pub mod train;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::cells::LSTMCell;
    pub use crate::config::ReSeq2SeqConfig;
    pub use crate::data::{BatchSource, LearnedSamples, SequentialBatchIterator};
    pub use crate::error::{Error, Result};
    pub use crate::loss::{MismatchSource, RetrospectiveLoss, RetrospectiveLossConfig};
    pub use crate::model::{EncoderDecoder, Inference, ReSeq2SeqModel, ReSeq2SeqModelConfig};
    pub use crate::rnn::{LSTMNetworks, LSTMNetworksConfig};
    pub use crate::summarize::VectorizableToken;
    pub use crate::train::{EpochLoss, LearningRateAttenuation, ReSeq2Seq, TrainingLog};
}
