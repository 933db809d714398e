//! # Sequence Layers
//!
//! [`LSTMNetworks`] unrolls an [`LSTMCell`](crate::cells::LSTMCell) over a
//! whole sequence. The encoder, decoder and retrospective encoder of
//! [`ReSeq2SeqModel`](crate::model::ReSeq2SeqModel) are all instances of it.
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | input | `[batch, seq_len, input_size]` |
//! | output, no output layer | `[batch, seq_len, hidden_size]` |
//! | output, with output layer | `[batch, seq_len, output_size]` |
//!
//! Inputs are always batch-first.
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use reseq2seq::rnn::LSTMNetworksConfig;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! let decoder = LSTMNetworksConfig::new(32, 32)
//!     .with_output_size(Some(16))
//!     .init::<Backend>(&device);
//!
//! let encoded = Tensor::<Backend, 3>::zeros([4, 10, 32], &device);
//! assert_eq!(decoder.forward(encoded).dims(), [4, 10, 16]);
//! ```

pub mod lstm;

pub use lstm::{LSTMNetworks, LSTMNetworksConfig};
