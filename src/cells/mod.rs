//! # Recurrent Cells
//!
//! Single-timestep cells that the sequence layers in [`crate::rnn`] unroll.
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape | Description |
//! |--------|-------|-------------|
//! | `input` | `[batch, input_size]` | Observed features at one step |
//! | `hidden` | `[batch, hidden_size]` | Previous hidden state |
//! | `cell` | `[batch, hidden_size]` | Previous memory cell |
//!
//! ## Example
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use reseq2seq::cells::LSTMCell;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! let cell = LSTMCell::<Backend>::new(16, 32, &device);
//! let state = cell.initial_state(4, &device);
//! let input = Tensor::<Backend, 2>::zeros([4, 16], &device);
//!
//! let (hidden, memory) = cell.forward(input, state);
//! assert_eq!(hidden.dims(), [4, 32]);
//! assert_eq!(memory.dims(), [4, 32]);
//! ```

pub mod lstm_cell;

pub use lstm_cell::{LSTMCell, LSTMState};
