//! LSTM sequence layer
//!
//! Unrolls an [`LSTMCell`] over batch-first sequences and optionally maps the
//! hidden sequence through a tanh output layer.

use crate::cells::LSTMCell;
use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Configuration for [`LSTMNetworks`]
#[derive(Config, Debug)]
pub struct LSTMNetworksConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    /// Width of the tanh output layer. `None` returns the hidden sequence.
    #[config(default = "None")]
    pub output_size: Option<usize>,
    #[config(default = 0.0)]
    pub dropout_rate: f64,
    #[config(default = false)]
    pub output_bias: bool,
}

impl LSTMNetworksConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LSTMNetworks<B> {
        let output_layer = self.output_size.map(|output_size| {
            LinearConfig::new(self.hidden_size, output_size)
                .with_bias(self.output_bias)
                .init(device)
        });

        LSTMNetworks {
            cell: LSTMCell::new(self.input_size, self.hidden_size, device),
            dropout: DropoutConfig::new(self.dropout_rate).init(),
            output_layer,
            input_size: self.input_size,
            hidden_size: self.hidden_size,
            output_size: self.output_size.unwrap_or(self.hidden_size),
        }
    }
}

/// LSTM networks over `[batch, seq_len, features]` inputs
///
/// Dropout is applied to the hidden sequence. Burn only activates it on
/// autodiff backends, so inference through `valid()` is deterministic.
#[derive(Module, Debug)]
pub struct LSTMNetworks<B: Backend> {
    cell: LSTMCell<B>,
    dropout: Dropout,
    output_layer: Option<Linear<B>>,
    input_size: usize,
    hidden_size: usize,
    output_size: usize,
}

impl<B: Backend> LSTMNetworks<B> {
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Width of the last axis returned by [`forward`](Self::forward)
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn has_output_layer(&self) -> bool {
        self.output_layer.is_some()
    }

    /// Run the whole sequence
    ///
    /// # Arguments
    /// * `input` - `[batch, seq_len, input_size]` with `seq_len > 0`
    ///
    /// # Returns
    /// `[batch, seq_len, output_size]`
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let hidden = self.hidden_sequence(input);
        match &self.output_layer {
            Some(layer) => layer.forward(hidden).tanh(),
            None => hidden,
        }
    }

    /// Hidden state at every timestep, `[batch, seq_len, hidden_size]`
    pub fn hidden_sequence(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, seq_len, features] = input.dims();
        let device = input.device();

        let mut state = self.cell.initial_state(batch_size, &device);
        let mut hidden_states: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            // input[batch, t, features] -> [batch, features]
            let step = input
                .clone()
                .narrow(1, t, 1)
                .reshape([batch_size, features]);
            state = self.cell.forward(step, state);
            hidden_states.push(state.0.clone());
        }

        let hidden: Tensor<B, 3> = Tensor::stack(hidden_states, 1);
        self.dropout.forward(hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_hidden_only_networks() {
        let device = Default::default();
        let networks = LSTMNetworksConfig::new(6, 10).init::<TestBackend>(&device);

        assert!(!networks.has_output_layer());
        assert_eq!(networks.output_size(), 10);

        let input = Tensor::<TestBackend, 3>::zeros([3, 5, 6], &device);
        let output = networks.forward(input);

        assert_eq!(output.dims(), [3, 5, 10]);
    }

    #[test]
    fn test_output_layer_is_tanh_bounded() {
        let device = Default::default();
        let networks = LSTMNetworksConfig::new(6, 10)
            .with_output_size(Some(4))
            .init::<TestBackend>(&device);

        assert_eq!(networks.output_size(), 4);

        let input =
            Tensor::<TestBackend, 3>::random([2, 7, 6], Distribution::Uniform(-3.0, 3.0), &device);
        let output = networks.forward(input);

        assert_eq!(output.dims(), [2, 7, 4]);
        let max_abs: f32 = output.abs().max().into_scalar();
        assert!(max_abs <= 1.0);
    }

    #[test]
    fn test_timesteps_depend_on_history() {
        let device = Default::default();
        let networks = LSTMNetworksConfig::new(3, 5).init::<TestBackend>(&device);

        // Same input at every step: only the recurrent state makes steps differ
        let input = Tensor::<TestBackend, 3>::ones([1, 4, 3], &device);
        let hidden = networks.forward(input);

        let first = hidden.clone().narrow(1, 0, 1);
        let last = hidden.narrow(1, 3, 1);
        let gap: f32 = (first - last).abs().sum().into_scalar();
        assert!(gap > 1e-6);
    }

    #[test]
    fn test_dropout_inactive_without_autodiff() {
        let device = Default::default();
        let networks = LSTMNetworksConfig::new(3, 5)
            .with_dropout_rate(0.9)
            .init::<TestBackend>(&device);

        let input =
            Tensor::<TestBackend, 3>::random([2, 3, 3], Distribution::Uniform(-1.0, 1.0), &device);
        let a = networks.forward(input.clone());
        let b = networks.forward(input);

        let gap: f32 = (a - b).abs().sum().into_scalar();
        assert!(gap < 1e-6);
    }

    #[test]
    fn test_dropout_active_with_autodiff() {
        let device = Default::default();
        let networks = LSTMNetworksConfig::new(3, 32)
            .with_dropout_rate(0.5)
            .init::<Autodiff<TestBackend>>(&device);

        let input = Tensor::<Autodiff<TestBackend>, 3>::ones([4, 3, 3], &device);
        let hidden = networks.forward(input);

        let zeros: f32 = hidden.equal_elem(0.0).float().sum().into_scalar();
        assert!(zeros > 0.0, "dropout dropped nothing");
    }
}
