use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Hidden and cell state carried between timesteps, each `[batch, hidden_size]`.
pub type LSTMState<B> = (Tensor<B, 2>, Tensor<B, 2>);

/// Single-timestep LSTM cell
///
/// Gate layout of the fused projection `z = W_x @ x + b + W_h @ h`, split in
/// four equal chunks:
/// - g = tanh(z_0)             observed activation
/// - i = sigmoid(z_1)          input gate
/// - f = sigmoid(z_2 + 1)      forget gate
/// - o = sigmoid(z_3)          output gate
/// - c' = f * c + i * g
/// - h' = o * tanh(c')
#[derive(Module, Debug)]
pub struct LSTMCell<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    observed_map: Linear<B>,
    recurrent_map: Linear<B>,
}

impl<B: Backend> LSTMCell<B> {
    /// Create a new LSTM cell
    ///
    /// # Arguments
    /// * `input_size` - Width of the observed features
    /// * `hidden_size` - Width of the hidden and cell states
    /// * `device` - Device to create the module on
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let observed_map = LinearConfig::new(input_size, 4 * hidden_size)
            .with_bias(true)
            .init(device);

        let recurrent_map = LinearConfig::new(hidden_size, 4 * hidden_size)
            .with_bias(false)
            .init(device);

        Self {
            input_size,
            hidden_size,
            observed_map,
            recurrent_map,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Zero hidden and cell states for a batch
    pub fn initial_state(&self, batch_size: usize, device: &B::Device) -> LSTMState<B> {
        (
            Tensor::zeros([batch_size, self.hidden_size], device),
            Tensor::zeros([batch_size, self.hidden_size], device),
        )
    }

    /// Advance the cell by one timestep
    ///
    /// # Arguments
    /// * `input` - Observed features of shape `[batch_size, input_size]`
    /// * `state` - Previous `(hidden, cell)` state
    ///
    /// # Returns
    /// The next `(hidden, cell)` state
    pub fn forward(&self, input: Tensor<B, 2>, state: LSTMState<B>) -> LSTMState<B> {
        let (hidden, cell) = state;

        let z = self.observed_map.forward(input) + self.recurrent_map.forward(hidden);
        let gates = z.chunk(4, 1);

        let observed = gates[0].clone().tanh();
        let input_gate = activation::sigmoid(gates[1].clone());
        let forget_gate = activation::sigmoid(gates[2].clone() + 1.0);
        let output_gate = activation::sigmoid(gates[3].clone());

        let next_cell = cell * forget_gate + observed * input_gate;
        let next_hidden = next_cell.clone().tanh() * output_gate;

        (next_hidden, next_cell)
    }
}
