//! Hyperparameters for the retrospective sequence-to-sequence model.

use std::path::Path;

use burn::config::Config;

use crate::error::Error;
use crate::loss::MismatchSource;

/// Tolerance used when checking that the two tradeoff parameters sum to one.
const TRADEOFF_TOLERANCE: f64 = 1e-6;

/// Configuration for [`ReSeq2Seq`](crate::train::ReSeq2Seq)
///
/// Every field has a default, so `ReSeq2SeqConfig::new()` yields a usable
/// configuration that can be refined with the generated `with_*` builders:
///
/// ```rust
/// use reseq2seq::config::ReSeq2SeqConfig;
///
/// let config = ReSeq2SeqConfig::new()
///     .with_input_neuron_count(12)
///     .with_hidden_neuron_count(16)
///     .with_retrospective_lambda(0.3)
///     .with_retrospective_eta(0.7);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Config, Debug)]
pub struct ReSeq2SeqConfig {
    /// Margin added to every mismatched pair penalty.
    #[config(default = 0.01)]
    pub margin_param: f32,
    /// Weight of the match term.
    #[config(default = 0.5)]
    pub retrospective_lambda: f32,
    /// Weight of the mismatch term.
    #[config(default = 0.5)]
    pub retrospective_eta: f32,
    /// Width of the observed feature vectors.
    #[config(default = 20)]
    pub input_neuron_count: usize,
    /// Width of the encoder, decoder and retrospective encoder hidden states.
    #[config(default = 20)]
    pub hidden_neuron_count: usize,
    #[config(default = 0.5)]
    pub dropout_rate: f64,
    #[config(default = 20)]
    pub batch_size: usize,
    #[config(default = 1e-5)]
    pub learning_rate: f64,
    /// Factor applied to the learning rate every `attenuate_epoch` epochs.
    #[config(default = 1.0)]
    pub learning_attenuate_rate: f64,
    #[config(default = 50)]
    pub attenuate_epoch: usize,
    /// Norm threshold for both delta clipping in the loss and gradient clipping
    /// in the optimizers.
    #[config(default = 1e10)]
    pub grad_clip_threshold: f32,
    #[config(default = 8)]
    pub seq_len: usize,
    #[config(default = "MismatchSource::Batch")]
    pub mismatch_source: MismatchSource,
    /// Seed for dimension sub-sampling in the loss.
    #[config(default = 42)]
    pub seed: u64,
}

impl ReSeq2SeqConfig {
    /// Check every hyperparameter and report the first violation.
    pub fn validate(&self) -> crate::Result<()> {
        if !(self.margin_param > 0.0) {
            return Err(invalid("`margin_param` must be more than 0"));
        }
        if self.retrospective_lambda < 0.0 || self.retrospective_eta < 0.0 {
            return Err(invalid(
                "`retrospective_lambda` and `retrospective_eta` must be 0 or more",
            ));
        }
        let tradeoff = self.retrospective_lambda as f64 + self.retrospective_eta as f64;
        if (tradeoff - 1.0).abs() > TRADEOFF_TOLERANCE {
            return Err(invalid(
                "the sum of `retrospective_lambda` and `retrospective_eta` must be 1",
            ));
        }
        if self.input_neuron_count == 0 || self.hidden_neuron_count == 0 {
            return Err(invalid("neuron counts must be more than 0"));
        }
        if self.batch_size == 0 {
            return Err(invalid("`batch_size` must be more than 0"));
        }
        if self.seq_len == 0 {
            return Err(invalid("`seq_len` must be more than 0"));
        }
        if self.attenuate_epoch == 0 {
            return Err(invalid("`attenuate_epoch` must be more than 0"));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(invalid("`dropout_rate` must be in [0, 1)"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("`learning_rate` must be a positive finite number"));
        }
        if !(self.learning_attenuate_rate > 0.0) {
            return Err(invalid("`learning_attenuate_rate` must be more than 0"));
        }
        if !(self.grad_clip_threshold > 0.0) {
            return Err(invalid("`grad_clip_threshold` must be more than 0"));
        }
        Ok(())
    }

    /// Write the configuration as JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        self.save(path)?;
        Ok(())
    }

    /// Read a JSON configuration and validate it.
    pub fn load_json<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let config = Self::load(path).map_err(|err| invalid(&format!("{err:?}")))?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidConfig(message.to_string())
}
