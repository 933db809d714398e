//! Retrospective loss.
//!
//! Three distance terms are combined per sample:
//!
//! - **summary**: how far the decoded summary is from the encoder feature
//!   points, centred on the mean observed feature of each step.
//! - **match**: distance between the last-step embedding of the original and
//!   the last-step retrospective embedding of its summary.
//! - **mismatch**: the match distance minus hinge distances to negatives,
//!   which are embeddings of other samples or of earlier steps.
//!
//! ```text
//! R     = λ·M + η·((M − Oe) + (M − Or))
//! delta = S + R                       (R broadcast over timesteps)
//! loss  = mean(delta)                 (over every axis but the batch)
//! ```
//!
//! If the norm of `delta` exceeds the clipping threshold, `delta` is rescaled
//! to the threshold before the mean. When `S` and `R` differ in width they
//! are kept apart, and the norm counts `R` once per timestep.

use std::cmp::Ordering;

use burn::config::Config;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor, TensorData};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::Inference;

/// Where mismatched embeddings are drawn from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MismatchSource {
    /// Last-step embeddings of the other samples in the batch.
    #[default]
    Batch,
    /// A sample's own embeddings at every step but the last.
    Timesteps,
}

/// Configuration for [`RetrospectiveLoss`]
#[derive(Config, Debug)]
pub struct RetrospectiveLossConfig {
    #[config(default = 0.01)]
    pub margin_param: f32,
    #[config(default = 0.5)]
    pub retrospective_lambda: f32,
    #[config(default = 0.5)]
    pub retrospective_eta: f32,
    #[config(default = 1e10)]
    pub grad_clip_threshold: f32,
    #[config(default = "MismatchSource::Batch")]
    pub mismatch_source: MismatchSource,
    #[config(default = 42)]
    pub seed: u64,
}

impl RetrospectiveLossConfig {
    pub fn init(&self) -> RetrospectiveLoss {
        RetrospectiveLoss {
            margin_param: self.margin_param,
            retrospective_lambda: self.retrospective_lambda,
            retrospective_eta: self.retrospective_eta,
            grad_clip_threshold: self.grad_clip_threshold,
            mismatch_source: self.mismatch_source,
            rng: StdRng::seed_from_u64(self.seed),
        }
    }
}

/// The individual terms before clipping and reduction
#[derive(Debug, Clone)]
pub struct RetrospectiveTerms<B: Backend> {
    /// `[batch, seq, d]` where `d = min(input, hidden)`
    pub summary: Tensor<B, 3>,
    /// `[batch, hidden]`
    pub matched: Tensor<B, 2>,
    /// `[batch, hidden]`
    pub mismatched: Tensor<B, 2>,
}

/// Retrospective loss over one [`Inference`]
#[derive(Debug, Clone)]
pub struct RetrospectiveLoss {
    margin_param: f32,
    retrospective_lambda: f32,
    retrospective_eta: f32,
    grad_clip_threshold: f32,
    mismatch_source: MismatchSource,
    rng: StdRng,
}

impl Default for RetrospectiveLoss {
    fn default() -> Self {
        RetrospectiveLossConfig::new().init()
    }
}

impl RetrospectiveLoss {
    pub fn margin_param(&self) -> f32 {
        self.margin_param
    }

    pub fn mismatch_source(&self) -> MismatchSource {
        self.mismatch_source
    }

    /// Per-sample loss, shape `[batch]`
    pub fn forward<B: Backend>(&mut self, inference: &Inference<B>) -> crate::Result<Tensor<B, 1>> {
        let batch_size = inference.batch_size();
        let seq_len = inference.seq_len();

        let terms = self.terms(inference)?;
        let retrospective = terms.matched * self.retrospective_lambda
            + terms.mismatched * self.retrospective_eta;

        if terms.summary.dims()[2] == retrospective.dims()[1] {
            let delta = self.clip(terms.summary + retrospective.unsqueeze_dim::<3>(1));
            return Ok(delta.mean_dim(2).mean_dim(1).reshape([batch_size]));
        }

        let (summary, retrospective) = self.clip_split(terms.summary, retrospective, seq_len);
        let summary = summary.mean_dim(2).mean_dim(1).reshape([batch_size]);
        let retrospective = retrospective.mean_dim(1).reshape([batch_size]);

        Ok(summary + retrospective)
    }

    /// Compute the summary, match and mismatch terms
    pub fn terms<B: Backend>(&mut self, inference: &Inference<B>) -> crate::Result<RetrospectiveTerms<B>> {
        let [batch_size, seq_len, input_dim] = inference.observed.dims();
        if batch_size == 0 || seq_len == 0 {
            return Err(Error::EmptyBatch);
        }
        let hidden_dim = inference.encoded.dims()[2];
        check_dims("encoded", inference.encoded.dims(), [batch_size, seq_len, hidden_dim])?;
        check_dims("decoded", inference.decoded.dims(), [batch_size, seq_len, input_dim])?;
        check_dims("re_encoded", inference.re_encoded.dims(), [batch_size, seq_len, hidden_dim])?;

        let summary = self.summary_delta(inference, input_dim, hidden_dim);

        let encoded_last = last_step(inference.encoded.clone());
        let re_encoded_last = last_step(inference.re_encoded.clone());
        let matched = (encoded_last.clone() - re_encoded_last.clone()).abs();

        let (other_encoded, other_re_encoded) = match self.mismatch_source {
            MismatchSource::Batch => self.batch_negatives(encoded_last, re_encoded_last),
            MismatchSource::Timesteps => {
                self.timestep_negatives(inference, encoded_last, re_encoded_last)
            }
        };
        let mismatched = (matched.clone() - other_encoded) + (matched.clone() - other_re_encoded);

        Ok(RetrospectiveTerms {
            summary,
            matched,
            mismatched,
        })
    }

    fn summary_delta<B: Backend>(
        &mut self,
        inference: &Inference<B>,
        input_dim: usize,
        hidden_dim: usize,
    ) -> Tensor<B, 3> {
        let observed = inference.observed.clone();
        let encoded = inference.encoded.clone();
        let decoded = inference.decoded.clone();
        let device = observed.device();

        match input_dim.cmp(&hidden_dim) {
            Ordering::Equal => (decoded - (encoded - observed.mean_dim(2))).abs(),
            Ordering::Greater => {
                let dims = self.choose_dims::<B>(input_dim, hidden_dim, &device);
                let target = encoded - observed.select(2, dims.clone()).mean_dim(2);
                (decoded.select(2, dims) - target).abs()
            }
            Ordering::Less => {
                let dims = self.choose_dims::<B>(hidden_dim, input_dim, &device);
                let target = encoded.select(2, dims) - observed.mean_dim(2);
                (decoded - target).abs()
            }
        }
    }

    /// `count` distinct indices out of `0..from`, uniformly at random
    fn choose_dims<B: Backend>(
        &mut self,
        from: usize,
        count: usize,
        device: &B::Device,
    ) -> Tensor<B, 1, Int> {
        let mut dims: Vec<i64> = (0..from as i64).collect();
        dims.shuffle(&mut self.rng);
        dims.truncate(count);
        Tensor::from_data(TensorData::new(dims, [count]), device)
    }

    fn batch_negatives<B: Backend>(
        &self,
        encoded_last: Tensor<B, 2>,
        re_encoded_last: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch_size, hidden_dim] = encoded_last.dims();
        let device = encoded_last.device();
        if batch_size < 2 {
            return (
                Tensor::zeros([batch_size, hidden_dim], &device),
                Tensor::zeros([batch_size, hidden_dim], &device),
            );
        }
        let shape = [batch_size, batch_size, hidden_dim];

        // [anchor, negative, hidden]
        let anchors_re = re_encoded_last.clone().unsqueeze_dim::<3>(1).expand(shape);
        let negatives_enc = encoded_last.clone().unsqueeze_dim::<3>(0).expand(shape);
        let anchors_enc = encoded_last.unsqueeze_dim::<3>(1).expand(shape);
        let negatives_re = re_encoded_last.unsqueeze_dim::<3>(0).expand(shape);

        let others = off_diagonal_mask::<B>(batch_size, &device).expand(shape);

        let other_encoded = self.hinge(negatives_enc - anchors_re) * others.clone();
        let other_re_encoded = self.hinge(anchors_enc - negatives_re) * others;

        (
            other_encoded.sum_dim(1).reshape([batch_size, hidden_dim]),
            other_re_encoded.sum_dim(1).reshape([batch_size, hidden_dim]),
        )
    }

    fn timestep_negatives<B: Backend>(
        &self,
        inference: &Inference<B>,
        encoded_last: Tensor<B, 2>,
        re_encoded_last: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch_size, seq_len, hidden_dim] = inference.encoded.dims();
        let device = encoded_last.device();
        if seq_len < 2 {
            return (
                Tensor::zeros([batch_size, hidden_dim], &device),
                Tensor::zeros([batch_size, hidden_dim], &device),
            );
        }

        let encoded_before = inference.encoded.clone().narrow(1, 0, seq_len - 1);
        let re_encoded_before = inference.re_encoded.clone().narrow(1, 0, seq_len - 1);

        let other_encoded =
            self.hinge(encoded_before - re_encoded_last.unsqueeze_dim::<3>(1));
        let other_re_encoded =
            self.hinge(encoded_last.unsqueeze_dim::<3>(1) - re_encoded_before);

        (
            other_encoded.sum_dim(1).reshape([batch_size, hidden_dim]),
            other_re_encoded.sum_dim(1).reshape([batch_size, hidden_dim]),
        )
    }

    /// `max(0, x) + margin`
    fn hinge<B: Backend>(&self, distance: Tensor<B, 3>) -> Tensor<B, 3> {
        distance.clamp_min(0.0) + self.margin_param
    }

    /// Rescale `delta` to the threshold when its norm exceeds it.
    fn clip<B: Backend, const D: usize>(&self, delta: Tensor<B, D>) -> Tensor<B, D> {
        match self.clip_scale(delta.clone().powf_scalar(2.0).sum()) {
            Some(scale) => delta * scale.unsqueeze::<D>(),
            None => delta,
        }
    }

    /// Used when `S` and `R` differ in width and cannot be added.
    fn clip_split<B: Backend>(
        &self,
        summary: Tensor<B, 3>,
        retrospective: Tensor<B, 2>,
        seq_len: usize,
    ) -> (Tensor<B, 3>, Tensor<B, 2>) {
        // R counts once per timestep
        let squared = summary.clone().powf_scalar(2.0).sum()
            + retrospective.clone().powf_scalar(2.0).sum() * seq_len as f32;

        match self.clip_scale(squared) {
            Some(scale) => (
                summary * scale.clone().unsqueeze::<3>(),
                retrospective * scale.unsqueeze::<2>(),
            ),
            None => (summary, retrospective),
        }
    }

    /// `threshold / norm`, if the norm is over the threshold
    fn clip_scale<B: Backend>(&self, squared: Tensor<B, 1>) -> Option<Tensor<B, 1>> {
        let norm = squared.sqrt();
        let norm_value: f32 = norm.clone().into_scalar().elem();
        (norm_value > self.grad_clip_threshold).then(|| norm.recip() * self.grad_clip_threshold)
    }
}

fn last_step<B: Backend>(sequence: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch_size, seq_len, features] = sequence.dims();
    sequence
        .narrow(1, seq_len - 1, 1)
        .reshape([batch_size, features])
}

/// `[batch, batch, 1]` with zeros on the diagonal
fn off_diagonal_mask<B: Backend>(batch_size: usize, device: &B::Device) -> Tensor<B, 3> {
    let values: Vec<f32> = (0..batch_size * batch_size)
        .map(|i| if i / batch_size == i % batch_size { 0.0 } else { 1.0 })
        .collect();
    Tensor::from_data(TensorData::new(values, [batch_size, batch_size, 1]), device)
}

fn check_dims(name: &str, actual: [usize; 3], expected: [usize; 3]) -> crate::Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            expected: format!("{name} {expected:?}"),
            actual: format!("{name} {actual:?}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn inference_from(
        observed: Tensor<TestBackend, 3>,
        encoded: Tensor<TestBackend, 3>,
        decoded: Tensor<TestBackend, 3>,
        re_encoded: Tensor<TestBackend, 3>,
    ) -> Inference<TestBackend> {
        Inference {
            observed,
            encoded,
            decoded,
            re_encoded,
        }
    }

    #[test]
    fn test_off_diagonal_mask() {
        let device = Default::default();
        let mask = off_diagonal_mask::<TestBackend>(3, &device);

        assert_eq!(mask.dims(), [3, 3, 1]);
        let total: f32 = mask.clone().sum().into_scalar();
        assert_eq!(total, 6.0);
        let diagonal: f32 = mask.slice([1..2, 1..2, 0..1]).into_scalar();
        assert_eq!(diagonal, 0.0);
    }

    #[test]
    fn test_choose_dims_are_distinct() {
        let device = Default::default();
        let mut loss = RetrospectiveLoss::default();

        let dims = loss.choose_dims::<TestBackend>(10, 4, &device);
        let mut values = dims.into_data().to_vec::<i64>().unwrap();
        values.sort_unstable();
        values.dedup();

        assert_eq!(values.len(), 4);
        assert!(values.iter().all(|&d| (0..10).contains(&d)));
    }

    #[test]
    fn test_rejects_mismatched_shapes() {
        let device = Default::default();
        let mut loss = RetrospectiveLoss::default();

        let inference = inference_from(
            Tensor::zeros([2, 3, 4], &device),
            Tensor::zeros([2, 3, 5], &device),
            Tensor::zeros([2, 3, 4], &device),
            Tensor::zeros([2, 3, 6], &device),
        );

        assert!(matches!(
            loss.forward(&inference),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_clip_rescales_to_threshold() {
        let device = Default::default();
        let loss = RetrospectiveLossConfig::new()
            .with_grad_clip_threshold(1.0)
            .init();

        // norm 5 -> [0.6, 0.8]
        let delta = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![3.0f32, 4.0], [1, 1, 2]),
            &device,
        );
        let values = loss.clip(delta).into_data().to_vec::<f32>().unwrap();

        assert!((values[0] - 0.6).abs() < 1e-6);
        assert!((values[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_clip_split_counts_retrospective_per_step() {
        let device = Default::default();
        let loss = RetrospectiveLossConfig::new()
            .with_grad_clip_threshold(1.0)
            .init();

        let summary = Tensor::<TestBackend, 3>::ones([1, 2, 2], &device) * 3.0;
        let retrospective = Tensor::<TestBackend, 2>::ones([1, 2], &device) * 4.0;
        let (summary, retrospective) = loss.clip_split(summary, retrospective, 2);

        let squared: f32 = summary.powf_scalar(2.0).sum().into_scalar()
            + 2.0 * retrospective.powf_scalar(2.0).sum().into_scalar();
        assert!((squared.sqrt() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_clip_keeps_short_delta() {
        let device = Default::default();
        let loss = RetrospectiveLoss::default();

        let delta = Tensor::<TestBackend, 3>::ones([1, 2, 2], &device);
        let total: f32 = loss.clip(delta).sum().into_scalar();
        assert_eq!(total, 4.0);
    }
}
