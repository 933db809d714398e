//! Extractive summarization with a trained re-seq2seq model.
//!
//! Sequences with the lowest retrospective loss carry the most of the
//! original's semantics. Their tokens are recovered through a
//! [`VectorizableToken`] and matched back to the source sentences.

use burn::tensor::backend::Backend;
use ndarray::{Array3, Axis};

use crate::data::tensor_from_array3;
use crate::error::{Error, Result};
use crate::train::ReSeq2Seq;

/// Mapping between tokens and the feature vectors the model observes
pub trait VectorizableToken {
    /// One vector per token
    fn vectorize(&self, tokens: &[String]) -> Vec<Vec<f32>>;

    /// One token per vector
    fn tokenize(&self, vectors: &[Vec<f32>]) -> Vec<String>;
}

impl<B: Backend> ReSeq2Seq<B> {
    /// Pick at most `limit` sentences whose token sequences score best.
    ///
    /// # Arguments
    /// * `test_arr` - `[samples, seq_len, input_neuron_count]` token vectors
    /// * `vectorizable_token` - Turns each sample back into tokens
    /// * `sentences` - Candidate sentences, in document order
    /// * `limit` - Maximum number of sentences returned
    ///
    /// # Returns
    /// Distinct sentences in the order they were first matched
    pub fn summarize<V>(
        &mut self,
        test_arr: &Array3<f32>,
        vectorizable_token: &V,
        sentences: &[String],
        limit: usize,
        device: &B::Device,
    ) -> Result<Vec<String>>
    where
        V: VectorizableToken + ?Sized,
    {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let observed = tensor_from_array3::<B>(test_arr, device);
        let losses = self
            .evaluate(observed)?
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|err| Error::Data(format!("{err:?}")))?;

        let mut ranking: Vec<usize> = (0..losses.len()).collect();
        ranking.sort_by(|&a, &b| losses[a].total_cmp(&losses[b]));

        let mut abstracts: Vec<String> = Vec::new();
        for &key in ranking.iter().take(limit) {
            let sequence: Vec<Vec<f32>> = test_arr
                .index_axis(Axis(0), key)
                .outer_iter()
                .map(|step| step.to_vec())
                .collect();
            let tokens = vectorizable_token.tokenize(&sequence);

            let spaced = tokens.join(" ");
            let packed = tokens.concat();
            if packed.is_empty() {
                continue;
            }

            for sentence in sentences {
                let hit = sentence.contains(spaced.as_str()) || sentence.contains(packed.as_str());
                if hit && !abstracts.contains(sentence) {
                    abstracts.push(sentence.clone());
                }
            }

            tracing::trace!(
                sample = key,
                loss = losses[key],
                matched = abstracts.len(),
                "Scored sample"
            );

            if abstracts.len() >= limit {
                break;
            }
        }

        abstracts.truncate(limit);
        Ok(abstracts)
    }
}
