//! Train Summarizer - Retrospective Learning on a Toy Document
//!
//! Builds one-hot token windows from a handful of sentences, trains
//! re-seq2seq on them and prints the sentences whose windows the model
//! reconstructs best.
//!
//! Run with `RUST_LOG=debug` to see per-epoch losses.

use burn::backend::{Autodiff, NdArray};
use ndarray::Array3;
use reseq2seq::prelude::*;
use tracing_subscriber::EnvFilter;

type Backend = Autodiff<NdArray<f32>>;

const SEQ_LEN: usize = 3;

/// One-hot vocabulary decoded by argmax
struct Vocabulary {
    words: Vec<String>,
}

impl Vocabulary {
    fn from_sentences(sentences: &[String]) -> Self {
        let mut words: Vec<String> = Vec::new();
        for word in sentences.iter().flat_map(|s| s.split_whitespace()) {
            if !words.iter().any(|w| w == word) {
                words.push(word.to_string());
            }
        }
        Self { words }
    }

    fn len(&self) -> usize {
        self.words.len()
    }

    /// Every `SEQ_LEN`-token window of every sentence, `[windows, SEQ_LEN, vocabulary]`
    fn windows(&self, sentences: &[String]) -> Array3<f32> {
        let windows: Vec<Vec<Vec<f32>>> = sentences
            .iter()
            .flat_map(|sentence| {
                let tokens: Vec<String> = sentence.split_whitespace().map(str::to_string).collect();
                tokens
                    .windows(SEQ_LEN)
                    .map(|window| self.vectorize(window))
                    .collect::<Vec<_>>()
            })
            .collect();

        Array3::from_shape_fn((windows.len(), SEQ_LEN, self.len()), |(i, j, k)| {
            windows[i][j][k]
        })
    }
}

impl VectorizableToken for Vocabulary {
    fn vectorize(&self, tokens: &[String]) -> Vec<Vec<f32>> {
        tokens
            .iter()
            .map(|token| {
                self.words
                    .iter()
                    .map(|w| if w == token { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect()
    }

    fn tokenize(&self, vectors: &[Vec<f32>]) -> Vec<String> {
        vectors
            .iter()
            .filter_map(|vector| {
                vector
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| self.words[i].clone())
            })
            .collect()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== re-seq2seq Summarization Example ===\n");

    let sentences: Vec<String> = [
        "the encoder reads the original sequence",
        "the decoder writes a short summary",
        "a retrospective encoder reads the summary again",
        "good summaries keep the meaning of the original",
        "the weather was pleasant all week",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let vocabulary = Vocabulary::from_sentences(&sentences);
    let windows = vocabulary.windows(&sentences);
    println!("  Vocabulary size: {}", vocabulary.len());
    println!("  Token windows:   {:?}", windows.dim());
    println!();

    let device = Default::default();
    let config = ReSeq2SeqConfig::new()
        .with_input_neuron_count(vocabulary.len())
        .with_hidden_neuron_count(16)
        .with_seq_len(SEQ_LEN)
        .with_batch_size(8)
        .with_dropout_rate(0.1)
        .with_learning_rate(1e-3)
        .with_learning_attenuate_rate(0.9)
        .with_attenuate_epoch(20);

    let mut source =
        SequentialBatchIterator::for_config(windows.clone(), windows.clone(), &config, 100)?
            .with_seed(2024);
    let mut re_seq2seq = ReSeq2Seq::<Backend>::new(config, &device)?;

    println!("Training for {} epochs...", source.epochs());
    re_seq2seq.learn(&mut source, &device)?;

    if let Some(last) = re_seq2seq.logs().last() {
        println!("  Final training loss: {:.5}", last.train);
        println!("  Final test loss:     {:.5}", last.test);
    }
    println!();

    let summary = re_seq2seq
        .valid()
        .summarize(&windows, &vocabulary, &sentences, 2, &device)?;

    println!("Summary:");
    for sentence in summary {
        println!("  - {}", sentence);
    }

    Ok(())
}
