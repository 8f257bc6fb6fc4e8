//! Multi-vector embeddings attached to every test case document.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::embedder::TextEmbedder;

/// Four vectors per test case. Each may be empty when its input was blank or the
/// embedding call failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSet {
    /// Embedding of the description.
    pub description: Vec<f32>,
    /// Embedding of the formatted steps.
    pub steps: Vec<f32>,
    /// Embedding of the enrichment summary.
    pub summary: Vec<f32>,
    /// Composite vector used as the primary search representation.
    pub main: Vec<f32>,
}

impl EmbeddingSet {
    /// Iterates the four vectors in storage order.
    pub fn vectors(&self) -> [&[f32]; 4] {
        [
            self.description.as_slice(),
            self.steps.as_slice(),
            self.summary.as_slice(),
            self.main.as_slice(),
        ]
    }
}

/// Trait implemented by multi-vector embedding services.
pub trait EmbeddingClient {
    /// Produces the four vectors for one test case.
    fn embed(&self, description: &str, steps: &str, summary: &str) -> Result<EmbeddingSet>;
}

impl<T: EmbeddingClient + ?Sized> EmbeddingClient for Box<T> {
    fn embed(&self, description: &str, steps: &str, summary: &str) -> Result<EmbeddingSet> {
        (**self).embed(description, steps, summary)
    }
}

/// Backend that never embeds; used when embeddings are switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmbeddings;

impl EmbeddingClient for NoEmbeddings {
    fn embed(&self, _: &str, _: &str, _: &str) -> Result<EmbeddingSet> {
        Ok(EmbeddingSet::default())
    }
}

/// Embeds description, steps and summary in one batch and derives the main vector.
pub struct MultiVectorEmbedder<E> {
    embedder: E,
}

impl<E: TextEmbedder> MultiVectorEmbedder<E> {
    /// Wraps a single-text embedding backend.
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }
}

impl<E: TextEmbedder> EmbeddingClient for MultiVectorEmbedder<E> {
    fn embed(&self, description: &str, steps: &str, summary: &str) -> Result<EmbeddingSet> {
        let texts = [description.trim(), steps.trim(), summary.trim()];
        // blank fields are not sent; their slot stays empty
        let inputs: Vec<&str> = texts.iter().copied().filter(|t| !t.is_empty()).collect();
        let mut embedded = self.embedder.embed_batch(&inputs)?.into_iter();
        anyhow::ensure!(
            embedded.len() == inputs.len(),
            "embedding count {} mismatched inputs {}",
            embedded.len(),
            inputs.len()
        );
        let mut slots: [Vec<f32>; 3] = Default::default();
        for (slot, text) in slots.iter_mut().zip(texts) {
            if !text.is_empty() {
                *slot = embedded.next().unwrap_or_default();
            }
        }
        let [description, steps, summary] = slots;
        let main = composite_vector(&[
            description.as_slice(),
            steps.as_slice(),
            summary.as_slice(),
        ]);
        Ok(EmbeddingSet {
            description,
            steps,
            summary,
            main,
        })
    }
}

/// L2-normalized element-wise mean of the non-empty parts.
///
/// Parts whose dimension differs from the first non-empty part are ignored.
/// Returns an empty vector when there is nothing to combine or the mean is zero.
pub fn composite_vector(parts: &[&[f32]]) -> Vec<f32> {
    let mut usable = parts.iter().filter(|part| !part.is_empty());
    let Some(first) = usable.next() else {
        return Vec::new();
    };
    let dims = first.len();
    let mut sum: Vec<f32> = first.to_vec();
    let mut count = 1usize;
    for part in usable.filter(|part| part.len() == dims) {
        for (acc, value) in sum.iter_mut().zip(part.iter()) {
            *acc += value;
        }
        count += 1;
    }
    for value in sum.iter_mut() {
        *value /= count as f32;
    }
    let norm = sum.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Vec::new();
    }
    sum.iter().map(|v| v / norm).collect()
}
