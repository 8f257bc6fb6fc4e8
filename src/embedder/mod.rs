//! Text embedding backends used to vectorize test case fields.

use anyhow::Result;

pub mod openai;
pub mod qdrant;

pub use openai::OpenAiEmbedder;
pub use qdrant::QdrantEmbedder;

/// Trait implemented by services that turn strings into vectors.
pub trait TextEmbedder {
    /// Embeds `inputs` in one request, returning one vector per input in order.
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>>;
}

impl<T: TextEmbedder + ?Sized> TextEmbedder for Box<T> {
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(inputs)
    }
}
