//! `/embeddings` backend for OpenAI-compatible APIs.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::TextEmbedder;
use crate::http::{join_url, Auth, JsonEndpoint};

/// Embeds all inputs of a batch with one `/embeddings` request.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    endpoint: JsonEndpoint,
    model: String,
    dimensions: Option<usize>,
}

impl OpenAiEmbedder {
    /// `dimensions` asks the model for shortened vectors; `timeout` of `None` waits
    /// indefinitely.
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        dimensions: Option<usize>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing OpenAI embedding model name");
        let endpoint = JsonEndpoint::new(
            "OpenAI embeddings",
            join_url(&base_url, "embeddings"),
            Auth::Bearer(&api_key),
            timeout,
        )?;
        Ok(Self {
            endpoint,
            model,
            dimensions,
        })
    }
}

impl TextEmbedder for OpenAiEmbedder {
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let reply: EmbeddingReply = self.endpoint.post(&EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        })?;
        reply.in_input_order(inputs.len())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingReply {
    data: Vec<IndexedVector>,
}

#[derive(Debug, Deserialize)]
struct IndexedVector {
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingReply {
    // the API may return entries out of order; `index` points back at the input
    fn in_input_order(self, inputs: usize) -> Result<Vec<Vec<f32>>> {
        anyhow::ensure!(
            self.data.len() == inputs,
            "OpenAI returned {} embeddings for {} inputs",
            self.data.len(),
            inputs
        );
        let mut ordered: Vec<Option<Vec<f32>>> = vec![None; inputs];
        for entry in self.data {
            let slot = ordered
                .get_mut(entry.index)
                .ok_or_else(|| anyhow::anyhow!("embedding index {} out of range", entry.index))?;
            *slot = Some(entry.embedding);
        }
        ordered
            .into_iter()
            .enumerate()
            .map(|(idx, vector)| {
                vector.ok_or_else(|| anyhow::anyhow!("no embedding returned for input {idx}"))
            })
            .collect()
    }
}
