//! Qdrant Cloud Inference backend.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::TextEmbedder;
use crate::http::{Auth, JsonEndpoint};

/// Embeds text through a cluster's `/inference/text` endpoint.
#[derive(Clone)]
pub struct QdrantEmbedder {
    endpoint: JsonEndpoint,
    model: String,
}

impl QdrantEmbedder {
    /// `endpoint` is the full inference URL, e.g.
    /// `https://cluster-id.cloud.qdrant.io/inference/text`; `model` is one the
    /// cluster serves.
    pub fn new(
        api_key: String,
        endpoint: String,
        model: String,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing Qdrant API key");
        anyhow::ensure!(
            endpoint.starts_with("http://") || endpoint.starts_with("https://"),
            "Qdrant endpoint must be an http(s) URL"
        );
        anyhow::ensure!(!model.trim().is_empty(), "missing Qdrant model name");
        let endpoint = JsonEndpoint::new(
            "Qdrant inference",
            endpoint.trim_end_matches('/').to_string(),
            Auth::ApiKeyHeader(&api_key),
            timeout,
        )?;
        Ok(Self { endpoint, model })
    }
}

impl TextEmbedder for QdrantEmbedder {
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let reply: InferenceReply = self.endpoint.post(&InferenceRequest {
            model: &self.model,
            input: inputs,
        })?;
        let vectors = reply.into_vectors();
        anyhow::ensure!(
            vectors.len() == inputs.len(),
            "Qdrant returned {} embeddings for {} inputs",
            vectors.len(),
            inputs.len()
        );
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

/// Clusters answer either with indexed `data` entries or a bare `embeddings` list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceReply {
    Indexed { data: Vec<InferenceEntry> },
    Flat { embeddings: Vec<Vec<f32>> },
}

#[derive(Debug, Deserialize)]
struct InferenceEntry {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl InferenceReply {
    fn into_vectors(self) -> Vec<Vec<f32>> {
        match self {
            Self::Indexed { mut data } => {
                // entries without an index sort last, in reply order
                data.sort_by_key(|entry| entry.index.unwrap_or(usize::MAX));
                data.into_iter().map(|entry| entry.embedding).collect()
            }
            Self::Flat { embeddings } => embeddings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_indexed_and_flat_replies() {
        let indexed: InferenceReply = serde_json::from_str(
            r#"{"data": [{"embedding": [2.0], "index": 1}, {"embedding": [1.0], "index": 0}]}"#,
        )
        .expect("indexed payload");
        assert_eq!(indexed.into_vectors(), vec![vec![1.0], vec![2.0]]);

        let flat: InferenceReply =
            serde_json::from_str(r#"{"embeddings": [[1.0, 2.0]]}"#).expect("flat payload");
        assert_eq!(flat.into_vectors(), vec![vec![1.0, 2.0]]);
    }

    #[test]
    fn rejects_reply_without_vectors() {
        assert!(serde_json::from_str::<InferenceReply>("{}").is_err());
    }

    #[test]
    fn requires_http_endpoint() {
        let result = QdrantEmbedder::new(
            "key".to_string(),
            "cluster.cloud.qdrant.io/inference/text".to_string(),
            "qdrant/all-MiniLM-L6-v2".to_string(),
            None,
        );
        assert!(result.is_err());
    }
}
