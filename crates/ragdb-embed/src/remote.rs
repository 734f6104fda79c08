//! OpenAI-compatible HTTP embedding backend.
//!
//! Posts `{model, input}` to `{base_url}/embeddings` and reads the standard
//! `{data: [{index, embedding}]}` response shape, which Ollama and LM Studio
//! also serve.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ragdb_core::traits::EmbeddingBackend;
use ragdb_core::types::EmbeddingVector;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEmbeddingConfig {
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    /// Expected vector dimensionality; responses of another size are
    /// rejected rather than stored.
    pub dimensions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

pub struct RemoteBackend {
    http: reqwest::Client,
    config: RemoteEmbeddingConfig,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteBackend {
    pub fn new(config: RemoteEmbeddingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl EmbeddingBackend for RemoteBackend {
    fn dim(&self) -> usize {
        self.config.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let body = EmbeddingsRequest {
            model: &self.config.model,
            input: texts,
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(count = texts.len(), model = %self.config.model, "embedding request");
        let response = request.send().await.context("embedding request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("embedding endpoint returned {status}: {detail}"));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .context("malformed embedding response")?;
        if parsed.data.len() != texts.len() {
            return Err(anyhow!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            ));
        }

        let mut items = parsed.data;
        items.sort_by_key(|item| item.index);
        let mut vectors = Vec::with_capacity(items.len());
        for item in items {
            if item.embedding.len() != self.config.dimensions {
                return Err(anyhow!(
                    "embedding dimension {} does not match configured {}",
                    item.embedding.len(),
                    self.config.dimensions
                ));
            }
            vectors.push(item.embedding);
        }
        Ok(vectors)
    }
}
