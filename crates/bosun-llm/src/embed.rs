use crate::http::join_url;
use async_trait::async_trait;
use bosun_core::embed::Embedder;
use bosun_core::error::EmbedError;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Embeds text through Ollama. Tries the batch `/api/embed` endpoint first and
/// falls back to the older `/api/embeddings` one.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct LegacyEmbedResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| EmbedError::Unavailable {
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    fn transport(&self, err: &reqwest::Error) -> EmbedError {
        if err.is_timeout() {
            EmbedError::Timeout {
                after: self.timeout,
            }
        } else {
            EmbedError::Unavailable {
                message: err.to_string(),
            }
        }
    }

    async fn embed_batch(&self, text: &str) -> Result<Option<Vec<f32>>, EmbedError> {
        let response = self
            .client
            .post(join_url(&self.base_url, "/api/embed"))
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|err| self.transport(&err))?;
        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "batch embed endpoint refused request");
            return Ok(None);
        }
        let Ok(body) = response.json::<EmbedResponse>().await else {
            return Ok(None);
        };
        Ok(body.embeddings.into_iter().next().filter(|vector| !vector.is_empty()))
    }

    async fn embed_legacy(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let response = self
            .client
            .post(join_url(&self.base_url, "/api/embeddings"))
            .json(&json!({ "model": self.model, "prompt": text }))
            .send()
            .await
            .map_err(|err| self.transport(&err))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Unavailable {
                message: format!("HTTP {}: {}", status.as_u16(), body.trim()),
            });
        }
        let body: LegacyEmbedResponse =
            response.json().await.map_err(|err| EmbedError::InvalidResponse {
                message: err.to_string(),
            })?;
        if body.embedding.is_empty() {
            return Err(EmbedError::InvalidResponse {
                message: "server returned no embedding vector".to_string(),
            });
        }
        Ok(body.embedding)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if let Some(vector) = self.embed_batch(text).await? {
            return Ok(vector);
        }
        self.embed_legacy(text).await
    }
}
