use crate::error::EmbedError;
use async_trait::async_trait;

/// Maps text into the vector space the knowledge store was built with.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier stored alongside every ingested chunk.
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}
