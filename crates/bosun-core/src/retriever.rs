use crate::BosunError;
use crate::config::RetrievalConfig;
use crate::embed::Embedder;
use crate::error::EmbedError;
use crate::knowledge::KnowledgeRepository;
use crate::store::{Store, StoreProvider, with_store};
use crate::types::{EmbeddingSpec, Event, RetrievedDocument};
use std::sync::Arc;
use tracing::{debug, warn};

/// Finds knowledge chunks relevant to an event.
pub struct ContextRetriever<P: StoreProvider> {
    provider: P,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl<P: StoreProvider> ContextRetriever<P> {
    pub fn new(provider: P, embedder: Arc<dyn Embedder>, config: RetrievalConfig) -> Self {
        Self {
            provider,
            embedder,
            config,
        }
    }

    pub fn query_for(event: &Event) -> String {
        format!("{} {}", event.event_type, event.sensor_name)
    }

    /// Degraded mode: any failure is logged and yields an empty document set.
    pub async fn retrieve_for(&self, event: &Event) -> Vec<RetrievedDocument> {
        let query = Self::query_for(event);
        match self
            .retrieve(&query, self.config.top_k, self.config.min_similarity)
            .await
        {
            Ok(documents) => documents,
            Err(err) => {
                warn!(error = %err, query = %query, "retrieval degraded, continuing without context");
                Vec::new()
            }
        }
    }

    /// At most `top_k` documents with similarity at or above `min_similarity`,
    /// best match first.
    pub async fn retrieve(
        &self,
        query_text: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<RetrievedDocument>, BosunError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let limit = self.config.timeout();
        let embedding = tokio::time::timeout(limit, self.embedder.embed(query_text))
            .await
            .map_err(|_| EmbedError::Timeout { after: limit })??;
        let spec = EmbeddingSpec {
            model: self.embedder.model().to_string(),
            dimensions: embedding.len(),
        };
        let hits = with_store(&self.provider, limit, move |store| {
            store
                .knowledge()
                .search(&embedding, &spec, top_k)
                .map_err(BosunError::from)
        })
        .await?;

        let documents: Vec<RetrievedDocument> = hits
            .into_iter()
            .filter(|hit| hit.similarity >= min_similarity)
            .take(top_k)
            .map(RetrievedDocument::from)
            .collect();
        debug!(query = %query_text, count = documents.len(), "retrieved context");
        Ok(documents)
    }
}
