use crate::error::KnowledgeError;
use crate::types::{EmbeddingSpec, KnowledgeChunk, SearchHit};

/// The Knowledge Store. Chunks are keyed by `(source, chunk_index)` and every
/// chunk in the store shares one [`EmbeddingSpec`].
pub trait KnowledgeRepository {
    fn upsert(&self, chunk: &KnowledgeChunk) -> Result<(), KnowledgeError>;
    /// Deletes chunks of `source` with `chunk_index >= keep`.
    fn prune_source(&self, source: &str, keep: u32) -> Result<usize, KnowledgeError>;
    fn count(&self) -> Result<usize, KnowledgeError>;
    fn clear(&self) -> Result<usize, KnowledgeError>;
    fn embedding_spec(&self) -> Result<Option<EmbeddingSpec>, KnowledgeError>;
    /// Highest cosine similarity first, at most `top_k` hits.
    fn search(
        &self,
        query: &[f32],
        spec: &EmbeddingSpec,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, KnowledgeError>;
}
