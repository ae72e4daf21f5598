use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifies the vector space a chunk was embedded into. Chunks and queries
/// are only comparable when both fields match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EmbeddingSpec {
    pub model: String,
    pub dimensions: usize,
}

impl std::fmt::Display for EmbeddingSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}d", self.model, self.dimensions)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub source: String,
    pub chunk_index: u32,
    pub title: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub embedding_model: String,
}

impl KnowledgeChunk {
    pub fn spec(&self) -> EmbeddingSpec {
        EmbeddingSpec {
            model: self.embedding_model.clone(),
            dimensions: self.embedding.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: KnowledgeChunk,
    pub similarity: f32,
}

/// Reference text handed to the model. Always untrusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RetrievedDocument {
    pub title: String,
    pub source: String,
    pub content: String,
    pub similarity_score: f32,
}

impl From<SearchHit> for RetrievedDocument {
    fn from(hit: SearchHit) -> Self {
        Self {
            title: hit.chunk.title,
            source: hit.chunk.source,
            content: hit.chunk.content,
            similarity_score: hit.similarity,
        }
    }
}
