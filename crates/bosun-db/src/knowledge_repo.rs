use crate::util::{bytes_to_f32_vec, cosine_similarity, f32_vec_to_bytes, to_rfc3339};
use bosun_core::error::KnowledgeError;
use bosun_core::knowledge::KnowledgeRepository;
use bosun_core::types::{EmbeddingSpec, KnowledgeChunk, SearchHit};
use rusqlite::{Connection, OptionalExtension};

pub struct KnowledgeRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> KnowledgeRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Rejects a spec that differs from what the store already holds.
    fn check_spec(&self, given: &EmbeddingSpec) -> Result<(), KnowledgeError> {
        match self.embedding_spec()? {
            Some(stored) if stored != *given => Err(KnowledgeError::EmbeddingMismatch {
                stored: stored.to_string(),
                given: given.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl<'a> KnowledgeRepository for KnowledgeRepo<'a> {
    fn upsert(&self, chunk: &KnowledgeChunk) -> Result<(), KnowledgeError> {
        if chunk.embedding.is_empty() {
            return Err(KnowledgeError::InvalidInput {
                message: format!("chunk {}#{} has an empty embedding", chunk.source, chunk.chunk_index),
            });
        }
        let spec = chunk.spec();
        self.check_spec(&spec)?;
        let dimensions = i64::try_from(spec.dimensions).map_err(invalid)?;
        self.conn
            .execute(
                "INSERT INTO knowledge_chunks (source, chunk_index, title, content, embedding, embedding_model, dimensions, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT(source, chunk_index) DO UPDATE SET \
                 title = excluded.title, content = excluded.content, embedding = excluded.embedding, \
                 embedding_model = excluded.embedding_model, dimensions = excluded.dimensions, \
                 created_at = excluded.created_at",
                (
                    chunk.source.as_str(),
                    chunk.chunk_index,
                    chunk.title.as_str(),
                    chunk.content.as_str(),
                    f32_vec_to_bytes(&chunk.embedding),
                    chunk.embedding_model.as_str(),
                    dimensions,
                    to_rfc3339(&chrono::Utc::now()),
                ),
            )
            .map_err(unavailable)?;
        Ok(())
    }

    fn prune_source(&self, source: &str, keep: u32) -> Result<usize, KnowledgeError> {
        self.conn
            .execute(
                "DELETE FROM knowledge_chunks WHERE source = ?1 AND chunk_index >= ?2",
                (source, keep),
            )
            .map_err(unavailable)
    }

    fn count(&self) -> Result<usize, KnowledgeError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM knowledge_chunks", [], |row| row.get(0))
            .map_err(unavailable)?;
        usize::try_from(count).map_err(unavailable)
    }

    fn clear(&self) -> Result<usize, KnowledgeError> {
        self.conn
            .execute("DELETE FROM knowledge_chunks", [])
            .map_err(unavailable)
    }

    fn embedding_spec(&self) -> Result<Option<EmbeddingSpec>, KnowledgeError> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT embedding_model, dimensions FROM knowledge_chunks ORDER BY id LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(unavailable)?;
        row.map(|(model, dimensions)| {
            Ok(EmbeddingSpec {
                model,
                dimensions: usize::try_from(dimensions).map_err(unavailable)?,
            })
        })
        .transpose()
    }

    fn search(
        &self,
        query: &[f32],
        spec: &EmbeddingSpec,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, KnowledgeError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != spec.dimensions {
            return Err(KnowledgeError::InvalidInput {
                message: format!(
                    "query has {} dimensions, expected {}",
                    query.len(),
                    spec.dimensions
                ),
            });
        }
        self.check_spec(spec)?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT source, chunk_index, title, content, embedding, embedding_model FROM knowledge_chunks",
            )
            .map_err(unavailable)?;
        let mut rows = stmt.query([]).map_err(unavailable)?;
        let mut hits = Vec::new();
        while let Some(row) = rows.next().map_err(unavailable)? {
            let blob: Vec<u8> = row.get(4).map_err(unavailable)?;
            let embedding = bytes_to_f32_vec(&blob);
            if embedding.len() != query.len() {
                continue;
            }
            let similarity = cosine_similarity(query, &embedding);
            hits.push(SearchHit {
                chunk: KnowledgeChunk {
                    source: row.get(0).map_err(unavailable)?,
                    chunk_index: row.get(1).map_err(unavailable)?,
                    title: row.get(2).map_err(unavailable)?,
                    content: row.get(3).map_err(unavailable)?,
                    embedding,
                    embedding_model: row.get(5).map_err(unavailable)?,
                },
                similarity,
            });
        }

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.source.cmp(&b.chunk.source))
                .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

fn unavailable(err: impl std::fmt::Display) -> KnowledgeError {
    KnowledgeError::Unavailable {
        message: err.to_string(),
    }
}

fn invalid(err: impl std::fmt::Display) -> KnowledgeError {
    KnowledgeError::InvalidInput {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;

    fn chunk(source: &str, index: u32, embedding: Vec<f32>) -> KnowledgeChunk {
        KnowledgeChunk {
            source: source.to_string(),
            chunk_index: index,
            title: format!("{source} title"),
            content: format!("{source} chunk {index}"),
            embedding,
            embedding_model: "nomic-embed-text".to_string(),
        }
    }

    fn spec(dimensions: usize) -> EmbeddingSpec {
        EmbeddingSpec {
            model: "nomic-embed-text".to_string(),
            dimensions,
        }
    }

    #[test]
    fn upsert_replaces_same_key() {
        let conn = with_test_db().unwrap();
        let repo = KnowledgeRepo::new(&conn);
        repo.upsert(&chunk("cooling.md", 0, vec![1.0, 0.0])).unwrap();
        let mut updated = chunk("cooling.md", 0, vec![0.0, 1.0]);
        updated.content = "revised".to_string();
        repo.upsert(&updated).unwrap();

        assert_eq!(repo.count().unwrap(), 1);
        let hits = repo.search(&[0.0, 1.0], &spec(2), 5).unwrap();
        assert_eq!(hits[0].chunk.content, "revised");
    }

    #[test]
    fn prune_drops_trailing_chunks() {
        let conn = with_test_db().unwrap();
        let repo = KnowledgeRepo::new(&conn);
        for index in 0..4 {
            repo.upsert(&chunk("cooling.md", index, vec![1.0, 0.0])).unwrap();
        }
        repo.upsert(&chunk("ballast.md", 3, vec![1.0, 0.0])).unwrap();
        assert_eq!(repo.prune_source("cooling.md", 2).unwrap(), 2);
        assert_eq!(repo.count().unwrap(), 3);
        assert_eq!(repo.clear().unwrap(), 3);
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn search_ranks_by_similarity() {
        let conn = with_test_db().unwrap();
        let repo = KnowledgeRepo::new(&conn);
        repo.upsert(&chunk("a.md", 0, vec![1.0, 0.0, 0.0])).unwrap();
        repo.upsert(&chunk("b.md", 0, vec![0.7, 0.7, 0.0])).unwrap();
        repo.upsert(&chunk("c.md", 0, vec![0.0, 0.0, 1.0])).unwrap();

        let hits = repo.search(&[1.0, 0.1, 0.0], &spec(3), 2).unwrap();
        let sources: Vec<&str> = hits.iter().map(|hit| hit.chunk.source.as_str()).collect();
        assert_eq!(sources, vec!["a.md", "b.md"]);
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[test]
    fn empty_store_searches_to_nothing() {
        let conn = with_test_db().unwrap();
        let repo = KnowledgeRepo::new(&conn);
        assert!(repo.embedding_spec().unwrap().is_none());
        assert!(repo.search(&[1.0, 0.0], &spec(2), 3).unwrap().is_empty());
    }

    #[test]
    fn mixed_embedding_spaces_are_rejected() {
        let conn = with_test_db().unwrap();
        let repo = KnowledgeRepo::new(&conn);
        repo.upsert(&chunk("a.md", 0, vec![1.0, 0.0])).unwrap();

        let wrong_dims = repo.upsert(&chunk("b.md", 0, vec![1.0, 0.0, 0.0]));
        assert!(matches!(wrong_dims, Err(KnowledgeError::EmbeddingMismatch { .. })));

        let mut wrong_model = chunk("b.md", 0, vec![1.0, 0.0]);
        wrong_model.embedding_model = "mxbai-embed-large".to_string();
        assert!(matches!(
            repo.upsert(&wrong_model),
            Err(KnowledgeError::EmbeddingMismatch { .. })
        ));

        let query_spec = EmbeddingSpec {
            model: "mxbai-embed-large".to_string(),
            dimensions: 2,
        };
        assert!(matches!(
            repo.search(&[1.0, 0.0], &query_spec, 3),
            Err(KnowledgeError::EmbeddingMismatch { .. })
        ));
        assert_eq!(repo.embedding_spec().unwrap(), Some(spec(2)));
    }
}
