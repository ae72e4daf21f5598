use crate::BosunError;
use crate::config::KnowledgeConfig;
use crate::embed::Embedder;
use crate::error::KnowledgeError;
use crate::knowledge::KnowledgeRepository;
use crate::store::{Store, StoreProvider, with_store};
use crate::types::KnowledgeChunk;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeDocument {
    /// Path relative to the knowledge directory, `/`-separated.
    pub source: String,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Skip when the store already holds chunks.
    pub if_empty: bool,
    /// Drop every stored chunk first. Needed after switching embedding models.
    pub rebuild: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files: usize,
    pub chunks_written: usize,
    pub chunks_removed: usize,
    pub skipped: bool,
}

/// `.md` and `.txt` files under `root`, minus readmes, sorted by path.
pub fn collect_documents(root: &Path) -> Result<Vec<KnowledgeDocument>, KnowledgeError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|err| KnowledgeError::InvalidInput {
            message: err.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        if matches!(extension.as_deref(), Some("md" | "txt")) && !stem.eq_ignore_ascii_case("readme")
        {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        let raw = fs::read_to_string(&path).map_err(|err| KnowledgeError::InvalidInput {
            message: format!("{}: {err}", path.display()),
        })?;
        let text = raw.trim();
        if text.is_empty() {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path.as_path());
        let source = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        documents.push(KnowledgeDocument {
            source,
            title: extract_title(&path, text),
            text: text.to_string(),
        });
    }
    Ok(documents)
}

/// First markdown heading, otherwise the file stem in title case.
pub fn extract_title(path: &Path, text: &str) -> String {
    for line in text.lines() {
        let stripped = line.trim();
        if stripped.starts_with('#') {
            return stripped.trim_start_matches('#').trim().to_string();
        }
    }
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .replace(['_', '-'], " ");
    title_case(&stem)
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

/// Overlapping word windows. The last window always ends at the final word.
pub fn chunk_text(text: &str, chunk_words: usize, overlap_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || chunk_words == 0 {
        return Vec::new();
    }
    if words.len() <= chunk_words {
        return vec![words.join(" ")];
    }
    let overlap = overlap_words.min(chunk_words - 1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_words).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }
        start = end - overlap;
    }
    chunks
}

/// Embeds every document chunk and upserts it on `(source, chunk_index)`,
/// then removes chunks left over from a longer previous version.
pub async fn ingest_directory<P: StoreProvider>(
    provider: &P,
    embedder: &dyn Embedder,
    config: &KnowledgeConfig,
    store_timeout: Duration,
    options: IngestOptions,
) -> Result<IngestReport, BosunError> {
    let mut report = IngestReport::default();

    if options.rebuild {
        let removed = with_store(provider, store_timeout, |store| {
            store.knowledge().clear().map_err(BosunError::from)
        })
        .await?;
        info!(removed, "cleared knowledge store");
        report.chunks_removed += removed;
    } else if options.if_empty {
        let count = with_store(provider, store_timeout, |store| {
            store.knowledge().count().map_err(BosunError::from)
        })
        .await?;
        if count > 0 {
            info!(count, "knowledge store already populated, skipping ingestion");
            report.skipped = true;
            return Ok(report);
        }
    }

    let documents = collect_documents(&config.dir)?;
    if documents.is_empty() {
        warn!(dir = %config.dir.display(), "no knowledge documents found");
        return Ok(report);
    }

    let model = embedder.model().to_string();
    for document in documents {
        let pieces = chunk_text(&document.text, config.chunk_words, config.overlap_words);
        let mut chunks = Vec::with_capacity(pieces.len());
        for (index, content) in pieces.into_iter().enumerate() {
            let embedding = embedder.embed(&content).await?;
            let chunk_index = u32::try_from(index).map_err(BosunError::internal)?;
            chunks.push(KnowledgeChunk {
                source: document.source.clone(),
                chunk_index,
                title: document.title.clone(),
                content,
                embedding,
                embedding_model: model.clone(),
            });
        }

        let source = document.source.clone();
        let written = chunks.len();
        let removed = with_store(provider, store_timeout, move |store| {
            store.with_tx(|store| {
                for chunk in &chunks {
                    store.knowledge().upsert(chunk)?;
                }
                let keep = u32::try_from(chunks.len()).map_err(BosunError::internal)?;
                Ok(store.knowledge().prune_source(&source, keep)?)
            })
        })
        .await?;

        info!(source = %document.source, chunks = written, removed, "ingested knowledge document");
        report.files += 1;
        report.chunks_written += written;
        report.chunks_removed += removed;
    }

    info!(
        files = report.files,
        chunks = report.chunks_written,
        "knowledge ingestion complete"
    );
    Ok(report)
}
