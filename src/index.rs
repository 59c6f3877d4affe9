use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ndarray::Array1;
use tokio::sync::RwLock;

use crate::chunker::{self, ChunkPolicy, Chunk, SourceKind};
use crate::llm::Embedder;

/// An embedded chunk. Produced only by the builder, never mutated after
/// insertion.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Array1<f32>,
}

pub type Index = Vec<IndexEntry>;

/// Lifecycle of the one process-wide index: `Building` from process start
/// until the build task finishes, then `Ready` or `Failed`. A failed build
/// stays failed until a future build overwrites the state wholesale.
#[derive(Debug, Clone, Default)]
pub enum IndexState {
    #[default]
    Building,
    Ready(Arc<Index>),
    Failed(String),
}

/// Handle shared between the builder (sole writer) and query-side readers.
/// Readers clone the `Ready` Arc as a consistent snapshot; the entries
/// behind it are never mutated in place.
pub type SharedIndex = Arc<RwLock<IndexState>>;

pub fn new_shared_index() -> SharedIndex {
    Arc::new(RwLock::new(IndexState::Building))
}

/// Loads the raw text of a named source document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load(&self, kind: SourceKind) -> Result<String>;
}

/// Builds the in-memory semantic index: fetches both source documents,
/// chunks them, embeds every chunk, and swaps the result into the shared
/// state. Only one build should run at a time.
pub struct IndexBuilder {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    policy: ChunkPolicy,
    max_embed_chars: usize,
}

impl IndexBuilder {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
        policy: ChunkPolicy,
        max_embed_chars: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            policy,
            max_embed_chars,
        }
    }

    /// Runs one build attempt and records the outcome in `state`. Any
    /// failure leaves the state `Failed` with the captured error; a partial
    /// index is never exposed to readers.
    pub async fn run(&self, state: SharedIndex) {
        match self.build().await {
            Ok(index) => {
                tracing::info!(entries = index.len(), "index build complete");
                *state.write().await = IndexState::Ready(Arc::new(index));
            }
            Err(e) => {
                let detail = format!("{e:#}");
                tracing::error!(error = %detail, "index build failed");
                *state.write().await = IndexState::Failed(detail);
            }
        }
    }

    async fn build(&self) -> Result<Index> {
        let (csv_text, pdf_text) = tokio::try_join!(
            self.store.load(SourceKind::Csv),
            self.store.load(SourceKind::Pdf),
        )?;

        let mut chunks = chunker::chunk_document(&csv_text, SourceKind::Csv, &self.policy);
        chunks.extend(chunker::chunk_document(&pdf_text, SourceKind::Pdf, &self.policy));
        tracing::debug!(chunks = chunks.len(), "corpus chunked");

        anyhow::ensure!(!chunks.is_empty(), "no chunks produced from source documents");

        // Sequential embedding calls: one suspension point per chunk, no
        // fan-out, so build latency is linear in corpus size.
        let mut entries = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let input = chunker::truncate_chars(&chunk.text, self.max_embed_chars);
            let embedding = self
                .embedder
                .embed(input)
                .await
                .with_context(|| format!("embedding chunk {}/{}", chunk.source, chunk.id))?;
            entries.push(IndexEntry { chunk, embedding });
        }

        Ok(entries)
    }
}
