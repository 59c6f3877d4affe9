use std::sync::Arc;

use thiserror::Error;

use crate::chunker::truncate_chars;
use crate::index::{Index, IndexState, SharedIndex};
use crate::llm::{Embedder, LlmError};
use crate::ranker::{self, ScoredChunk};

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The index has not finished a successful build. Recoverable: the
    /// caller may proceed without retrieved context.
    #[error("semantic index is not ready")]
    IndexNotReady { last_error: Option<String> },
    #[error(transparent)]
    Embedding(#[from] LlmError),
}

/// Synchronous entry point for request handlers: embeds a query, ranks it
/// against the current index snapshot, and serializes the top-K chunks into
/// one context block.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    state: SharedIndex,
    top_k: usize,
    max_query_chars: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        state: SharedIndex,
        top_k: usize,
        max_query_chars: usize,
    ) -> Self {
        Self {
            embedder,
            state,
            top_k,
            max_query_chars,
        }
    }

    /// Returns the context block for a query, or `IndexNotReady` when no
    /// successful build has completed. The empty string means "no usable
    /// context", never an error.
    pub async fn retrieve_context(&self, query: &str) -> Result<String, RetrievalError> {
        let snapshot = self.snapshot().await?;
        let query = truncate_chars(query, self.max_query_chars);
        let query_vector = self.embedder.embed(query).await?;
        let top = ranker::rank(&query_vector, &snapshot, self.top_k);
        Ok(format_context(&top))
    }

    async fn snapshot(&self) -> Result<Arc<Index>, RetrievalError> {
        match &*self.state.read().await {
            IndexState::Ready(index) => Ok(Arc::clone(index)),
            IndexState::Building => Err(RetrievalError::IndexNotReady { last_error: None }),
            IndexState::Failed(err) => Err(RetrievalError::IndexNotReady {
                last_error: Some(err.clone()),
            }),
        }
    }
}

/// One labeled section per chunk, 1-based rank, descending relevance.
fn format_context(top: &[ScoredChunk<'_>]) -> String {
    top.iter()
        .enumerate()
        .map(|(i, scored)| {
            format!(
                "[excerpt {} | source: {}]\n{}",
                i + 1,
                scored.entry.chunk.source,
                scored.entry.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{Chunk, SourceKind};
    use crate::index::{IndexEntry, new_shared_index};
    use async_trait::async_trait;
    use ndarray::Array1;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Array1<f32>, LlmError> {
            Ok(Array1::from(self.0.clone()))
        }
    }

    struct CaptureEmbedder(std::sync::Mutex<Option<String>>);

    #[async_trait]
    impl Embedder for CaptureEmbedder {
        async fn embed(&self, text: &str) -> Result<Array1<f32>, LlmError> {
            *self.0.lock().unwrap() = Some(text.to_string());
            Ok(Array1::from(vec![1.0, 0.0]))
        }
    }

    fn entry(source: SourceKind, id: usize, text: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                source,
                id,
                text: text.to_string(),
            },
            embedding: Array1::from(vector),
        }
    }

    async fn ready_state(entries: Vec<IndexEntry>) -> SharedIndex {
        let state = new_shared_index();
        *state.write().await = IndexState::Ready(Arc::new(entries));
        state
    }

    #[tokio::test]
    async fn building_index_is_not_ready() {
        let retriever = Retriever::new(
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            new_shared_index(),
            5,
            4000,
        );

        match retriever.retrieve_context("anything").await {
            Err(RetrievalError::IndexNotReady { last_error: None }) => {}
            other => panic!("expected IndexNotReady, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_index_carries_the_build_error() {
        let state = new_shared_index();
        *state.write().await = IndexState::Failed("embed service down".to_string());
        let retriever = Retriever::new(Arc::new(FixedEmbedder(vec![1.0, 0.0])), state, 5, 4000);

        match retriever.retrieve_context("anything").await {
            Err(RetrievalError::IndexNotReady {
                last_error: Some(err),
            }) => assert_eq!(err, "embed service down"),
            other => panic!("expected IndexNotReady with error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn context_sections_are_labeled_in_relevance_order() {
        let state = ready_state(vec![
            entry(SourceKind::Csv, 0, "rows 1-120\n...", vec![1.0, 0.0]),
            entry(SourceKind::Pdf, 0, "Project background.", vec![0.0, 1.0]),
            entry(SourceKind::Pdf, 1, "Delivery milestones.", vec![0.9, 0.1]),
        ])
        .await;
        let retriever = Retriever::new(Arc::new(FixedEmbedder(vec![1.0, 0.0])), state, 2, 4000);

        let context = retriever.retrieve_context("sales for january").await.unwrap();

        let first = context.find("[excerpt 1 | source: csv]").unwrap();
        let second = context.find("[excerpt 2 | source: pdf]").unwrap();
        assert!(first < second);
        assert!(context.contains("rows 1-120"));
        assert!(context.contains("Delivery milestones."));
        assert!(!context.contains("Project background."));
    }

    #[tokio::test]
    async fn k_larger_than_index_returns_everything() {
        let state = ready_state(vec![entry(SourceKind::Pdf, 0, "Only one.", vec![1.0])]).await;
        let retriever = Retriever::new(Arc::new(FixedEmbedder(vec![1.0])), state, 5, 4000);

        let context = retriever.retrieve_context("q").await.unwrap();
        assert!(context.contains("[excerpt 1 | source: pdf]"));
        assert!(!context.contains("[excerpt 2"));
    }

    #[tokio::test]
    async fn query_is_truncated_before_embedding() {
        let embedder = Arc::new(CaptureEmbedder(std::sync::Mutex::new(None)));
        let state = ready_state(vec![entry(SourceKind::Csv, 0, "c", vec![1.0, 0.0])]).await;
        let retriever = Retriever::new(embedder.clone(), state, 5, 10);

        retriever.retrieve_context(&"q".repeat(50)).await.unwrap();

        let seen = embedder.0.lock().unwrap().clone().unwrap();
        assert_eq!(seen.len(), 10);
    }

    #[tokio::test]
    async fn embedding_failure_propagates_with_detail() {
        struct FailingEmbedder;

        #[async_trait]
        impl Embedder for FailingEmbedder {
            async fn embed(&self, _text: &str) -> Result<Array1<f32>, LlmError> {
                Err(LlmError::Embedding("429 too many requests".to_string()))
            }
        }

        let state = ready_state(vec![entry(SourceKind::Csv, 0, "c", vec![1.0])]).await;
        let retriever = Retriever::new(Arc::new(FailingEmbedder), state, 5, 4000);

        match retriever.retrieve_context("q").await {
            Err(RetrievalError::Embedding(err)) => {
                assert!(err.to_string().contains("429 too many requests"));
            }
            other => panic!("expected embedding failure, got {other:?}"),
        }
    }
}
