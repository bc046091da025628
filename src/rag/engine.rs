//! Engine wiring configuration, providers and the vector index together.
//!
//! One `RagEngine` is constructed at startup and passed to every call, so
//! nothing lives in module-level state.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{AppConfig, ReingestPolicy};
use crate::loader::{self, LoadError};
use crate::providers::{ChatProvider, EmbeddingProvider, OpenAiChat, OpenAiEmbedder, ProviderError};

use super::chunker;
use super::index::{IndexStats, VectorIndex, VectorIndexError};
use super::models::{IngestReport, QueryResponse};
use super::pipeline::{self, PipelineError};

/// Failure while constructing the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("vector index error: {0}")]
    Index(#[from] VectorIndexError),
}

/// Failure while ingesting one document. Isolated to that document;
/// previously indexed entries are unaffected.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to read document: {0}")]
    Load(#[from] LoadError),

    #[error("embedding request failed: {0}")]
    Embedding(#[source] ProviderError),

    #[error("vector index error: {0}")]
    Index(#[from] VectorIndexError),
}

/// The pipeline context: configuration, providers and the index.
pub struct RagEngine {
    config: AppConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    index: Mutex<VectorIndex>,
}

impl RagEngine {
    /// Build an engine with OpenAI-compatible providers from the config.
    pub fn new(config: AppConfig) -> Result<Self, EngineError> {
        let provider = &config.provider;
        let api_key = provider
            .api_key
            .clone()
            .ok_or(ProviderError::MissingApiKey)?;
        let timeout = Duration::from_secs(provider.timeout_secs);

        let embedder = OpenAiEmbedder::new(
            &api_key,
            &provider.base_url,
            &provider.embedding_model,
            provider.embedding_dimensions,
            timeout,
        )?;
        let chat = OpenAiChat::new(
            &api_key,
            &provider.base_url,
            &provider.chat_model,
            provider.temperature,
            timeout,
        )?;

        Self::with_providers(config, Arc::new(embedder), Arc::new(chat))
    }

    /// Build an engine around caller-supplied providers.
    pub fn with_providers(
        config: AppConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
    ) -> Result<Self, EngineError> {
        let index = VectorIndex::open(config.index.path.as_deref())?;
        Ok(Self {
            config,
            embedder,
            chat,
            index: Mutex::new(index),
        })
    }

    /// Extract, chunk, embed and index one PDF document.
    pub async fn ingest_pdf(&self, source_file: &str, data: &[u8]) -> Result<IngestReport, IngestError> {
        let mut index = self.index.lock().await;

        if self.config.ingest.reingest == ReingestPolicy::Skip
            && index.contains_document(source_file)?
        {
            log::info!("skipping already-indexed document {source_file}");
            return Ok(IngestReport {
                source_file: source_file.to_string(),
                pages: 0,
                chunks: 0,
                skipped: true,
            });
        }

        let pages = loader::load_pdf(data)?;
        let chunks = chunker::chunk_pages(source_file, &pages, &self.config.chunking);

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            let embeddings = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(IngestError::Embedding)?;
            index.insert(&chunks, &embeddings)?;
        }
        index.record_document(source_file, pages.len(), chunks.len())?;

        log::info!(
            "indexed {} chunks from {} pages of {source_file}",
            chunks.len(),
            pages.len()
        );
        Ok(IngestReport {
            source_file: source_file.to_string(),
            pages: pages.len(),
            chunks: chunks.len(),
            skipped: false,
        })
    }

    /// Answer a query from the ingested documents.
    pub async fn answer(&self, query: &str) -> Result<QueryResponse, PipelineError> {
        let mut index = self.index.lock().await;
        let state = pipeline::run_query(
            self.embedder.as_ref(),
            self.chat.as_ref(),
            &mut index,
            query,
            self.config.retrieval.top_k,
            self.config.retrieval.empty_index,
        )
        .await?;
        Ok(state.into_response())
    }

    /// Current index statistics.
    pub async fn stats(&self) -> Result<IndexStats, VectorIndexError> {
        self.index.lock().await.stats()
    }

    /// Remove every indexed document and entry.
    pub async fn clear(&self) -> Result<(), VectorIndexError> {
        self.index.lock().await.clear()
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::config::{EmptyIndexPolicy, ReingestPolicy};
    use crate::loader::build_pdf;
    use crate::providers::Result as ProviderResult;

    use super::pipeline::NO_MATCH_ANSWER;
    use super::*;

    /// Vocabulary for the deterministic test embedder. Each vector counts
    /// occurrences of these words, so texts sharing words score high.
    const VOCAB: &[&str] = &["capital", "france", "paris", "weather", "rivers"];

    struct KeywordEmbedder {
        fail: AtomicBool,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            Self {
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed_batch(&self, inputs: &[String]) -> ProviderResult<Vec<Vec<f32>>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProviderError::Api {
                    status: 500,
                    body: "simulated embedding outage".to_string(),
                });
            }
            Ok(inputs
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    VOCAB
                        .iter()
                        .map(|word| lower.matches(word).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    struct CannedChat {
        reply: &'static str,
        calls: AtomicUsize,
    }

    impl CannedChat {
        fn new(reply: &'static str) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for CannedChat {
        async fn complete(&self, _system: &str, _user: &str) -> ProviderResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    fn engine_with(
        config: AppConfig,
    ) -> (RagEngine, Arc<KeywordEmbedder>, Arc<CannedChat>) {
        let embedder = Arc::new(KeywordEmbedder::new());
        let chat = Arc::new(CannedChat::new("The capital of France is Paris."));
        let engine =
            RagEngine::with_providers(config, embedder.clone(), chat.clone()).unwrap();
        (engine, embedder, chat)
    }

    fn geography_pdf() -> Vec<u8> {
        build_pdf(&[
            "Chapter one covers alpine climate patterns.",
            "The capital of France is Paris.",
            "Chapter three surveys mountain streams.",
        ])
    }

    #[tokio::test]
    async fn test_answer_cites_the_relevant_page() {
        let (engine, _, chat) = engine_with(AppConfig::default());

        let report = engine.ingest_pdf("geography.pdf", &geography_pdf()).await.unwrap();
        assert_eq!(report.pages, 3);
        assert_eq!(report.chunks, 3);
        assert!(!report.skipped);

        let response = engine.answer("What is the capital of France?").await.unwrap();
        assert_eq!(response.answer, "The capital of France is Paris.");
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);

        assert!(!response.sources.is_empty());
        // The best-scoring chunk comes from page 2.
        assert_eq!(response.sources[0].file, "geography.pdf");
        assert_eq!(response.sources[0].page, 2);
        assert!(response
            .sources
            .iter()
            .any(|c| c.file == "geography.pdf" && c.page == 2));
    }

    #[tokio::test]
    async fn test_empty_index_returns_fixed_answer_without_model_call() {
        let (engine, _, chat) = engine_with(AppConfig::default());

        let response = engine.answer("anything at all").await.unwrap();
        assert_eq!(response.answer, NO_MATCH_ANSWER);
        assert!(response.sources.is_empty());
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_index_error_policy() {
        let mut config = AppConfig::default();
        config.retrieval.empty_index = EmptyIndexPolicy::Error;
        let (engine, _, chat) = engine_with(config);

        let result = engine.answer("anything").await;
        assert!(matches!(result, Err(PipelineError::EmptyIndex)));
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_skip_policy_skips_reingestion() {
        let (engine, _, _) = engine_with(AppConfig::default());
        let pdf = geography_pdf();

        engine.ingest_pdf("geography.pdf", &pdf).await.unwrap();
        let second = engine.ingest_pdf("geography.pdf", &pdf).await.unwrap();

        assert!(second.skipped);
        assert_eq!(engine.stats().await.unwrap().chunks, 3);
    }

    #[tokio::test]
    async fn test_duplicate_policy_appends_duplicate_entries() {
        let mut config = AppConfig::default();
        config.ingest.reingest = ReingestPolicy::Duplicate;
        let (engine, _, _) = engine_with(config);
        let pdf = geography_pdf();

        engine.ingest_pdf("geography.pdf", &pdf).await.unwrap();
        engine.ingest_pdf("geography.pdf", &pdf).await.unwrap();

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.chunks, 6);
        assert_eq!(stats.documents, 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_previous_entries_intact() {
        let (engine, embedder, _) = engine_with(AppConfig::default());

        engine.ingest_pdf("geography.pdf", &geography_pdf()).await.unwrap();

        embedder.fail.store(true, Ordering::SeqCst);
        let other = build_pdf(&["Unrelated content about rivers."]);
        let result = engine.ingest_pdf("other.pdf", &other).await;
        assert!(matches!(result, Err(IngestError::Embedding(_))));

        embedder.fail.store(false, Ordering::SeqCst);
        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.documents, 1);

        // The earlier document still answers queries.
        let response = engine.answer("What is the capital of France?").await.unwrap();
        assert_eq!(response.sources[0].page, 2);
    }

    #[tokio::test]
    async fn test_bad_pdf_is_rejected() {
        let (engine, _, _) = engine_with(AppConfig::default());

        let result = engine.ingest_pdf("note.txt", b"just some text").await;
        assert!(matches!(result, Err(IngestError::Load(LoadError::NotPdf))));
        assert!(engine.stats().await.unwrap().chunks == 0);
    }
}
