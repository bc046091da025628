//! The two-step retrieve → generate pipeline.
//!
//! Retrieval always runs first; generation only runs when retrieval produced
//! at least one chunk, otherwise the fixed no-information answer is
//! substituted without invoking the model.

use thiserror::Error;

use crate::config::EmptyIndexPolicy;
use crate::providers::{ChatProvider, EmbeddingProvider, ProviderError};

use super::index::{VectorIndex, VectorIndexError};
use super::models::{Citation, QueryResponse, RetrievedChunk};

/// Answer returned when retrieval finds nothing to ground a response on.
pub const NO_MATCH_ANSWER: &str = "No relevant information found in the uploaded documents.";

/// Fixed system instruction for the answering model.
const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based on \
    the provided context. Always be truthful and if you're not sure about something, say so.";

/// Characters of chunk text included in each citation snippet.
const SNIPPET_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no documents have been ingested yet")]
    EmptyIndex,

    #[error("embedding request failed: {0}")]
    Embedding(#[source] ProviderError),

    #[error("model request failed: {0}")]
    Model(#[source] ProviderError),

    #[error("vector index error: {0}")]
    Index(#[from] VectorIndexError),
}

/// Transient state threaded through the pipeline for one query's lifetime.
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// The user's question
    pub query: String,
    /// Chunks retrieved as context, best match first
    pub context: Vec<RetrievedChunk>,
    /// Generated answer text
    pub answer: String,
    /// Citations for the chunks passed to the model
    pub citations: Vec<Citation>,
}

impl PipelineState {
    fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            context: Vec::new(),
            answer: String::new(),
            citations: Vec::new(),
        }
    }

    /// Collapse the state into the response returned to callers.
    pub fn into_response(self) -> QueryResponse {
        QueryResponse {
            answer: self.answer,
            sources: self.citations,
        }
    }
}

/// Run one query through retrieval and generation.
pub async fn run_query(
    embedder: &dyn EmbeddingProvider,
    chat: &dyn ChatProvider,
    index: &mut VectorIndex,
    query: &str,
    top_k: usize,
    empty_index: EmptyIndexPolicy,
) -> Result<PipelineState, PipelineError> {
    let state = retrieve_context(embedder, index, PipelineState::new(query), top_k, empty_index)
        .await?;
    generate_answer(chat, state).await
}

/// Retrieval step: embed the query and collect the top-k closest chunks.
async fn retrieve_context(
    embedder: &dyn EmbeddingProvider,
    index: &mut VectorIndex,
    mut state: PipelineState,
    top_k: usize,
    empty_index: EmptyIndexPolicy,
) -> Result<PipelineState, PipelineError> {
    if index.is_empty()? {
        if empty_index == EmptyIndexPolicy::Error {
            return Err(PipelineError::EmptyIndex);
        }
        return Ok(state);
    }

    let query_embedding = embedder
        .embed(&state.query)
        .await
        .map_err(PipelineError::Embedding)?;
    state.context = index.search(&query_embedding, top_k)?;
    Ok(state)
}

/// Generation step: build the prompt, invoke the model and derive citations.
async fn generate_answer(
    chat: &dyn ChatProvider,
    mut state: PipelineState,
) -> Result<PipelineState, PipelineError> {
    if state.context.is_empty() {
        state.answer = NO_MATCH_ANSWER.to_string();
        state.citations.clear();
        return Ok(state);
    }

    let context_block = state
        .context
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let user_prompt = format!("Context:\n{context_block}\n\nQuestion: {}", state.query);

    state.answer = chat
        .complete(SYSTEM_PROMPT, &user_prompt)
        .await
        .map_err(PipelineError::Model)?;

    // Citations come from the chunks actually passed as context, not from
    // parsing the model output.
    state.citations = state
        .context
        .iter()
        .map(|chunk| Citation {
            file: chunk.source_file.clone(),
            page: chunk.page_number,
            snippet: snippet(&chunk.content),
        })
        .collect();
    Ok(state)
}

fn snippet(content: &str) -> String {
    if content.chars().count() <= SNIPPET_CHARS {
        return content.to_string();
    }
    let head: String = content.chars().take(SNIPPET_CHARS).collect();
    format!("{head}...")
}
