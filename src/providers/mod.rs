//! External embedding and language-model capabilities.

mod openai;

pub use openai::{OpenAiChat, OpenAiEmbedder};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("missing API key: set OPENAI_API_KEY or configure provider.api_key")]
    MissingApiKey,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    UnexpectedResponse(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Computes fixed-length embedding vectors for text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, input: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[input.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::UnexpectedResponse("empty embedding batch".to_string()))
    }
}

/// Generates text from a two-role (system + user) prompt.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Produce a completion for the given system instruction and user turn.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}
