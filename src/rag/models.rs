//! Data models for document ingestion and retrieval.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text extracted from a single PDF page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// 1-based page number, in document order.
    pub page_number: u32,
    /// Plain text extracted from the page.
    pub text: String,
}

/// A chunk of document text with its embedding-ready content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Unique identifier for this chunk
    pub id: Uuid,
    /// File the chunk was extracted from
    pub source_file: String,
    /// Page the chunk was cut from (1-based)
    pub page_number: u32,
    /// Position of this chunk within the document (for ordering)
    pub sequence_index: u32,
    /// The text content of the chunk
    pub content: String,
}

impl Chunk {
    /// Create a new chunk with a generated ID.
    pub fn new(source_file: &str, page_number: u32, sequence_index: u32, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_file: source_file.to_string(),
            page_number,
            sequence_index,
            content,
        }
    }
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    /// File the chunk was extracted from
    pub source_file: String,
    /// Page the chunk was cut from
    pub page_number: u32,
    /// The matched chunk content
    pub content: String,
    /// Cosine similarity to the query (higher is more similar)
    pub score: f32,
}

/// Provenance of a chunk used to generate an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// Source file name
    pub file: String,
    /// Page number within the file
    pub page: u32,
    /// Leading excerpt of the cited chunk
    pub snippet: String,
}

/// Final response returned for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Generated answer text
    pub answer: String,
    /// Citations for the chunks passed to the model as context
    pub sources: Vec<Citation>,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// File the report describes
    pub source_file: String,
    /// Pages extracted from the document
    pub pages: usize,
    /// Chunks embedded and inserted into the index
    pub chunks: usize,
    /// True when the reingest policy skipped an already-indexed file
    pub skipped: bool,
}
