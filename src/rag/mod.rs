//! Retrieval-augmented question answering over ingested documents.

mod chunker;
mod engine;
mod index;
mod models;
mod pipeline;

pub use chunker::chunk_pages;
pub use engine::{EngineError, IngestError, RagEngine};
pub use index::{IndexStats, VectorIndex, VectorIndexError};
pub use models::{Chunk, Citation, IngestReport, PageText, QueryResponse, RetrievedChunk};
pub use pipeline::{run_query, PipelineError, PipelineState, NO_MATCH_ANSWER};
