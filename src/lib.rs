//! Core library entry points for the lectern question-answering engine.

pub mod config;
pub mod loader;
pub mod providers;
pub mod rag;
pub mod server;

pub use config::AppConfig;
pub use loader::{load_pdf, LoadError};
pub use rag::{
    Chunk, Citation, IngestReport, PipelineState, QueryResponse, RagEngine, RetrievedChunk,
    VectorIndex,
};
