//! Vector index over SQLite storing chunk text and embeddings.
//!
//! Entries are append-only: inserting the same chunk set twice stores it
//! twice. Whole-index clearing is the only form of removal.

use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;

use super::models::{Chunk, RetrievedChunk};

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk count ({chunks}) does not match embedding count ({embeddings})")]
    MismatchedLengths { chunks: usize, embeddings: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, VectorIndexError>;

/// Vector index for similarity search.
///
/// Stores chunk text alongside f32 embedding blobs and scores queries with
/// brute-force cosine similarity over all stored vectors.
pub struct VectorIndex {
    conn: Connection,
}

impl VectorIndex {
    /// Open an index at the given SQLite path, or in memory when `None`.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let conn = match path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path)?
            }
            None => Connection::open_in_memory()?,
        };

        conn.execute_batch(
            r#"
            -- One row per ingested document
            CREATE TABLE IF NOT EXISTS documents (
                source_file TEXT PRIMARY KEY,
                page_count INTEGER NOT NULL,
                chunk_count INTEGER NOT NULL,
                indexed_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            -- One row per stored chunk: text plus its embedding blob
            CREATE TABLE IF NOT EXISTS entries (
                chunk_id TEXT NOT NULL,
                source_file TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                sequence_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dimensions INTEGER NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_entries_source_file ON entries(source_file);
            "#,
        )?;

        Ok(Self { conn })
    }

    /// Append chunks with their embeddings in one transaction.
    ///
    /// Every embedding must share the dimensionality already stored in the
    /// index (or, for the first insertion, the dimensionality of the first
    /// incoming vector). No deduplication is performed.
    pub fn insert(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(VectorIndexError::MismatchedLengths {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let expected = match self.dimensions()? {
            Some(dims) => dims,
            None => embeddings[0].len(),
        };
        for embedding in embeddings {
            if embedding.len() != expected {
                return Err(VectorIndexError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        let tx = self.conn.transaction()?;
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            tx.execute(
                "INSERT INTO entries (chunk_id, source_file, page_number, sequence_index, content, embedding, dimensions)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    chunk.id.to_string(),
                    chunk.source_file,
                    chunk.page_number,
                    chunk.sequence_index,
                    chunk.content,
                    serialize_embedding(embedding),
                    embedding.len() as i64,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Record (or update) the document row for an ingested file.
    pub fn record_document(
        &mut self,
        source_file: &str,
        page_count: usize,
        chunk_count: usize,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO documents (source_file, page_count, chunk_count) VALUES (?1, ?2, ?3)
             ON CONFLICT(source_file) DO UPDATE SET
                 page_count = excluded.page_count,
                 chunk_count = chunk_count + excluded.chunk_count,
                 indexed_at = CURRENT_TIMESTAMP",
            params![source_file, page_count as i64, chunk_count as i64],
        )?;
        Ok(())
    }

    /// Whether a document with this file name was already recorded.
    pub fn contains_document(&self, source_file: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE source_file = ?1)",
            params![source_file],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    /// Return the k entries closest to the query embedding, in descending
    /// similarity order. An empty index yields an empty result.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_file, page_number, content, embedding FROM entries",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut scored: Vec<RetrievedChunk> = Vec::new();
        for row in rows {
            let (source_file, page_number, content, embedding_bytes) = row?;
            let embedding = deserialize_embedding(&embedding_bytes);
            let score = cosine_similarity(query_embedding, &embedding);
            scored.push(RetrievedChunk {
                source_file,
                page_number,
                content,
                score,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Remove every entry and document record.
    pub fn clear(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM entries", [])?;
        tx.execute("DELETE FROM documents", [])?;
        tx.commit()?;
        Ok(())
    }

    /// Get statistics about the index.
    pub fn stats(&self) -> Result<IndexStats> {
        let documents: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let chunks: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        let dimensions = self.dimensions()?.unwrap_or(0);

        Ok(IndexStats {
            documents: documents as u64,
            chunks: chunks as u64,
            dimensions: dimensions as u64,
        })
    }

    /// Dimensionality of stored vectors, or `None` when the index is empty.
    fn dimensions(&self) -> Result<Option<usize>> {
        let dims = self
            .conn
            .query_row("SELECT dimensions FROM entries LIMIT 1", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|d| d as usize);
        match dims {
            Ok(d) => Ok(Some(d)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Statistics about the vector index.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub documents: u64,
    pub chunks: u64,
    pub dimensions: u64,
}

/// Serialize an embedding as an f32 little-endian blob.
fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize an embedding from its binary blob.
fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Calculate cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    dot_product / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(file: &str, page: u32, seq: u32, content: &str) -> Chunk {
        Chunk::new(file, page, seq, content.to_string())
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_embedding_roundtrip() {
        let values = vec![1.0f32, 2.0, 3.0];
        let bytes = serialize_embedding(&values);
        assert_eq!(deserialize_embedding(&bytes), values);
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let mut index = VectorIndex::open(None).unwrap();
        let chunks = vec![
            chunk("a.pdf", 1, 0, "north"),
            chunk("a.pdf", 2, 1, "east"),
            chunk("a.pdf", 3, 2, "northeast"),
        ];
        let embeddings = vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.7, 0.7],
        ];
        index.insert(&chunks, &embeddings).unwrap();

        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "north");
        assert_eq!(results[1].content, "northeast");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::open(None).unwrap();
        assert!(index.is_empty().unwrap());
        assert!(index.search(&[1.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_double_insert_doubles_entries() {
        // No deduplication at the index layer: re-inserting a chunk set
        // appends a second copy of every entry.
        let mut index = VectorIndex::open(None).unwrap();
        let chunks = vec![chunk("a.pdf", 1, 0, "body"), chunk("a.pdf", 1, 1, "more")];
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];

        index.insert(&chunks, &embeddings).unwrap();
        index.insert(&chunks, &embeddings).unwrap();

        assert_eq!(index.stats().unwrap().chunks, 4);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = VectorIndex::open(None).unwrap();
        index
            .insert(&[chunk("a.pdf", 1, 0, "x")], &[vec![1.0, 0.0]])
            .unwrap();

        let result = index.insert(&[chunk("a.pdf", 1, 1, "y")], &[vec![1.0, 0.0, 0.0]]);
        assert!(matches!(
            result,
            Err(VectorIndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert_eq!(index.stats().unwrap().chunks, 1);
    }

    #[test]
    fn test_mismatched_lengths() {
        let mut index = VectorIndex::open(None).unwrap();
        let result = index.insert(&[chunk("a.pdf", 1, 0, "x")], &[]);
        assert!(matches!(
            result,
            Err(VectorIndexError::MismatchedLengths {
                chunks: 1,
                embeddings: 0
            })
        ));
    }

    #[test]
    fn test_document_records() {
        let mut index = VectorIndex::open(None).unwrap();
        assert!(!index.contains_document("a.pdf").unwrap());

        index.record_document("a.pdf", 3, 5).unwrap();
        assert!(index.contains_document("a.pdf").unwrap());

        // A second ingest pass accumulates chunk counts on the same row.
        index.record_document("a.pdf", 3, 5).unwrap();
        let stats = index.stats().unwrap();
        assert_eq!(stats.documents, 1);
    }

    #[test]
    fn test_clear() {
        let mut index = VectorIndex::open(None).unwrap();
        index
            .insert(&[chunk("a.pdf", 1, 0, "x")], &[vec![1.0]])
            .unwrap();
        index.record_document("a.pdf", 1, 1).unwrap();

        index.clear().unwrap();
        assert!(index.is_empty().unwrap());
        assert!(!index.contains_document("a.pdf").unwrap());
    }

    #[test]
    fn test_file_backed_index_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.sqlite3");

        {
            let mut index = VectorIndex::open(Some(&path)).unwrap();
            index
                .insert(&[chunk("a.pdf", 1, 0, "persisted")], &[vec![0.5, 0.5]])
                .unwrap();
        }

        let index = VectorIndex::open(Some(&path)).unwrap();
        let results = index.search(&[0.5, 0.5], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "persisted");
    }
}
