//! Content chunking for embedding and retrieval.
//!
//! Splits extracted page text into overlapping chunks using a sliding window,
//! preferring paragraph and sentence boundaries over hard character cuts.

use crate::config::ChunkingConfig;

use super::models::{Chunk, PageText};

/// Chunk the pages of one document into embedding-ready chunks.
///
/// Each chunk inherits the page number of the page it was cut from and
/// records its position within the document. Empty input produces an empty
/// sequence.
pub fn chunk_pages(source_file: &str, pages: &[PageText], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut sequence = 0u32;

    for page in pages {
        for (content, _, _) in sliding_window(&page.text, config.max_chars, config.overlap) {
            chunks.push(Chunk::new(source_file, page.page_number, sequence, content));
            sequence += 1;
        }
    }

    chunks
}

/// Split text into overlapping chunks using a sliding window approach.
/// Returns tuples of (chunk_text, start_offset, end_offset).
fn sliding_window(text: &str, max_chars: usize, overlap: usize) -> Vec<(String, usize, usize)> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    // If text is small enough, return as single chunk
    if text.len() <= max_chars {
        return vec![(text.to_string(), 0, text.len())];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_chars).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        // Try to find a good break point (sentence or paragraph boundary)
        let chunk_end = if end < text.len() {
            find_break_point(&text[start..end], max_chars)
                .map(|offset| start + offset)
                .unwrap_or(end)
        } else {
            end
        };

        let chunk_text = text[start..chunk_end].trim().to_string();
        if !chunk_text.is_empty() {
            chunks.push((chunk_text, start, chunk_end));
        }

        if chunk_end >= text.len() {
            break;
        }

        // Move start position, accounting for overlap
        let step = chunk_end - start;
        if step <= overlap {
            // Avoid infinite loop if chunk is too small
            start = chunk_end;
        } else {
            start = chunk_end - overlap;
            while !text.is_char_boundary(start) {
                start += 1;
            }
        }
    }

    chunks
}

/// Find a good break point in text (prefer sentence/paragraph boundaries).
fn find_break_point(text: &str, max_len: usize) -> Option<usize> {
    let mut limit = max_len.min(text.len());
    while !text.is_char_boundary(limit) {
        limit -= 1;
    }
    let search_text = &text[..limit];

    // Look for paragraph boundary (double newline)
    if let Some(pos) = search_text.rfind("\n\n") {
        if pos > max_len / 3 {
            return Some(pos + 2);
        }
    }

    // Look for sentence boundary
    for pattern in &[". ", "! ", "? ", ".\n", "!\n", "?\n"] {
        if let Some(pos) = search_text.rfind(pattern) {
            if pos > max_len / 3 {
                return Some(pos + pattern.len());
            }
        }
    }

    // Look for any newline
    if let Some(pos) = search_text.rfind('\n') {
        if pos > max_len / 3 {
            return Some(pos + 1);
        }
    }

    // Look for comma or semicolon
    for pattern in &[", ", "; "] {
        if let Some(pos) = search_text.rfind(pattern) {
            if pos > max_len / 2 {
                return Some(pos + pattern.len());
            }
        }
    }

    // Fall back to word boundary
    if let Some(pos) = search_text.rfind(' ') {
        return Some(pos + 1);
    }

    None
}
