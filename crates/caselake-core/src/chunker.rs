//! Fixed-size overlapping character windows.
//!
//! Offsets count `char`s, not bytes, so a window never splits a UTF-8
//! sequence. Windowing stops at the first window that reaches the end of the
//! text; the last window may be shorter than `size`.

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::Chunk;

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidConfig("chunk size must be greater than zero".into()));
        }
        if overlap >= size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.size, config.overlap)
    }

    pub fn size(&self) -> usize { self.size }
    pub fn overlap(&self) -> usize { self.overlap }

    fn step(&self) -> usize { self.size - self.overlap }

    /// Split `text` into windows. Blank input yields no windows.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        // byte offset of every char boundary, plus the end of the string
        let bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let total = bounds.len() - 1;
        let mut chunks = Vec::with_capacity(total / self.step() + 1);
        let mut start = 0;
        while start < total {
            let end = (start + self.size).min(total);
            chunks.push(text[bounds[start]..bounds[end]].to_string());
            if end >= total { break; }
            start += self.step();
        }
        chunks
    }

    /// Chunk one document and tag every window with its source name.
    pub fn chunk_document(&self, text: &str, source: &str) -> Vec<Chunk> {
        self.chunk(text)
            .into_iter()
            .map(|text| Chunk { text, source: source.to_string() })
            .collect()
    }
}

/// Convenience wrapper around [`Chunker`].
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(Chunker::new(size, overlap)?.chunk(text))
}

/// Inverse of [`Chunker::chunk`]: drop the leading `overlap` chars of every
/// window after the first and concatenate.
pub fn reassemble(chunks: &[String], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(chunk);
        } else {
            out.extend(chunk.chars().skip(overlap));
        }
    }
    out
}
