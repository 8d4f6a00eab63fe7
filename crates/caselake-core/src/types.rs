//! Domain types shared by ingestion, the vector index and retrieval.

use serde::{Deserialize, Serialize};

/// A window of one document's extracted text, tagged with the document's
/// display name. Produced by the chunker, consumed by embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub source: String,
}

/// Metadata persisted next to each vector, aligned by insertion position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub text: String,
    pub source: String,
}

impl From<Chunk> for IndexedRecord {
    fn from(chunk: Chunk) -> Self {
        Self { text: chunk.text, source: chunk.source }
    }
}

/// One nearest-neighbor result.
///
/// `distance` is the raw Euclidean distance (lower is closer). `score` is the
/// similarity derived from it, in `[0, 1]`, where higher is always better.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub source: String,
    pub distance: f32,
    pub score: f32,
}

/// Per-source statistics gathered while aggregating hits for one query.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SourceAggregate {
    pub chunk_count: usize,
    pub max_score: f32,
    pub topic_hits: usize,
}

impl SourceAggregate {
    pub fn record(&mut self, score: f32, topic_hits: usize) {
        self.chunk_count += 1;
        if self.chunk_count == 1 || score > self.max_score {
            self.max_score = score;
        }
        self.topic_hits += topic_hits;
    }
}

/// A file as listed by a file-store collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

pub const PDF_MIME: &str = "application/pdf";

impl DocumentRef {
    pub fn is_pdf(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case(PDF_MIME)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Empty,
    Healthy,
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub total_vectors: usize,
    pub total_metadata: usize,
    pub healthy: bool,
    pub status: HealthStatus,
}

impl HealthReport {
    pub fn from_counts(total_vectors: usize, total_metadata: usize) -> Self {
        let status = if total_vectors != total_metadata {
            HealthStatus::Mismatch
        } else if total_vectors == 0 {
            HealthStatus::Empty
        } else {
            HealthStatus::Healthy
        };
        Self { total_vectors, total_metadata, healthy: status == HealthStatus::Healthy, status }
    }
}
