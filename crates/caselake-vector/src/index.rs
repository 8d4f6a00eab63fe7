use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info, warn};

use caselake_core::types::{HealthReport, HealthStatus, IndexedRecord, SearchHit};
use caselake_core::{Error, Result};

use crate::snapshot::IndexSnapshot;
use crate::storage::IndexStorage;

/// Similarity in `[0, 1]` from a Euclidean distance. For unit-length vectors
/// `1 - d²/2` is exactly their cosine similarity.
pub fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - distance * distance / 2.0).clamp(0.0, 1.0)
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

/// Exact (flat) L2 index over the vectors + metadata pair.
///
/// Each write builds a new snapshot, persists it through the storage backend
/// and only then publishes it; searches work on whichever snapshot was
/// current when they started. Writers are serialized.
pub struct VectorIndex {
    storage: Arc<dyn IndexStorage>,
    dimension: usize,
    current: RwLock<Arc<IndexSnapshot>>,
    writer: Mutex<()>,
}

impl VectorIndex {
    /// Opens the persisted index, or starts an empty one when nothing has been
    /// persisted yet. Nothing is written until the first `add` or `reset`.
    pub fn open_or_create(storage: Arc<dyn IndexStorage>, dimension: usize) -> Result<Self> {
        let snapshot = match storage.load()? {
            Some(s) => {
                if s.dimension != dimension {
                    warn!(stored = s.dimension, configured = dimension, "stored index has a different dimension; reset required");
                }
                s
            }
            None => {
                info!(location = %storage.describe(), dimension, "no persisted index; starting empty");
                IndexSnapshot::empty(dimension)
            }
        };
        Ok(Self::from_snapshot(storage, dimension, snapshot))
    }

    /// Opens an index that must already exist, as a query process does.
    pub fn open_existing(storage: Arc<dyn IndexStorage>, dimension: usize) -> Result<Self> {
        let snapshot = storage.load()?.ok_or_else(|| Error::IndexNotFound(storage.describe()))?;
        if snapshot.dimension != dimension {
            return Err(Error::DimensionMismatch { expected: dimension, actual: snapshot.dimension });
        }
        Ok(Self::from_snapshot(storage, dimension, snapshot))
    }

    fn from_snapshot(storage: Arc<dyn IndexStorage>, dimension: usize, snapshot: IndexSnapshot) -> Self {
        if !snapshot.is_aligned() {
            warn!(
                vectors = snapshot.vector_count(),
                records = snapshot.records.len(),
                "index pair is misaligned; writes and searches are blocked until reset"
            );
        }
        Self { storage, dimension, current: RwLock::new(Arc::new(snapshot)), writer: Mutex::new(()) }
    }

    pub fn dimension(&self) -> usize { self.dimension }

    /// The generation visible right now.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn publish(&self, snapshot: IndexSnapshot) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }

    fn check_usable(&self, snapshot: &IndexSnapshot) -> Result<()> {
        if !snapshot.is_aligned() {
            return Err(Error::IndexCorrupted { vectors: snapshot.vector_count(), records: snapshot.records.len() });
        }
        if snapshot.dimension != self.dimension {
            return Err(Error::DimensionMismatch { expected: self.dimension, actual: snapshot.dimension });
        }
        Ok(())
    }

    /// Replaces the persisted pair with an empty one of the configured dimension.
    pub fn reset(&self) -> Result<()> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let empty = IndexSnapshot::empty(self.dimension);
        self.storage.save(&empty)?;
        self.publish(empty);
        info!(location = %self.storage.describe(), "index reset");
        Ok(())
    }

    /// Appends vectors and their records in lock-step and persists the new
    /// pair before returning.
    pub fn add(&self, vectors: Vec<Vec<f32>>, records: Vec<IndexedRecord>) -> Result<()> {
        if vectors.len() != records.len() {
            return Err(Error::LengthMismatch { vectors: vectors.len(), records: records.len() });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::DimensionMismatch { expected: self.dimension, actual: bad.len() });
        }
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let base = self.snapshot();
        self.check_usable(&base)?;
        if vectors.is_empty() {
            return Ok(());
        }

        let added = vectors.len();
        let mut next = IndexSnapshot::clone(&base);
        next.vectors.reserve(added * self.dimension);
        for v in &vectors {
            next.vectors.extend_from_slice(v);
        }
        next.records.extend(records);
        self.storage.save(&next)?;
        let total = next.records.len();
        self.publish(next);
        debug!(added, total, "appended vectors");
        Ok(())
    }

    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        self.search_where(query, top_k, |_| true)
    }

    /// Nearest neighbors among the records accepted by `keep`, best first.
    /// The predicate runs before top-k selection, so a narrow filter still
    /// yields up to `top_k` hits.
    pub fn search_where<F>(&self, query: &[f32], top_k: usize, keep: F) -> Result<Vec<SearchHit>>
    where
        F: Fn(&IndexedRecord) -> bool,
    {
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch { expected: self.dimension, actual: query.len() });
        }
        let snapshot = self.snapshot();
        self.check_usable(&snapshot)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, usize)> = snapshot
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| keep(record))
            .map(|(i, _)| (euclidean(query, snapshot.vector(i)), i))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(distance, i)| {
                let record = &snapshot.records[i];
                SearchHit {
                    text: record.text.clone(),
                    source: record.source.clone(),
                    distance,
                    score: similarity_from_distance(distance),
                }
            })
            .collect())
    }

    pub fn count(&self) -> usize { self.snapshot().vector_count() }

    pub fn metadata_count(&self) -> usize { self.snapshot().records.len() }

    /// Distinct source names, sorted.
    pub fn sources(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let names: BTreeSet<&str> = snapshot.records.iter().map(|r| r.source.as_str()).collect();
        names.into_iter().map(str::to_string).collect()
    }

    pub fn health(&self) -> HealthReport {
        let snapshot = self.snapshot();
        let report = HealthReport::from_counts(snapshot.vector_count(), snapshot.records.len());
        if report.status == HealthStatus::Mismatch {
            warn!(
                vectors = report.total_vectors,
                metadata = report.total_metadata,
                "vector/metadata count mismatch; rebuild with a full re-ingestion"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_is_bounded_and_decreasing() {
        assert_eq!(similarity_from_distance(0.0), 1.0);
        assert!((similarity_from_distance(1.0) - 0.5).abs() < 1e-6);
        assert_eq!(similarity_from_distance(2.0), 0.0);
        assert_eq!(similarity_from_distance(5.0), 0.0);
        assert!(similarity_from_distance(0.3) > similarity_from_distance(0.6));
    }
}
