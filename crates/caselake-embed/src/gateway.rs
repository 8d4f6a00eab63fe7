use std::sync::Arc;

use tracing::debug;

use caselake_core::retry::RetryPolicy;
use caselake_core::traits::Embedder;
use caselake_core::{Error, Result};

/// Wraps an [`Embedder`] with batching, retries and output validation.
///
/// The configured dimension is shared with the vector index: a provider that
/// disagrees with it is rejected at construction, and any vector of the wrong
/// length is reported as `DimensionMismatch`.
pub struct EmbeddingGateway {
    embedder: Arc<dyn Embedder>,
    dim: usize,
    batch_size: usize,
    retry: RetryPolicy,
}

impl EmbeddingGateway {
    pub fn new(embedder: Arc<dyn Embedder>, dim: usize, batch_size: usize, retry: RetryPolicy) -> Result<Self> {
        if embedder.dim() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: embedder.dim() });
        }
        if batch_size == 0 {
            return Err(Error::InvalidConfig("embedding batch size must be greater than zero".into()));
        }
        Ok(Self { embedder, dim, batch_size, retry })
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch_checked(&[text.to_string()])?;
        out.pop().ok_or_else(|| Error::provider(self.embedder.embedder_id(), "empty embedding response", false))
    }

    pub fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_many_with(texts, |_| {})
    }

    /// Like [`embed_many`](Self::embed_many), reporting the number of texts
    /// embedded after every provider batch.
    pub fn embed_many_with<F>(&self, texts: &[String], mut progress: F) -> Result<Vec<Vec<f32>>>
    where
        F: FnMut(usize),
    {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_batch_checked(batch)?);
            progress(out.len());
        }
        Ok(out)
    }

    fn embed_batch_checked(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let id = self.embedder.embedder_id();
        let vectors = self.retry.run("embedding", || self.embedder.embed_batch(batch))?;
        if vectors.len() != batch.len() {
            return Err(Error::provider(
                id,
                format!("returned {} vectors for {} inputs", vectors.len(), batch.len()),
                false,
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: bad.len() });
        }
        debug!(embedder = id, batch = batch.len(), "embedded batch");
        Ok(vectors)
    }
}
