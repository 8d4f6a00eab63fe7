use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use caselake_core::retry::RetryPolicy;
use caselake_core::{Error, Result};
use caselake_embed::{Embedder, EmbeddingGateway, FakeEmbedder};

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::new(64);
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 64);

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

/// Echoes the input position into the first component and counts calls.
struct Recording { dim: usize, calls: AtomicUsize, failures_left: AtomicUsize, short_by: usize }

impl Recording {
    fn new(dim: usize) -> Self { Self { dim, calls: AtomicUsize::new(0), failures_left: AtomicUsize::new(0), short_by: 0 } }
}

impl Embedder for Recording {
    fn embedder_id(&self) -> &str { "recording" }
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::provider("recording", "503 Service Unavailable", true));
        }
        let n = texts.len().saturating_sub(self.short_by);
        Ok(texts[..n].iter().map(|t| {
            let mut v = vec![0.0; self.dim];
            v[0] = t.parse::<f32>().unwrap_or(-1.0);
            v
        }).collect())
    }
}

fn no_wait() -> RetryPolicy { RetryPolicy { max_attempts: 3, base_delay_ms: 0 } }

#[test]
fn embed_many_batches_and_preserves_order() {
    let inner = Arc::new(Recording::new(4));
    let gateway = EmbeddingGateway::new(inner.clone(), 4, 3, no_wait()).expect("gateway");
    let texts: Vec<String> = (0..10).map(|i| i.to_string()).collect();
    let mut seen = Vec::new();
    let out = gateway.embed_many_with(&texts, |done| seen.push(done)).expect("embed");
    assert_eq!(out.len(), 10);
    for (i, v) in out.iter().enumerate() { assert_eq!(v[0], i as f32); }
    assert_eq!(inner.calls.load(Ordering::SeqCst), 4, "10 texts in batches of 3");
    assert_eq!(seen, vec![3, 6, 9, 10]);
}

#[test]
fn gateway_rejects_provider_with_wrong_dimension() {
    let err = EmbeddingGateway::new(Arc::new(FakeEmbedder::new(8)), 3072, 16, no_wait()).err().expect("mismatch");
    assert!(matches!(err, Error::DimensionMismatch { expected: 3072, actual: 8 }));
}

#[test]
fn transient_failures_are_retried() {
    let inner = Arc::new(Recording::new(2));
    inner.failures_left.store(2, Ordering::SeqCst);
    let gateway = EmbeddingGateway::new(inner.clone(), 2, 8, no_wait()).expect("gateway");
    let v = gateway.embed_one("7").expect("embed after retries");
    assert_eq!(v[0], 7.0);
    assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn short_provider_response_is_an_error() {
    let mut inner = Recording::new(2);
    inner.short_by = 1;
    let gateway = EmbeddingGateway::new(Arc::new(inner), 2, 8, no_wait()).expect("gateway");
    let err = gateway.embed_many(&["1".into(), "2".into()]).unwrap_err();
    assert!(matches!(err, Error::Provider { retryable: false, .. }));
}
