use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::info;
use twox_hash::XxHash64;

use caselake_core::config::EmbeddingConfig;
use caselake_core::Result;

pub mod gateway;
pub mod openai;

pub use caselake_core::traits::Embedder;
pub use gateway::EmbeddingGateway;
pub use openai::OpenAiEmbedder;

/// Deterministic token-hashing embedder. Vectors are L2-normalized; texts
/// sharing tokens land close together, which is enough for tests and
/// offline development.
pub struct FakeEmbedder { dim: usize, id: String }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, id: format!("fake:xxhash:d{}", dim) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// The configured provider, or the [`FakeEmbedder`] when
/// `APP_USE_FAKE_EMBEDDINGS=1`.
pub fn get_default_embedder(config: &EmbeddingConfig, dim: usize) -> Result<Arc<dyn Embedder>> {
    if use_fake_embeddings() {
        info!(dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(dim)));
    }
    info!(model = %config.model, dim, "using OpenAI-compatible embeddings");
    Ok(Arc::new(OpenAiEmbedder::from_config(config, dim)?))
}
