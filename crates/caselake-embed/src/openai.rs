//! OpenAI-compatible HTTP plumbing and the embeddings provider.
//!
//! Any server exposing `/embeddings` and `/chat/completions` with the OpenAI
//! wire format works (OpenAI, Azure-style gateways, LM Studio, vLLM).

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use caselake_core::config::EmbeddingConfig;
use caselake_core::traits::Embedder;
use caselake_core::{Error, Result};

pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::InvalidConfig(format!("Failed to build HTTP client: {}", e)))
}

pub fn api_key_from_env(var: &str) -> Result<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::InvalidConfig(format!("environment variable {} is not set", var)))
}

/// Throttling, timeouts and server errors are transient.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT || status.is_server_error()
}

pub fn transport_error(provider: &str, err: &reqwest::Error) -> Error {
    let retryable = err.is_timeout() || err.is_connect() || err.is_request();
    Error::provider(provider, err.to_string(), retryable)
}

pub fn post_json<B, R>(client: &Client, url: &str, api_key: &str, body: &B, provider: &str) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let res = client
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .map_err(|e| transport_error(provider, &e))?;
    let status = res.status();
    if !status.is_success() {
        let detail: String = res.text().unwrap_or_default().chars().take(512).collect();
        return Err(Error::provider(provider, format!("HTTP {}: {}", status, detail), is_retryable_status(status)));
    }
    res.json::<R>()
        .map_err(|e| Error::provider(provider, format!("invalid response body: {}", e), false))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    dim: usize,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: &str, api_key: String, model: &str, dim: usize, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            dim,
            id: format!("openai:{}:d{}", model, dim),
        })
    }

    pub fn from_config(config: &EmbeddingConfig, dim: usize) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env)?;
        Self::new(&config.base_url, api_key, &config.model, dim, Duration::from_secs(config.timeout_secs))
    }
}

impl Embedder for OpenAiEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let body = EmbeddingRequest { model: &self.model, input: texts, encoding_format: "float" };
        let mut res: EmbeddingResponse = post_json(&self.client, &self.url, &self.api_key, &body, "embeddings")?;
        debug!(inputs = texts.len(), outputs = res.data.len(), model = %self.model, "embedding batch");
        // the API documents `index` as the input position; don't rely on response order
        res.data.sort_by_key(|item| item.index);
        Ok(res.data.into_iter().map(|item| item.embedding).collect())
    }
}
