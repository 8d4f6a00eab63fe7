//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RETRIEVAL__TOP_K=12`). Every
//! section of [`Settings`] has defaults, so a missing config file is valid.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    /// Load a single TOML file (plus `APP_*` overrides); used by tools and tests.
    pub fn load_file(path: &Path) -> Result<Self> {
        let figment = Figment::new().merge(Toml::file(path)).merge(Env::prefixed("APP_").split("__"));
        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("Failed to extract settings: {}", e)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
    pub retrieval: RetrievalConfig,
    pub retry: RetryPolicy,
    pub source: SourceConfig,
    pub router: RouterConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.index.dimension == 0 {
            return Err(Error::InvalidConfig("index.dimension must be greater than zero".into()));
        }
        if self.chunking.size == 0 || self.chunking.overlap >= self.chunking.size {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap ({}) must be smaller than chunking.size ({})",
                self.chunking.overlap, self.chunking.size
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be greater than zero".into()));
        }
        self.retrieval.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Fs,
    Lance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub dir: String,
    pub dimension: usize,
    pub backend: IndexBackend,
    pub table: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { dir: "data/index".into(), dimension: 3072, backend: IndexBackend::Fs, table: "chunks".into() }
    }
}

impl IndexConfig {
    pub fn dir_path(&self) -> PathBuf { expand_path(&self.dir) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { size: 800, overlap: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            model: "text-embedding-3-large".into(),
            batch_size: 64,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub timeout_secs: u64,
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            model: "gpt-4.1-mini".into(),
            timeout_secs: 60,
            system_prompt: "You are a market research expert. Answer ONLY using the provided context. \
                            If the context is insufficient, say so clearly."
                .into(),
        }
    }
}

/// Knobs of the retrieval and aggregation engine. All can be overridden per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Minimum similarity in `[0, 1]`; hits scoring below are discarded.
    pub similarity_threshold: f32,
    pub min_chunks_per_source: usize,
    /// Floor on a source's cumulative keyword hits; only used when
    /// `topic_keywords` is non-empty (defaults to 1 there).
    pub min_topic_matches: Option<usize>,
    pub topic_keywords: Vec<String>,
    pub max_sources: usize,
    /// Only hits whose source name contains this (case-insensitive) are considered.
    pub required_keyword: Option<String>,
    /// Only hits from exactly this source are considered.
    pub required_source: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            similarity_threshold: 0.75,
            min_chunks_per_source: 2,
            min_topic_matches: None,
            topic_keywords: Vec::new(),
            max_sources: 3,
            required_keyword: None,
            required_source: None,
        }
    }
}

impl RetrievalConfig {
    pub fn topic_mode(&self) -> bool {
        self.topic_keywords.iter().any(|k| !k.trim().is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::InvalidConfig(format!(
                "retrieval.similarity_threshold must lie in [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.max_sources == 0 {
            return Err(Error::InvalidConfig("retrieval.max_sources must be greater than zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    Graph,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub folder: String,
    /// Root directory whose sub-directories are folders (local store).
    pub root: String,
    pub graph_base_url: String,
    pub drive_id: Option<String>,
    /// Environment variable holding a pre-acquired Graph bearer token.
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Local,
            folder: "CASE_STUDIES".into(),
            root: "data/documents".into(),
            graph_base_url: "https://graph.microsoft.com/v1.0".into(),
            drive_id: None,
            token_env: "GRAPH_TOKEN".into(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Industry/category keywords detected in questions.
    pub categories: Vec<String>,
}

pub const DEFAULT_CATEGORIES: &[&str] = &[
    "fashion", "fmcg", "retail", "automotive", "healthcare", "pharma", "banking", "finance",
    "insurance", "telecom", "technology", "education", "travel", "hospitality", "food",
    "beverage", "real estate", "energy", "media", "e-commerce", "beauty", "electronics",
    "gaming", "sports",
];

impl Default for RouterConfig {
    fn default() -> Self {
        Self { categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
