//! Question answering over the case-study index.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use caselake_core::config::{RetrievalConfig, Settings};
use caselake_core::retry::RetryPolicy;
use caselake_core::traits::ChatModel;
use caselake_core::types::HealthReport;
use caselake_core::Result;
use caselake_embed::{get_default_embedder, EmbeddingGateway};
use caselake_vector::{open_storage, VectorIndex};

pub mod chat;
pub mod retrieval;
pub mod router;

pub use chat::OpenAiChat;
pub use retrieval::{aggregate, retrieve, Retrieval};
pub use router::{Intent, IntentClassifier, PhraseClassifier, Route};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Ranked for RAG answers; sorted for listing and existence answers.
    pub sources: Vec<String>,
    pub intent: Intent,
}

/// Per-call overrides of the configured retrieval knobs.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Overrides the keyword the router detects for RAG questions.
    pub required_keyword: Option<String>,
    pub top_k: Option<usize>,
    pub similarity_threshold: Option<f32>,
    pub min_chunks_per_source: Option<usize>,
    pub min_topic_matches: Option<usize>,
    pub topic_keywords: Option<Vec<String>>,
    pub max_sources: Option<usize>,
}

impl AskOptions {
    fn apply(&self, base: &RetrievalConfig) -> RetrievalConfig {
        let mut c = base.clone();
        if let Some(v) = self.top_k { c.top_k = v; }
        if let Some(v) = self.similarity_threshold { c.similarity_threshold = v; }
        if let Some(v) = self.min_chunks_per_source { c.min_chunks_per_source = v; }
        if let Some(v) = self.min_topic_matches { c.min_topic_matches = Some(v); }
        if let Some(v) = &self.topic_keywords { c.topic_keywords = v.clone(); }
        if let Some(v) = self.max_sources { c.max_sources = v; }
        c
    }
}

pub struct RagService {
    index: Arc<VectorIndex>,
    gateway: EmbeddingGateway,
    chat: Arc<dyn ChatModel>,
    classifier: Box<dyn IntentClassifier>,
    retrieval: RetrievalConfig,
    system_prompt: String,
    retry: RetryPolicy,
}

impl RagService {
    pub fn new(
        index: Arc<VectorIndex>,
        gateway: EmbeddingGateway,
        chat: Arc<dyn ChatModel>,
        classifier: Box<dyn IntentClassifier>,
        retrieval: RetrievalConfig,
        system_prompt: impl Into<String>,
    ) -> Result<Self> {
        if gateway.dim() != index.dimension() {
            return Err(caselake_core::Error::DimensionMismatch { expected: index.dimension(), actual: gateway.dim() });
        }
        retrieval.validate()?;
        Ok(Self {
            index,
            gateway,
            chat,
            classifier,
            retrieval,
            system_prompt: system_prompt.into(),
            retry: RetryPolicy::none(),
        })
    }

    /// Retry policy for chat calls. Embedding retries live in the gateway.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Service over an index that must already exist.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let dim = settings.index.dimension;
        let index = Arc::new(VectorIndex::open_existing(open_storage(&settings.index)?, dim)?);
        let embedder = get_default_embedder(&settings.embedding, dim)?;
        let gateway = EmbeddingGateway::new(embedder, dim, settings.embedding.batch_size, settings.retry.clone())?;
        let chat = Arc::new(OpenAiChat::from_config(&settings.chat)?);
        let classifier = Box::new(PhraseClassifier::new(&settings.router.categories));
        Ok(Self::new(index, gateway, chat, classifier, settings.retrieval.clone(), settings.chat.system_prompt.clone())?
            .with_retry(settings.retry.clone()))
    }

    pub fn check_health(&self) -> HealthReport { self.index.health() }

    pub fn sources(&self) -> Vec<String> { self.index.sources() }

    pub fn ask(&self, question: &str, required_keyword: Option<&str>) -> Result<Answer> {
        let options = AskOptions { required_keyword: required_keyword.map(str::to_string), ..AskOptions::default() };
        self.ask_with(question, &options)
    }

    pub fn ask_with(&self, question: &str, options: &AskOptions) -> Result<Answer> {
        let known = self.index.sources();
        let route = self.classifier.classify(question, &known);
        let intent = route.intent();
        info!(%intent, "routing question");

        let mut config = options.apply(&self.retrieval);
        match (options.required_keyword.clone(), route) {
            (_, Route::Listing) => {
                return Ok(Answer { text: router::listing_answer(&known), sources: known, intent });
            }
            (_, Route::Existence { category }) => {
                let (text, sources) = router::existence_answer(category.as_deref(), &known);
                return Ok(Answer { text, sources, intent });
            }
            (Some(keyword), _) => config.required_keyword = Some(keyword),
            (None, Route::Document { source }) => config.required_source = Some(source),
            (None, Route::General { category }) => {
                config.required_keyword = category.or(config.required_keyword);
            }
        }
        debug!(keyword = ?config.required_keyword, source = ?config.required_source, top_k = config.top_k, "retrieving");

        let query = self.gateway.embed_one(question)?;
        let retrieval = retrieve(&self.index, &query, &config)?;
        let user_prompt = format!("Context:\n{}\n\nQuestion: {}", retrieval.context, question);
        let text = self.retry.run("chat completion", || self.chat.complete(&self.system_prompt, &user_prompt))?;
        Ok(Answer { text, sources: retrieval.sources, intent })
    }
}
