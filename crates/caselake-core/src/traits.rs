use crate::error::Result;
use crate::types::DocumentRef;

/// Text to vector. Implementations return one vector per input, in input order.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-3-large`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// (system prompt, user prompt) to completion text.
pub trait ChatModel: Send + Sync {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Remote or local document collection addressed by folder name.
pub trait FileStore: Send + Sync {
    fn resolve_folder(&self, name: &str) -> Result<String>;
    fn list_documents(&self, folder_id: &str) -> Result<Vec<DocumentRef>>;
    fn fetch_content(&self, id: &str) -> Result<Vec<u8>>;
}

/// Extracts per-page text from document bytes. `None` marks a page with no
/// extractable text.
pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self, name: &str, bytes: &[u8]) -> Result<Vec<Option<String>>>;
}
