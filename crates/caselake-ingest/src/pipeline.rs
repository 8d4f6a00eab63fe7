use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use caselake_core::chunker::Chunker;
use caselake_core::traits::{FileStore, TextExtractor};
use caselake_core::types::{Chunk, IndexedRecord};
use caselake_core::{Error, Result};
use caselake_embed::EmbeddingGateway;
use caselake_vector::VectorIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// PDF documents listed in the folder.
    pub documents: usize,
    /// Documents skipped because they had no extractable text.
    pub skipped: usize,
    pub chunks: usize,
}

/// Full rebuild of the index from one file-store folder.
///
/// The run starts with `reset()`. Any failure afterwards aborts the run and
/// leaves the index empty; nothing is added until every document has been
/// fetched, extracted and chunked.
pub struct IngestPipeline {
    store: Arc<dyn FileStore>,
    extractor: Arc<dyn TextExtractor>,
    gateway: EmbeddingGateway,
    index: Arc<VectorIndex>,
    chunker: Chunker,
    folder: String,
    show_progress: bool,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn FileStore>,
        extractor: Arc<dyn TextExtractor>,
        gateway: EmbeddingGateway,
        index: Arc<VectorIndex>,
        chunker: Chunker,
        folder: impl Into<String>,
    ) -> Result<Self> {
        if gateway.dim() != index.dimension() {
            return Err(Error::DimensionMismatch { expected: index.dimension(), actual: gateway.dim() });
        }
        Ok(Self { store, extractor, gateway, index, chunker, folder: folder.into(), show_progress: false })
    }

    /// Draw an embedding progress bar on stderr.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn run(&self) -> Result<IngestReport> {
        self.index.reset()?;

        let folder_id = self.store.resolve_folder(&self.folder)?;
        let documents: Vec<_> = self.store.list_documents(&folder_id)?.into_iter().filter(|d| d.is_pdf()).collect();
        if documents.is_empty() {
            return Err(Error::NoDocumentsFound(self.folder.clone()));
        }
        info!(folder = %self.folder, documents = documents.len(), "ingesting");

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut skipped = 0;
        for doc in &documents {
            let bytes = self.store.fetch_content(&doc.id)?;
            let pages = self.extractor.extract_pages(&doc.name, &bytes)?;
            let text = pages.into_iter().map(Option::unwrap_or_default).collect::<Vec<_>>().join(" ");
            if text.trim().is_empty() {
                info!(document = %doc.name, "no extractable text; skipping");
                skipped += 1;
                continue;
            }
            let doc_chunks = self.chunker.chunk_document(&text, &doc.name);
            debug!(document = %doc.name, chunks = doc_chunks.len(), "chunked");
            chunks.extend(doc_chunks);
        }
        if chunks.is_empty() {
            return Err(Error::NoExtractableContent { documents: documents.len() });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let bar = self.progress_bar(texts.len());
        let vectors = self.gateway.embed_many_with(&texts, |done| bar.set_position(done as u64));
        bar.finish_and_clear();
        let vectors = vectors?;

        let total = chunks.len();
        self.index.add(vectors, chunks.into_iter().map(IndexedRecord::from).collect())?;
        info!(chunks = total, documents = documents.len(), skipped, "ingestion complete");
        Ok(IngestReport { documents: documents.len(), skipped, chunks: total })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks embedded ({percent}%)")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}
