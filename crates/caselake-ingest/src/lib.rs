use std::sync::Arc;

use caselake_core::chunker::Chunker;
use caselake_core::config::{Settings, SourceKind};
use caselake_core::traits::FileStore;
use caselake_core::Result;
use caselake_embed::{get_default_embedder, EmbeddingGateway};
use caselake_vector::{open_storage, VectorIndex};

pub mod pdf;
pub mod pipeline;
pub mod store;

pub use pdf::PdfTextExtractor;
pub use pipeline::{IngestPipeline, IngestReport};
pub use store::{GraphDriveStore, LocalFolderStore};

pub fn file_store_from_settings(settings: &Settings) -> Result<Arc<dyn FileStore>> {
    Ok(match settings.source.kind {
        SourceKind::Local => Arc::new(LocalFolderStore::new(caselake_core::config::expand_path(&settings.source.root))),
        SourceKind::Graph => Arc::new(GraphDriveStore::from_config(&settings.source, settings.retry.clone())?),
    })
}

/// Wires the configured store, PDF extractor, embedder and index. The chunker
/// is validated first so a bad chunking config never reaches `reset()`.
pub fn pipeline_from_settings(settings: &Settings) -> Result<IngestPipeline> {
    let chunker = Chunker::from_config(&settings.chunking)?;
    let dim = settings.index.dimension;
    let embedder = get_default_embedder(&settings.embedding, dim)?;
    let gateway = EmbeddingGateway::new(embedder, dim, settings.embedding.batch_size, settings.retry.clone())?;
    let index = Arc::new(VectorIndex::open_or_create(open_storage(&settings.index)?, dim)?);
    IngestPipeline::new(
        file_store_from_settings(settings)?,
        Arc::new(PdfTextExtractor::new()),
        gateway,
        index,
        chunker,
        settings.source.folder.clone(),
    )
}
