//! Flat L2 vector index over a persisted vectors + metadata pair.

use std::sync::Arc;

use caselake_core::config::{IndexBackend, IndexConfig};
use caselake_core::Result;

pub mod index;
pub mod schema;
pub mod snapshot;
pub mod storage;

pub use index::{similarity_from_distance, VectorIndex};
pub use snapshot::IndexSnapshot;
pub use storage::{FsStorage, IndexStorage, LanceStorage, MemoryStorage};

/// Storage backend selected by `index.backend`, rooted at `index.dir`.
pub fn open_storage(config: &IndexConfig) -> Result<Arc<dyn IndexStorage>> {
    let dir = config.dir_path();
    Ok(match config.backend {
        IndexBackend::Fs => Arc::new(FsStorage::new(dir)),
        IndexBackend::Lance => Arc::new(LanceStorage::open(&dir, &config.table)?),
    })
}
