//! Persistence backends for the vector index.
//!
//! A backend stores one vectors + metadata pair per index and must replace it
//! as a unit: after `save` returns, `load` yields the new pair; if `save`
//! fails part-way, `load` still yields the previous one.

use caselake_core::Result;

use crate::snapshot::IndexSnapshot;

mod fs;
mod lance;
mod memory;

pub use fs::FsStorage;
pub use lance::LanceStorage;
pub use memory::MemoryStorage;

pub trait IndexStorage: Send + Sync {
    /// Human-readable location, for logs and `IndexNotFound` messages.
    fn describe(&self) -> String;

    /// `Ok(None)` when no pair has been persisted (either artifact missing).
    fn load(&self) -> Result<Option<IndexSnapshot>>;

    fn save(&self, snapshot: &IndexSnapshot) -> Result<()>;
}
