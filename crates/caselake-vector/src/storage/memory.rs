use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use caselake_core::{Error, Result};

use super::IndexStorage;
use crate::snapshot::IndexSnapshot;

/// In-process storage for tests and throwaway indexes.
#[derive(Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<IndexSnapshot>>,
    saves: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    /// Storage that already holds `snapshot`, as if a previous process had
    /// saved it. The snapshot may be misaligned, to model a corrupted pair.
    pub fn with_snapshot(snapshot: IndexSnapshot) -> Self {
        Self { slot: Mutex::new(Some(snapshot)), saves: AtomicUsize::new(0) }
    }

    pub fn save_count(&self) -> usize { self.saves.load(Ordering::SeqCst) }
}

impl IndexStorage for MemoryStorage {
    fn describe(&self) -> String { "memory".to_string() }

    fn load(&self) -> Result<Option<IndexSnapshot>> {
        let slot = self.slot.lock().map_err(|_| Error::Storage("memory storage lock poisoned".into()))?;
        Ok(slot.clone())
    }

    fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|_| Error::Storage("memory storage lock poisoned".into()))?;
        *slot = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
