//! Filesystem pair: `vectors.bin` + `metadata.json` per generation directory.
//!
//! ```text
//! <dir>/CURRENT          -> "gen-000007"
//! <dir>/gen-000007/vectors.bin
//! <dir>/gen-000007/metadata.json
//! ```
//!
//! A save stages both files in a temporary directory, renames it to the next
//! generation and then replaces `CURRENT` through a temp file + rename. A
//! crash at any point leaves `CURRENT` naming a complete pair.
//!
//! Older indexes kept the two files directly in `<dir>` (and may carry the
//! version-1 metadata layout); they are read once and republished as a
//! generation.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use caselake_core::{Error, Result};

use super::IndexStorage;
use crate::snapshot::{decode_metadata, decode_vectors, encode_metadata, encode_vectors, IndexSnapshot};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "metadata.json";
const CURRENT_FILE: &str = "CURRENT";
const GENERATION_PREFIX: &str = "gen-";

pub struct FsStorage {
    dir: PathBuf,
}

impl FsStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn current_generation(&self) -> Result<Option<String>> {
        let pointer = self.dir.join(CURRENT_FILE);
        if !pointer.exists() {
            return Ok(None);
        }
        let name = fs::read_to_string(&pointer)?.trim().to_string();
        if !name.starts_with(GENERATION_PREFIX) || name.contains(['/', '\\']) {
            return Err(Error::Storage(format!("{} holds an invalid generation name '{}'", pointer.display(), name)));
        }
        Ok(Some(name))
    }

    fn next_generation(current: Option<&str>) -> String {
        let n = current
            .and_then(|name| name.strip_prefix(GENERATION_PREFIX))
            .and_then(|n| n.parse::<u64>().ok())
            .map(|n| n + 1)
            .unwrap_or(1);
        format!("{}{:06}", GENERATION_PREFIX, n)
    }

    fn read_pair(dir: &Path) -> Result<Option<(IndexSnapshot, bool)>> {
        let vectors_path = dir.join(VECTORS_FILE);
        let metadata_path = dir.join(METADATA_FILE);
        match (vectors_path.exists(), metadata_path.exists()) {
            (true, true) => {}
            (false, false) => return Ok(None),
            (v, m) => {
                warn!(dir = %dir.display(), vectors = v, metadata = m, "index pair is incomplete; treating as absent");
                return Ok(None);
            }
        }
        let (dimension, vectors) = decode_vectors(&fs::read(&vectors_path)?)?;
        let meta = decode_metadata(&fs::read(&metadata_path)?)?;
        if let Some(meta_dim) = meta.dimension {
            if meta_dim != dimension {
                return Err(Error::Storage(format!(
                    "{} declares dimension {} but {} holds dimension {}",
                    metadata_path.display(),
                    meta_dim,
                    vectors_path.display(),
                    dimension
                )));
            }
        }
        Ok(Some((IndexSnapshot { dimension, vectors, records: meta.records }, meta.upgraded)))
    }

    fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }

    fn remove_flat_layout(&self) {
        for name in [VECTORS_FILE, METADATA_FILE] {
            let path = self.dir.join(name);
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "failed to remove pre-generation index file");
                }
            }
        }
    }
}

impl IndexStorage for FsStorage {
    fn describe(&self) -> String { self.dir.display().to_string() }

    fn load(&self) -> Result<Option<IndexSnapshot>> {
        if let Some(generation) = self.current_generation()? {
            return Ok(Self::read_pair(&self.dir.join(&generation))?.map(|(snapshot, upgraded)| {
                if upgraded {
                    warn!(generation = %generation, "generation holds version-1 metadata");
                }
                snapshot
            }));
        }
        match Self::read_pair(&self.dir)? {
            Some((snapshot, _)) => {
                info!(dir = %self.dir.display(), records = snapshot.records.len(), "upgrading flat index layout");
                self.save(&snapshot)?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let previous = self.current_generation()?;
        let generation = Self::next_generation(previous.as_deref());
        let target = self.dir.join(&generation);
        if target.exists() {
            // left behind by a save that died before publishing
            fs::remove_dir_all(&target)?;
        }

        let staging = tempfile::Builder::new().prefix(".staging-").tempdir_in(&self.dir)?;
        Self::write_file(&staging.path().join(VECTORS_FILE), &encode_vectors(snapshot.dimension, &snapshot.vectors))?;
        Self::write_file(&staging.path().join(METADATA_FILE), &encode_metadata(snapshot.dimension, &snapshot.records)?)?;
        fs::rename(staging.path(), &target)?;

        let mut pointer = tempfile::NamedTempFile::new_in(&self.dir)?;
        pointer.write_all(generation.as_bytes())?;
        pointer.as_file().sync_all()?;
        pointer.persist(self.dir.join(CURRENT_FILE)).map_err(|e| Error::Io(e.error))?;
        debug!(dir = %self.dir.display(), generation = %generation, vectors = snapshot.vector_count(), "published index generation");

        if let Some(old) = previous {
            if let Err(e) = fs::remove_dir_all(self.dir.join(&old)) {
                warn!(generation = %old, error = %e, "failed to remove superseded index generation");
            }
        }
        self.remove_flat_layout();
        Ok(())
    }
}
