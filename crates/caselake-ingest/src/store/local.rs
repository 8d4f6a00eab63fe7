use std::fs;
use std::path::PathBuf;

use tracing::debug;
use walkdir::WalkDir;

use caselake_core::traits::FileStore;
use caselake_core::types::DocumentRef;
use caselake_core::{Error, Result};

use super::mime_from_name;

/// A directory whose immediate sub-directories act as folders. Document ids
/// are file paths.
pub struct LocalFolderStore {
    root: PathBuf,
}

impl LocalFolderStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }
}

impl FileStore for LocalFolderStore {
    fn resolve_folder(&self, name: &str) -> Result<String> {
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Err(Error::FolderNotFound(name.to_string()));
        }
        Ok(dir.to_string_lossy().into_owned())
    }

    fn list_documents(&self, folder_id: &str) -> Result<Vec<DocumentRef>> {
        let mut docs = Vec::new();
        for entry in WalkDir::new(folder_id).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Storage(format!("listing {}: {}", folder_id, e)))?;
            if !entry.file_type().is_file() { continue; }
            let name = entry.file_name().to_string_lossy().into_owned();
            docs.push(DocumentRef {
                id: entry.path().to_string_lossy().into_owned(),
                mime_type: mime_from_name(&name).to_string(),
                name,
            });
        }
        debug!(folder = folder_id, files = docs.len(), "listed local folder");
        Ok(docs)
    }

    fn fetch_content(&self, id: &str) -> Result<Vec<u8>> {
        Ok(fs::read(id)?)
    }
}
