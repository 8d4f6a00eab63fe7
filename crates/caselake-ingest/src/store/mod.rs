//! File-store collaborators: where case-study documents come from.

mod graph;
mod local;

pub use graph::GraphDriveStore;
pub use local::LocalFolderStore;

use std::path::Path;

use caselake_core::types::PDF_MIME;

/// Mime type from a file name's extension, for stores that don't report one.
pub fn mime_from_name(name: &str) -> &'static str {
    match Path::new(name).extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("pdf") => PDF_MIME,
        Some("txt") | Some("md") => "text/plain",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
