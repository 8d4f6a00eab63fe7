//! PDF text extraction using lopdf.

use lopdf::Document;
use tracing::debug;

use caselake_core::traits::TextExtractor;
use caselake_core::{Error, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self { Self }
}

impl TextExtractor for PdfTextExtractor {
    /// Pages in page-number order. A page whose text can't be decoded is
    /// `None`; only an unparseable file is an error.
    fn extract_pages(&self, name: &str, bytes: &[u8]) -> Result<Vec<Option<String>>> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| Error::InvalidDocument { name: name.to_string(), reason: format!("Failed to load PDF: {}", e) })?;

        let mut page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        page_numbers.sort_unstable();

        Ok(page_numbers
            .into_iter()
            .map(|page| match doc.extract_text(&[page]) {
                Ok(text) => Some(text),
                Err(e) => {
                    debug!(document = name, page, error = %e, "no text on page");
                    None
                }
            })
            .collect())
    }
}
