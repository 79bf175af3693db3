//! Text-layer extraction: pull embedded text out of a PDF.
//!
//! Used by tier 2 when pages cannot be rasterised. Scanned PDFs have no text
//! layer and yield an empty string, which is not an error.

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Extracts the full text layer of a PDF.
pub trait TextExtractor: Send + Sync {
    /// Return all embedded text in reading order, possibly empty.
    ///
    /// `Err` carries a human-readable reason; the caller decides whether it
    /// is fatal.
    fn extract_text(&self, pdf: &[u8]) -> Result<String, String>;
}

/// Text extractor using the pdf-extract crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, pdf: &[u8]) -> Result<String, String> {
        // pdf-extract panics on some malformed font tables.
        let result = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(pdf)));
        match result {
            Ok(Ok(text)) => {
                debug!("Extracted {} chars of embedded text", text.chars().count());
                Ok(text)
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => {
                warn!("pdf-extract panicked while reading the text layer");
                Err("text extraction panicked on a malformed document".into())
            }
        }
    }
}
