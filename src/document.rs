//! Value types flowing through normalization.
//!
//! A [`RawDocument`] goes in, a [`PageSequence`] comes out. Nothing here is
//! shared between calls: each normalization owns its document and returns a
//! fresh sequence.

use crate::error::Scan2StructError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Declared kind of an uploaded file.
///
/// `Other` keeps whatever the caller declared so an unsupported kind can be
/// reported by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Image,
    Other(String),
}

impl FileKind {
    /// Map a declared kind, MIME type or file extension onto a `FileKind`.
    pub fn from_declared(declared: &str) -> Self {
        let d = declared.trim().trim_start_matches('.').to_ascii_lowercase();
        match d.as_str() {
            "pdf" | "application/pdf" => FileKind::Pdf,
            "image" | "png" | "jpg" | "jpeg" | "gif" | "webp" | "tif" | "tiff" | "bmp" => {
                FileKind::Image
            }
            m if m.starts_with("image/") => FileKind::Image,
            _ => FileKind::Other(d),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Pdf => f.write_str("pdf"),
            FileKind::Image => f.write_str("image"),
            FileKind::Other(k) => f.write_str(k),
        }
    }
}

/// An uploaded file: opaque bytes plus a declared kind and display name.
#[derive(Clone)]
pub struct RawDocument {
    bytes: Vec<u8>,
    kind: FileKind,
    name: String,
}

impl RawDocument {
    pub fn new(bytes: Vec<u8>, kind: FileKind, name: impl Into<String>) -> Self {
        Self {
            bytes,
            kind,
            name: name.into(),
        }
    }

    pub fn pdf(bytes: Vec<u8>, name: impl Into<String>) -> Self {
        Self::new(bytes, FileKind::Pdf, name)
    }

    pub fn image(bytes: Vec<u8>, name: impl Into<String>) -> Self {
        Self::new(bytes, FileKind::Image, name)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn kind(&self) -> &FileKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for RawDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawDocument")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Codec of an encoded page payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageEncoding {
    Jpeg,
}

impl PageEncoding {
    pub fn mime_type(self) -> &'static str {
        match self {
            PageEncoding::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            PageEncoding::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for PageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageEncoding::Jpeg => f.write_str("jpeg"),
        }
    }
}

/// One bounded-size encoded raster page.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Encoded image bytes.
    #[serde(skip)]
    pub data: Vec<u8>,
    pub encoding: PageEncoding,
    pub width: u32,
    pub height: u32,
    /// Markup-escaped text drawn onto a synthesised page. `None` for pages
    /// rasterised from real page content.
    pub text_layer: Option<String>,
}

impl Page {
    pub fn mime_type(&self) -> &'static str {
        self.encoding.mime_type()
    }

    /// Base64-wrap the page for a multimodal request body.
    ///
    /// `detail: "high"` lets GPT-4-class models tile the full image instead of
    /// a single downscaled overview, which matters for small print.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(STANDARD.encode(&self.data), self.mime_type()).with_detail("high")
    }

    /// `true` when the page was synthesised from extracted text.
    pub fn is_synthesized(&self) -> bool {
        self.text_layer.is_some()
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("encoding", &self.encoding)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .field("synthesized", &self.is_synthesized())
            .finish()
    }
}

/// Ordered pages derived from one document. Order is page order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSequence {
    pages: Vec<Page>,
}

impl PageSequence {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    pub fn single(page: Page) -> Self {
        Self { pages: vec![page] }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Page> {
        self.pages.iter()
    }

    /// Drop pages beyond `max`, returning how many were dropped.
    pub fn truncate(&mut self, max: usize) -> usize {
        let dropped = self.pages.len().saturating_sub(max);
        self.pages.truncate(max);
        dropped
    }

    /// Sum of encoded payload sizes.
    pub fn total_bytes(&self) -> usize {
        self.pages.iter().map(|p| p.data.len()).sum()
    }

    /// Base64 image attachments in page order.
    pub fn to_image_data(&self) -> Vec<ImageData> {
        self.pages.iter().map(Page::to_image_data).collect()
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }

    /// Write each page to `dir` as `page-001.jpg`, `page-002.jpg`, …
    ///
    /// Creates `dir` if needed. Returns the written paths in page order.
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, Scan2StructError> {
        std::fs::create_dir_all(dir).map_err(|source| Scan2StructError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source,
        })?;
        self.pages
            .iter()
            .enumerate()
            .map(|(i, page)| {
                let path = dir.join(format!("page-{:03}.{}", i + 1, page.encoding.extension()));
                std::fs::write(&path, &page.data).map_err(|source| {
                    Scan2StructError::OutputWriteFailed {
                        path: path.clone(),
                        source,
                    }
                })?;
                Ok(path)
            })
            .collect()
    }
}

impl IntoIterator for PageSequence {
    type Item = Page;
    type IntoIter = std::vec::IntoIter<Page>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.into_iter()
    }
}

impl<'a> IntoIterator for &'a PageSequence {
    type Item = &'a Page;
    type IntoIter = std::slice::Iter<'a, Page>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u8) -> Page {
        Page {
            data: vec![n; 4],
            encoding: PageEncoding::Jpeg,
            width: 10,
            height: 10,
            text_layer: None,
        }
    }

    #[test]
    fn file_kind_from_declared() {
        assert_eq!(FileKind::from_declared("pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_declared(".PDF"), FileKind::Pdf);
        assert_eq!(FileKind::from_declared("application/pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_declared("image/png"), FileKind::Image);
        assert_eq!(FileKind::from_declared("JPG"), FileKind::Image);
        assert_eq!(
            FileKind::from_declared("docx"),
            FileKind::Other("docx".into())
        );
        assert_eq!(FileKind::Other("docx".into()).to_string(), "docx");
    }

    #[test]
    fn truncate_reports_dropped() {
        let mut seq = PageSequence::new((0..5).map(page).collect());
        assert_eq!(seq.truncate(3), 2);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.pages()[2].data, vec![2; 4]);
        assert_eq!(seq.truncate(10), 0);
    }

    #[test]
    fn image_data_is_jpeg_base64() {
        let data = page(7).to_image_data();
        assert_eq!(data.mime_type, "image/jpeg");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, vec![7; 4]);
    }

    #[test]
    fn writes_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("pages");
        let seq = PageSequence::new(vec![page(1), page(2)]);

        let paths = seq.write_to_dir(&out).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("page-001.jpg"));
        assert_eq!(std::fs::read(&paths[1]).unwrap(), vec![2; 4]);
    }

    #[test]
    fn raw_document_debug_hides_bytes() {
        let doc = RawDocument::pdf(vec![0; 1024], "a.pdf");
        let dbg = format!("{doc:?}");
        assert!(dbg.contains("1024"));
        assert!(dbg.contains("a.pdf"));
    }
}
