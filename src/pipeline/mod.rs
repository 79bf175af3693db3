//! Pipeline stages.
//!
//! Each submodule implements one transformation step, so each is testable on
//! its own and a backend (rasteriser, text extractor, model provider) can be
//! swapped behind its trait without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pdf ─┬─ rasterize ──▶ encode ─┐
//!                └─ text_extract ──▶ text_render (sanitize, encode) ─┴─▶ pages
//!
//! pages ──▶ llm ──▶ clean ──▶ recover ──▶ record
//! ```
//!
//! 1. [`input`]       : load a path or URL, sniff the file kind
//! 2. [`rasterize`]   : render one PDF page via pdfium
//! 3. [`text_extract`]: read the PDF text layer via pdf-extract
//! 4. [`pdf`]         : the ordered page strategies and their fallback
//! 5. [`encode`]      : bound and JPEG-encode a raster
//! 6. [`sanitize`] / [`text_render`]: draw extracted text onto a synthetic page
//! 7. [`llm`]         : model calls with retry/backoff; the only network stage
//!    besides URL input
//! 8. [`clean`]       : strip fences and prose, repair truncation
//! 9. [`recover`]     : parse into a typed record or degrade

pub mod clean;
pub mod encode;
pub mod input;
pub mod llm;
pub mod pdf;
pub mod rasterize;
pub mod recover;
pub mod sanitize;
pub mod text_extract;
pub mod text_render;
