//! # scan2struct
//!
//! Turn scanned documents into pages a vision model can read, and turn the
//! model's free-text replies back into typed records.
//!
//! ## Two halves
//!
//! **Normalization.** A PDF or raster image of unknown quality becomes an
//! ordered sequence of bounded-size JPEG pages. PDFs are rasterised with
//! pdfium when it is available; otherwise their text layer is extracted and
//! drawn onto synthetic pages so the pipeline never dead-ends.
//!
//! **Recovery.** Model output arrives fenced, chatty or cut off mid-string.
//! It is cleaned, repaired where a conservative heuristic suffices, and
//! parsed into the expected shape. When that fails the result is a degraded
//! record with neutral values and the raw reply attached, never an error.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Input      local file or URL; kind sniffed from magic bytes
//!  ├─ 2. Normalize  image → encode │ pdf → rasterize ⟶ text-synthesis
//!  ├─ 3. Ceiling    drop pages past max_pages
//!  ├─ 4. Vision     pages + instruction → raw text
//!  ├─ 5. Clean      fences, prose, truncation repair
//!  └─ 6. Recover    typed record, or degraded record + raw text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scan2struct::{normalize, recover, DocumentAnalysis, PipelineConfig, RawDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let doc = RawDocument::pdf(std::fs::read("homework.pdf")?, "homework.pdf");
//!     let pages = normalize(&doc, &config).await?;
//!     eprintln!("{} page(s), {} bytes", pages.len(), pages.total_bytes());
//!
//!     // …send `pages` to a model, get `reply` back…
//!     let reply = "```json\n{\"score\": 90}\n```";
//!     let record = recover::<DocumentAnalysis>(reply);
//!     println!("score = {}", record.value().score);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scan2struct` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Runtime requirements
//!
//! Rasterisation binds the pdfium shared library at call time
//! (`PDFIUM_LIB_PATH`, next to the executable, or the system library path).
//! Without it PDFs still normalize through text synthesis. Synthesis draws
//! with a system TrueType font, or the one named by `font_path`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod document;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod records;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze_text, extract_content, process_document, DocumentResult};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use document::{FileKind, Page, PageEncoding, PageSequence, RawDocument};
pub use error::{CapabilityError, EncodingError, RasterError, Scan2StructError, TierFailure};
pub use normalize::{normalize, normalize_sync, normalize_with_report, NormalizeReport, Normalizer};
pub use pipeline::clean::{clean, Cleaner, RepairStrategy};
pub use pipeline::encode::encode;
pub use pipeline::input::load_document;
pub use pipeline::llm::{GenerativeCapability, LlmCapability};
pub use pipeline::pdf::{PageStrategy, PdfPageExtractor, StrategyOutput};
pub use pipeline::recover::{recover, DegradeReason, ExpectedShape, Recovered, RecoveryState};
pub use pipeline::text_render::TextPageRenderer;
pub use progress::{NoopProgressCallback, NormalizeProgressCallback, ProgressCallback};
pub use records::{AnalysisIssue, ContentExtraction, DocumentAnalysis};
