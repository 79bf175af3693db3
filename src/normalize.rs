//! Document normalization: any supported upload → bounded page sequence.
//!
//! Dispatch is purely on the declared [`FileKind`]:
//!
//! * `image` → the raster encoder, as a one-page sequence
//! * `pdf`   → the [`PdfPageExtractor`] strategy list
//! * anything else → [`Scan2StructError::UnsupportedFileKind`]
//!
//! Whichever path produced the pages, the page-count ceiling is applied last;
//! pages past it are dropped and counted in the report, never an error. The
//! count includes source pages a strategy never produced because it stopped
//! at the ceiling.
//!
//! Rasterisation, text extraction and JPEG encoding are CPU-bound and pdfium
//! is not async-safe, so the async entry points run the work under
//! `tokio::task::spawn_blocking`.

use crate::config::PipelineConfig;
use crate::document::{FileKind, PageSequence, RawDocument};
use crate::error::{Scan2StructError, TierFailure};
use crate::pipeline::encode::encode;
use crate::pipeline::pdf::PdfPageExtractor;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Strategy name reported for single-image documents.
pub const IMAGE: &str = "image";

/// Pages plus an account of how they were produced.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizeReport {
    pub pages: PageSequence,
    /// `image`, or the name of the PDF strategy that succeeded.
    pub strategy: &'static str,
    /// PDF strategies that gave up before `strategy` succeeded.
    pub skipped: Vec<TierFailure>,
    /// Source pages left out because of the page-count ceiling.
    pub dropped: usize,
}

/// Reusable normalizer. Cheap to clone.
#[derive(Clone)]
pub struct Normalizer {
    extractor: Arc<PdfPageExtractor>,
    config: PipelineConfig,
}

impl Normalizer {
    /// Normalizer with the standard pdfium → text-synthesis strategies.
    pub fn new(config: PipelineConfig) -> Self {
        let extractor = PdfPageExtractor::new(&config);
        Self::with_extractor(extractor, config)
    }

    /// Normalizer over a caller-built PDF extractor.
    pub fn with_extractor(extractor: PdfPageExtractor, config: PipelineConfig) -> Self {
        Self {
            extractor: Arc::new(extractor),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Normalize `doc` and return the page sequence.
    pub async fn normalize(&self, doc: &RawDocument) -> Result<PageSequence, Scan2StructError> {
        Ok(self.normalize_with_report(doc).await?.pages)
    }

    /// Normalize `doc` on a blocking thread, reporting how it went.
    pub async fn normalize_with_report(
        &self,
        doc: &RawDocument,
    ) -> Result<NormalizeReport, Scan2StructError> {
        let this = self.clone();
        let doc = doc.clone();
        tokio::task::spawn_blocking(move || this.normalize_blocking(&doc))
            .await
            .map_err(|e| Scan2StructError::Internal(format!("Normalization task panicked: {}", e)))?
    }

    /// Normalize `doc` on the current thread.
    pub fn normalize_blocking(&self, doc: &RawDocument) -> Result<NormalizeReport, Scan2StructError> {
        let progress: ProgressCallback = self
            .config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));

        info!(
            "Normalizing '{}' ({}, {} bytes)",
            doc.name(),
            doc.kind(),
            doc.len()
        );
        progress.on_normalize_start(doc.name(), &doc.kind().to_string());

        let (mut pages, strategy, skipped, excess) = match doc.kind() {
            FileKind::Image => {
                let page = encode(
                    doc.bytes(),
                    self.config.max_width,
                    self.config.max_height,
                    self.config.jpeg_quality,
                )
                .map_err(|source| Scan2StructError::Encoding {
                    name: doc.name().to_string(),
                    source,
                })?;
                (PageSequence::single(page), IMAGE, Vec::new(), 0)
            }
            FileKind::Pdf => {
                let outcome = self.extractor.extract_with(doc.bytes(), |failure| {
                    progress.on_strategy_failed(failure.strategy(), &failure.to_string())
                });
                match outcome {
                    Ok(extraction) => (
                        extraction.pages,
                        extraction.strategy,
                        extraction.skipped,
                        extraction.excess,
                    ),
                    Err(failures) => return Err(processing_error(doc.name(), &failures)),
                }
            }
            FileKind::Other(kind) => {
                return Err(Scan2StructError::UnsupportedFileKind {
                    name: doc.name().to_string(),
                    kind: kind.clone(),
                });
            }
        };

        let dropped = excess + pages.truncate(self.config.max_pages);
        if dropped > 0 {
            warn!(
                "'{}': dropped {} page(s) beyond the {}-page ceiling",
                doc.name(),
                dropped,
                self.config.max_pages
            );
        }

        for page_num in 1..=pages.len() {
            progress.on_page_produced(page_num, strategy);
        }
        progress.on_normalize_complete(pages.len(), dropped);
        info!(
            "'{}': {} page(s) via {} ({} bytes)",
            doc.name(),
            pages.len(),
            strategy,
            pages.total_bytes()
        );

        Ok(NormalizeReport {
            pages,
            strategy,
            skipped,
            dropped,
        })
    }
}

fn processing_error(name: &str, failures: &[TierFailure]) -> Scan2StructError {
    let stage = failures
        .last()
        .map(|f| f.strategy().to_string())
        .unwrap_or_else(|| "no strategies configured".to_string());
    let detail = if failures.is_empty() {
        "the PDF extractor has no page strategies".to_string()
    } else {
        failures
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    };
    Scan2StructError::DocumentProcessing {
        name: name.to_string(),
        stage,
        detail,
    }
}

/// Normalize a document with the standard strategies.
pub async fn normalize(
    doc: &RawDocument,
    config: &PipelineConfig,
) -> Result<PageSequence, Scan2StructError> {
    Normalizer::new(config.clone()).normalize(doc).await
}

/// Normalize a document with the standard strategies and report how.
pub async fn normalize_with_report(
    doc: &RawDocument,
    config: &PipelineConfig,
) -> Result<NormalizeReport, Scan2StructError> {
    Normalizer::new(config.clone()).normalize_with_report(doc).await
}

/// Synchronous [`normalize`]. Needs no runtime.
pub fn normalize_sync(
    doc: &RawDocument,
    config: &PipelineConfig,
) -> Result<PageSequence, Scan2StructError> {
    Ok(Normalizer::new(config.clone()).normalize_blocking(doc)?.pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::pdf::{PageStrategy, StrategyOutput};

    struct Fails(&'static str);

    impl PageStrategy for Fails {
        fn name(&self) -> &'static str {
            self.0
        }
        fn attempt(&self, _: &[u8]) -> Result<StrategyOutput, TierFailure> {
            Err(TierFailure::Failed {
                strategy: self.0.into(),
                detail: "boom".into(),
            })
        }
    }

    #[test]
    fn unsupported_kind_is_rejected_by_name() {
        let doc = RawDocument::new(vec![1, 2, 3], FileKind::from_declared("docx"), "essay.docx");
        let err = normalize_sync(&doc, &PipelineConfig::default()).unwrap_err();
        match err {
            Scan2StructError::UnsupportedFileKind { kind, name } => {
                assert_eq!(kind, "docx");
                assert_eq!(name, "essay.docx");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn undecodable_image_is_encoding_error() {
        let doc = RawDocument::image(b"not pixels".to_vec(), "photo.jpg");
        let err = normalize_sync(&doc, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, Scan2StructError::Encoding { .. }));
        assert!(err.is_unreadable_input());
    }

    #[test]
    fn all_strategies_failing_names_the_last_stage() {
        let extractor = PdfPageExtractor::with_strategies(vec![
            Box::new(Fails("first")),
            Box::new(Fails("second")),
        ]);
        let normalizer = Normalizer::with_extractor(extractor, PipelineConfig::default());
        let doc = RawDocument::pdf(b"%PDF-1.4".to_vec(), "scan.pdf");

        match normalizer.normalize_blocking(&doc).unwrap_err() {
            Scan2StructError::DocumentProcessing { stage, detail, .. } => {
                assert_eq!(stage, "second");
                assert!(detail.contains("first: boom"), "got: {detail}");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn empty_strategy_list_is_a_processing_error() {
        let normalizer = Normalizer::with_extractor(
            PdfPageExtractor::with_strategies(vec![]),
            PipelineConfig::default(),
        );
        let doc = RawDocument::pdf(b"%PDF".to_vec(), "x.pdf");
        assert!(matches!(
            normalizer.normalize_blocking(&doc),
            Err(Scan2StructError::DocumentProcessing { .. })
        ));
    }
}
