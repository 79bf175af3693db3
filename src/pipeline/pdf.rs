//! PDF page extractor: an ordered list of named page strategies.
//!
//! ```text
//! rasterize ──(unavailable / zero pages)──▶ text-synthesis ──(extraction failed)──▶ error
//! ```
//!
//! Each strategy exposes the same `attempt(pdf) -> Result<StrategyOutput, TierFailure>`
//! signature. [`PdfPageExtractor`] runs them in order and returns the first
//! success, collecting the failures of the strategies it skipped so callers
//! can see why the preferred path was not taken.

use super::encode::encode_image;
use super::rasterize::{PageRasterizer, PageSource, PdfiumRasterizer};
use super::text_extract::{PdfTextExtractor, TextExtractor};
use super::text_render::TextPageRenderer;
use crate::config::PipelineConfig;
use crate::document::PageSequence;
use crate::error::{RasterError, TierFailure};
use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the true-rasterisation strategy.
pub const RASTERIZE: &str = "rasterize";
/// Name of the text-extraction-and-synthesis strategy.
pub const TEXT_SYNTHESIS: &str = "text-synthesis";

/// Pages produced by one strategy.
#[derive(Debug)]
pub struct StrategyOutput {
    pub pages: PageSequence,
    /// Source pages the strategy left out because of the page ceiling.
    pub excess: usize,
}

impl From<PageSequence> for StrategyOutput {
    fn from(pages: PageSequence) -> Self {
        Self { pages, excess: 0 }
    }
}

/// One way of turning PDF bytes into pages.
pub trait PageStrategy: Send + Sync {
    /// Stable name used in logs, reports and progress events.
    fn name(&self) -> &'static str;

    /// Produce pages, or explain why this strategy could not.
    fn attempt(&self, pdf: &[u8]) -> Result<StrategyOutput, TierFailure>;
}

// ── Tier 1 ──────────────────────────────────────────────────────────────────

/// Rasterise pages 1, 2, … until the document ends or the ceiling is hit.
///
/// Pages are attempted strictly in order. The first page that does not
/// exist ends the document. A render error on an existing page is retried
/// once when `retry_transient` is set; if it persists, the loop stops there
/// and keeps the pages produced so far.
///
/// The document is opened once per attempt. When the ceiling is reached the
/// pages beyond it are counted from the backend's page count, or, if it has
/// none, by rendering the page right after the ceiling.
pub struct RasterizeStrategy {
    rasterizer: Arc<dyn PageRasterizer>,
    max_pages: usize,
    max_width: u32,
    max_height: u32,
    quality: u8,
    retry_transient: bool,
}

impl RasterizeStrategy {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, config: &PipelineConfig) -> Self {
        Self {
            rasterizer,
            max_pages: config.max_pages,
            max_width: config.max_width,
            max_height: config.max_height,
            quality: config.jpeg_quality,
            retry_transient: config.retry_transient_raster,
        }
    }

    fn render_page(
        &self,
        source: &mut dyn PageSource,
        page_number: usize,
    ) -> Result<DynamicImage, RasterError> {
        match source.render(page_number) {
            Err(RasterError::Render { detail, .. }) if self.retry_transient => {
                debug!("Page {} render failed ({}), retrying once", page_number, detail);
                source.render(page_number)
            }
            other => other,
        }
    }

    fn collect(&self, source: &mut dyn PageSource) -> Result<StrategyOutput, TierFailure> {
        let mut pages = Vec::new();
        let mut stopped_by: Option<RasterError> = None;
        let mut reached_ceiling = true;

        for page_number in 1..=self.max_pages {
            match self.render_page(source, page_number) {
                Ok(img) => {
                    match encode_image(&img, self.max_width, self.max_height, self.quality) {
                        Ok(page) => pages.push(page),
                        Err(e) => warn!("Skipping page {}: {}", page_number, e),
                    }
                }
                Err(RasterError::NoSuchPage { .. }) => {
                    reached_ceiling = false;
                    break;
                }
                Err(RasterError::Unavailable(detail)) if pages.is_empty() => {
                    return Err(TierFailure::Unavailable {
                        strategy: RASTERIZE.into(),
                        detail,
                    });
                }
                Err(e) => {
                    warn!("Rasterisation stopped at page {}: {}", page_number, e);
                    stopped_by = Some(e);
                    reached_ceiling = false;
                    break;
                }
            }
        }

        if pages.is_empty() {
            return Err(match stopped_by {
                Some(e) => TierFailure::Failed {
                    strategy: RASTERIZE.into(),
                    detail: e.to_string(),
                },
                None => TierFailure::NoPages {
                    strategy: RASTERIZE.into(),
                },
            });
        }

        let excess = if reached_ceiling {
            self.pages_beyond_ceiling(source)
        } else {
            0
        };
        info!("Rasterised {} page(s), {} beyond the ceiling", pages.len(), excess);
        Ok(StrategyOutput {
            pages: PageSequence::new(pages),
            excess,
        })
    }

    /// Source pages past `max_pages`. Without a page count, at least one if
    /// the next page exists.
    fn pages_beyond_ceiling(&self, source: &mut dyn PageSource) -> usize {
        if let Some(total) = source.page_count() {
            return total.saturating_sub(self.max_pages);
        }
        match source.render(self.max_pages + 1) {
            Err(RasterError::NoSuchPage { .. }) | Err(RasterError::Unavailable(_)) => 0,
            _ => 1,
        }
    }
}

impl PageStrategy for RasterizeStrategy {
    fn name(&self) -> &'static str {
        RASTERIZE
    }

    fn attempt(&self, pdf: &[u8]) -> Result<StrategyOutput, TierFailure> {
        let mut outcome = None;
        self.rasterizer
            .with_document(pdf, &mut |source| outcome = Some(self.collect(source)))
            .map_err(|e| match e {
                RasterError::Unavailable(detail) => TierFailure::Unavailable {
                    strategy: RASTERIZE.into(),
                    detail,
                },
                other => TierFailure::Failed {
                    strategy: RASTERIZE.into(),
                    detail: other.to_string(),
                },
            })?;

        outcome.unwrap_or_else(|| {
            Err(TierFailure::NoPages {
                strategy: RASTERIZE.into(),
            })
        })
    }
}

// ── Tier 2 ──────────────────────────────────────────────────────────────────

/// Extract the text layer, split it into fixed character budgets and render
/// each chunk as a synthetic page.
///
/// Never yields zero pages: a document with no text becomes one placeholder
/// page. Only a failure of text extraction itself is reported.
pub struct TextSynthesisStrategy {
    extractor: Arc<dyn TextExtractor>,
    renderer: TextPageRenderer,
    chunk_chars: usize,
    max_pages: usize,
}

impl TextSynthesisStrategy {
    pub fn new(extractor: Arc<dyn TextExtractor>, config: &PipelineConfig) -> Self {
        Self {
            extractor,
            renderer: TextPageRenderer::new(config),
            chunk_chars: config.chunk_chars,
            max_pages: config.max_pages,
        }
    }
}

impl PageStrategy for TextSynthesisStrategy {
    fn name(&self) -> &'static str {
        TEXT_SYNTHESIS
    }

    fn attempt(&self, pdf: &[u8]) -> Result<StrategyOutput, TierFailure> {
        let text = self
            .extractor
            .extract_text(pdf)
            .map_err(|detail| TierFailure::Failed {
                strategy: TEXT_SYNTHESIS.into(),
                detail,
            })?;

        let chunks = if text.trim().is_empty() {
            vec![""]
        } else {
            chunk_text(&text, self.chunk_chars)
        };
        let total = chunks.len();
        let shown_total = total.min(self.max_pages);
        if total > self.max_pages {
            info!(
                "Text yields {} chunks; synthesising the first {}",
                total, self.max_pages
            );
        }

        let pages = chunks
            .iter()
            .take(self.max_pages)
            .enumerate()
            .map(|(i, chunk)| self.renderer.render(chunk, i + 1, shown_total))
            .collect::<Vec<_>>();

        info!("Synthesised {} page(s) from {} chars of text", pages.len(), text.chars().count());
        Ok(StrategyOutput {
            pages: PageSequence::new(pages),
            excess: total.saturating_sub(self.max_pages),
        })
    }
}

/// Split `text` into consecutive chunks of at most `chunk_chars` characters.
///
/// Order is preserved and no character is lost. Empty input yields no chunks.
pub fn chunk_text(text: &str, chunk_chars: usize) -> Vec<&str> {
    let chunk_chars = chunk_chars.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == chunk_chars {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

// ── Extractor ───────────────────────────────────────────────────────────────

/// Result of a successful extraction.
#[derive(Debug)]
pub struct Extraction {
    pub pages: PageSequence,
    /// Name of the strategy that produced `pages`.
    pub strategy: &'static str,
    /// Strategies tried before it, and why each gave up.
    pub skipped: Vec<TierFailure>,
    /// Source pages left out because of the page ceiling.
    pub excess: usize,
}

/// Runs page strategies in order until one succeeds.
pub struct PdfPageExtractor {
    strategies: Vec<Box<dyn PageStrategy>>,
}

impl PdfPageExtractor {
    /// The standard two-tier extractor: pdfium rasterisation, then
    /// pdf-extract text synthesis.
    pub fn new(config: &PipelineConfig) -> Self {
        let rasterizer = Arc::new(PdfiumRasterizer::new(config.max_width, config.max_height));
        Self::with_capabilities(rasterizer, Arc::new(PdfTextExtractor), config)
    }

    /// Two-tier extractor over caller-supplied capabilities.
    pub fn with_capabilities(
        rasterizer: Arc<dyn PageRasterizer>,
        extractor: Arc<dyn TextExtractor>,
        config: &PipelineConfig,
    ) -> Self {
        Self::with_strategies(vec![
            Box::new(RasterizeStrategy::new(rasterizer, config)),
            Box::new(TextSynthesisStrategy::new(extractor, config)),
        ])
    }

    /// An extractor over an arbitrary ordered strategy list.
    pub fn with_strategies(strategies: Vec<Box<dyn PageStrategy>>) -> Self {
        Self { strategies }
    }

    /// Names of the configured strategies, in the order they are tried.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy in turn.
    ///
    /// `on_failure` is called for every strategy that gives up. Returns every
    /// failure if none succeeded.
    pub fn extract_with(
        &self,
        pdf: &[u8],
        mut on_failure: impl FnMut(&TierFailure),
    ) -> Result<Extraction, Vec<TierFailure>> {
        let mut skipped = Vec::new();
        for strategy in &self.strategies {
            debug!("Trying page strategy '{}'", strategy.name());
            match strategy.attempt(pdf) {
                Ok(out) if !out.pages.is_empty() => {
                    return Ok(Extraction {
                        pages: out.pages,
                        strategy: strategy.name(),
                        skipped,
                        excess: out.excess,
                    });
                }
                Ok(_) => {
                    let failure = TierFailure::NoPages {
                        strategy: strategy.name().into(),
                    };
                    on_failure(&failure);
                    skipped.push(failure);
                }
                Err(failure) => {
                    warn!("{}", failure);
                    on_failure(&failure);
                    skipped.push(failure);
                }
            }
        }
        Err(skipped)
    }

    /// Try each strategy in turn without observing failures.
    pub fn extract(&self, pdf: &[u8]) -> Result<Extraction, Vec<TierFailure>> {
        self.extract_with(pdf, |_| {})
    }
}
