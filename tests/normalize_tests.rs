//! Normalization integration tests.
//!
//! Rasterisation and text extraction are replaced by in-process fakes, so
//! these run without pdfium or network access.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use scan2struct::error::TierFailure;
use scan2struct::pipeline::pdf::{RASTERIZE, TEXT_SYNTHESIS};
use scan2struct::pipeline::rasterize::{PageRasterizer, PageSource};
use scan2struct::pipeline::text_extract::TextExtractor;
use scan2struct::{
    FileKind, NormalizeProgressCallback, Normalizer, Page, PageEncoding, PageSequence,
    PageStrategy, PdfPageExtractor, PipelineConfig, RasterError, RawDocument, Scan2StructError,
    StrategyOutput,
};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// A PDF of `pages` pages that renders every page as a flat 600x800 raster.
struct Pages(usize);

impl PageSource for Pages {
    fn render(&mut self, page: usize) -> Result<DynamicImage, RasterError> {
        if page > self.0 {
            return Err(RasterError::NoSuchPage { page });
        }
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            600,
            800,
            Rgb([240, 240, 240]),
        )))
    }

    fn page_count(&self) -> Option<usize> {
        Some(self.0)
    }
}

impl PageRasterizer for Pages {
    fn rasterize(&self, _pdf: &[u8], page: usize) -> Result<DynamicImage, RasterError> {
        Pages(self.0).render(page)
    }

    fn with_document(
        &self,
        _pdf: &[u8],
        visit: &mut dyn FnMut(&mut dyn PageSource),
    ) -> Result<(), RasterError> {
        visit(&mut Pages(self.0));
        Ok(())
    }
}

/// pdfium is not installed.
struct NoPdfium;

impl PageRasterizer for NoPdfium {
    fn rasterize(&self, _: &[u8], _: usize) -> Result<DynamicImage, RasterError> {
        Err(RasterError::Unavailable("libpdfium.so: cannot open shared object file".into()))
    }
}

/// Text layer holding `0` characters of filler.
struct TextLayer(usize);

impl TextExtractor for TextLayer {
    fn extract_text(&self, _: &[u8]) -> Result<String, String> {
        Ok("x".repeat(self.0))
    }
}

/// Always yields `0` small pages.
struct Fixed(usize);

impl PageStrategy for Fixed {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn attempt(&self, _: &[u8]) -> Result<StrategyOutput, TierFailure> {
        let page = scan2struct::encode(&png(32, 32), 100, 100, 80).map_err(|e| TierFailure::Failed {
            strategy: "fixed".into(),
            detail: e.to_string(),
        })?;
        Ok(PageSequence::new(vec![page; self.0]).into())
    }
}

#[derive(Default)]
struct Recorder {
    started: Mutex<Vec<(String, String)>>,
    failed: Mutex<Vec<String>>,
    produced: Mutex<Vec<usize>>,
    completed: Mutex<Option<(usize, usize)>>,
}

impl NormalizeProgressCallback for Recorder {
    fn on_normalize_start(&self, name: &str, kind: &str) {
        self.started
            .lock()
            .unwrap()
            .push((name.to_string(), kind.to_string()));
    }

    fn on_strategy_failed(&self, strategy: &str, _reason: &str) {
        self.failed.lock().unwrap().push(strategy.to_string());
    }

    fn on_page_produced(&self, page_num: usize, _strategy: &str) {
        self.produced.lock().unwrap().push(page_num);
    }

    fn on_normalize_complete(&self, page_count: usize, dropped: usize) {
        *self.completed.lock().unwrap() = Some((page_count, dropped));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])))
        .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn config() -> PipelineConfig {
    PipelineConfig::builder()
        .max_dimensions(400, 400)
        .canvas(400, 560)
        .build()
        .unwrap()
}

fn normalizer(
    raster: impl PageRasterizer + 'static,
    text: impl TextExtractor + 'static,
    config: PipelineConfig,
) -> Normalizer {
    let extractor = PdfPageExtractor::with_capabilities(Arc::new(raster), Arc::new(text), &config);
    Normalizer::with_extractor(extractor, config)
}

fn scan() -> RawDocument {
    RawDocument::pdf(b"%PDF-1.7\n".to_vec(), "scan.pdf")
}

fn assert_bounded(page: &Page, max: u32) {
    assert!(page.width <= max && page.height <= max, "{}x{}", page.width, page.height);
    assert_eq!(page.encoding, PageEncoding::Jpeg);
    assert_eq!(&page.data[..2], &[0xFF, 0xD8], "not a JPEG");
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn renderable_pdf_yields_one_page_per_source_page() {
    let n = normalizer(Pages(4), TextLayer(100), config());
    let report = n.normalize_blocking(&scan()).unwrap();

    assert_eq!(report.strategy, RASTERIZE);
    assert_eq!(report.pages.len(), 4);
    assert!(report.skipped.is_empty());
    assert_eq!(report.dropped, 0);
    for page in report.pages.iter() {
        assert_bounded(page, 400);
        assert!(!page.is_synthesized());
    }
}

#[test]
fn missing_renderer_falls_back_to_text_synthesis() {
    // 4500 chars at 2000 per page → 3 synthesised pages.
    let n = normalizer(NoPdfium, TextLayer(4500), config());
    let report = n.normalize_blocking(&scan()).unwrap();

    assert_eq!(report.strategy, TEXT_SYNTHESIS);
    assert_eq!(report.pages.len(), 3);
    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(report.skipped[0], TierFailure::Unavailable { .. }));
    for page in report.pages.iter() {
        assert_bounded(page, 400);
        assert!(page.is_synthesized());
    }
}

#[test]
fn scanned_pdf_without_text_still_yields_a_page() {
    let n = normalizer(NoPdfium, TextLayer(0), config());
    let pages = n.normalize_blocking(&scan()).unwrap().pages;
    assert_eq!(pages.len(), 1);
}

#[test]
fn rasterisation_stops_at_the_ceiling() {
    let config = PipelineConfig::builder().max_pages(5).build().unwrap();
    let n = normalizer(Pages(40), TextLayer(0), config);
    let report = n.normalize_blocking(&scan()).unwrap();
    assert_eq!(report.strategy, RASTERIZE);
    assert_eq!(report.pages.len(), 5);
    assert_eq!(report.dropped, 35);
}

#[test]
fn synthesis_past_the_ceiling_reports_dropped_pages() {
    let recorder = Arc::new(Recorder::default());
    let config = PipelineConfig::builder()
        .max_dimensions(400, 400)
        .canvas(400, 560)
        .max_pages(5)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    // 20000 chars at 2000 per page → 10 chunks, 5 past the ceiling.
    let n = normalizer(NoPdfium, TextLayer(20_000), config);
    let report = n.normalize_blocking(&scan()).unwrap();

    assert_eq!(report.strategy, TEXT_SYNTHESIS);
    assert_eq!(report.pages.len(), 5);
    assert_eq!(report.dropped, 5);
    assert_eq!(*recorder.completed.lock().unwrap(), Some((5, 5)));
}

#[test]
fn ceiling_truncates_and_counts_dropped_pages() {
    let recorder = Arc::new(Recorder::default());
    let config = PipelineConfig::builder()
        .max_pages(3)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let extractor = PdfPageExtractor::with_strategies(vec![Box::new(Fixed(7))]);
    let n = Normalizer::with_extractor(extractor, config);

    let report = n.normalize_blocking(&scan()).unwrap();
    assert_eq!(report.pages.len(), 3);
    assert_eq!(report.dropped, 4);
    assert_eq!(*recorder.completed.lock().unwrap(), Some((3, 4)));
    assert_eq!(*recorder.produced.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn progress_reports_the_fallback() {
    let recorder = Arc::new(Recorder::default());
    let config = PipelineConfig::builder()
        .canvas(400, 560)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let n = normalizer(NoPdfium, TextLayer(10), config);
    n.normalize_blocking(&scan()).unwrap();

    assert_eq!(
        *recorder.started.lock().unwrap(),
        vec![("scan.pdf".to_string(), "pdf".to_string())]
    );
    assert_eq!(*recorder.failed.lock().unwrap(), vec![RASTERIZE.to_string()]);
    assert_eq!(*recorder.completed.lock().unwrap(), Some((1, 0)));
}

#[test]
fn large_photo_is_one_bounded_page() {
    let doc = RawDocument::image(png(3000, 1500), "photo.png");
    let pages = scan2struct::normalize_sync(&doc, &config()).unwrap();

    assert_eq!(pages.len(), 1);
    let page = &pages.pages()[0];
    assert_bounded(page, 400);
    assert_eq!((page.width, page.height), (400, 200));
}

#[test]
fn small_photo_is_not_upscaled() {
    let doc = RawDocument::image(png(120, 90), "thumb.png");
    let pages = scan2struct::normalize_sync(&doc, &config()).unwrap();
    assert_eq!((pages.pages()[0].width, pages.pages()[0].height), (120, 90));
}

#[test]
fn unsupported_kind_is_an_error() {
    let doc = RawDocument::new(b"PK\x03\x04".to_vec(), FileKind::from_declared("docx"), "essay.docx");
    let err = scan2struct::normalize_sync(&doc, &config()).unwrap_err();
    assert!(matches!(err, Scan2StructError::UnsupportedFileKind { .. }));
    assert!(err.to_string().contains("docx"));
}

#[test]
fn failing_text_layer_after_missing_renderer_is_a_processing_error() {
    struct Corrupt;
    impl TextExtractor for Corrupt {
        fn extract_text(&self, _: &[u8]) -> Result<String, String> {
            Err("invalid cross-reference table".into())
        }
    }

    let n = normalizer(NoPdfium, Corrupt, config());
    match n.normalize_blocking(&scan()).unwrap_err() {
        Scan2StructError::DocumentProcessing { name, stage, detail } => {
            assert_eq!(name, "scan.pdf");
            assert_eq!(stage, TEXT_SYNTHESIS);
            assert!(detail.contains("cross-reference"), "got: {detail}");
        }
        other => panic!("unexpected: {other}"),
    }
}

#[tokio::test]
async fn async_normalize_runs_off_the_runtime() {
    let n = normalizer(Pages(2), TextLayer(0), config());
    let pages = n.normalize(&scan()).await.unwrap();
    assert_eq!(pages.len(), 2);
}

#[test]
fn async_normalize_with_block_on() {
    let n = normalizer(Pages(1), TextLayer(0), config());
    let report = tokio_test::block_on(n.normalize_with_report(&scan())).unwrap();
    assert_eq!(report.strategy, RASTERIZE);
}

#[test]
fn pages_are_written_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let n = normalizer(Pages(3), TextLayer(0), config());
    let pages = n.normalize_blocking(&scan()).unwrap().pages;

    let paths = pages.write_to_dir(dir.path()).unwrap();
    let names: Vec<_> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["page-001.jpg", "page-002.jpg", "page-003.jpg"]);
}
