//! Page rasterisation capability: render PDF pages to images.
//!
//! The [`PageRasterizer`] trait is the seam tier 1 depends on. The shipped
//! implementation binds pdfium at call time; when the shared library is not
//! present the call reports [`RasterError::Unavailable`] and the normalizer
//! falls through to text extraction instead of failing the process.
//!
//! A tier-1 pass goes through [`PageRasterizer::with_document`], which opens
//! the document once and hands out a [`PageSource`] for its pages. `Pdfium`
//! is not `Send`, so nothing outlives that call and the rasterizer itself
//! stays stateless and shareable across blocking threads.

use crate::error::RasterError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Pages of one opened document. Page numbers are 1-based.
pub trait PageSource {
    /// Render page `page_number`, or [`RasterError::NoSuchPage`] past the end.
    fn render(&mut self, page_number: usize) -> Result<DynamicImage, RasterError>;

    /// Total page count, when the backend knows it without rendering.
    fn page_count(&self) -> Option<usize> {
        None
    }
}

/// Renders PDF pages. Page numbers are 1-based.
pub trait PageRasterizer: Send + Sync {
    /// Render page `page_number` of `pdf`.
    ///
    /// Returns [`RasterError::NoSuchPage`] past the last page.
    fn rasterize(&self, pdf: &[u8], page_number: usize) -> Result<DynamicImage, RasterError>;

    /// Open `pdf` once and let `visit` render any of its pages.
    ///
    /// The default forwards every page to [`rasterize`](Self::rasterize).
    /// Backends with a costly open step override it.
    fn with_document(
        &self,
        pdf: &[u8],
        visit: &mut dyn FnMut(&mut dyn PageSource),
    ) -> Result<(), RasterError> {
        visit(&mut PerPage {
            rasterizer: self,
            pdf,
        });
        Ok(())
    }
}

struct PerPage<'a, R: ?Sized> {
    rasterizer: &'a R,
    pdf: &'a [u8],
}

impl<R: PageRasterizer + ?Sized> PageSource for PerPage<'_, R> {
    fn render(&mut self, page_number: usize) -> Result<DynamicImage, RasterError> {
        self.rasterizer.rasterize(self.pdf, page_number)
    }
}

/// pdfium-backed rasteriser.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    target_width: u32,
    max_height: u32,
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// Render pages at `target_width` pixels wide, capped at `max_height`.
    pub fn new(target_width: u32, max_height: u32) -> Self {
        Self {
            target_width,
            max_height,
            library_path: None,
        }
    }

    /// Bind this exact library file instead of searching.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    /// `true` if a pdfium library can be bound right now.
    pub fn is_available(&self) -> bool {
        self.bind().is_ok()
    }

    /// Bind pdfium.
    ///
    /// Discovery order:
    /// 1. The explicit library path, if set
    /// 2. `PDFIUM_LIB_PATH` env var
    /// 3. Alongside the running executable
    /// 4. System library search paths
    fn bind(&self) -> Result<Pdfium, RasterError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));
        if let Some(path) = explicit {
            let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
                RasterError::Unavailable(format!("{}: {:?}", path.display(), e))
            })?;
            return Ok(Pdfium::new(bindings));
        }

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                debug!("Bound pdfium next to executable: {}", exe_dir.display());
                return Ok(Pdfium::new(bindings));
            }
        }

        let bindings = Pdfium::bind_to_system_library()
            .map_err(|e| RasterError::Unavailable(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self::new(2000, 2000)
    }
}

impl PdfiumRasterizer {
    fn render_config(&self) -> PdfRenderConfig {
        PdfRenderConfig::new()
            .set_target_width(self.target_width as i32)
            .set_maximum_height(self.max_height as i32)
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf: &[u8], page_number: usize) -> Result<DynamicImage, RasterError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| RasterError::Unreadable(format!("{:?}", e)))?;
        render_page(&document, &self.render_config(), page_number)
    }

    fn with_document(
        &self,
        pdf: &[u8],
        visit: &mut dyn FnMut(&mut dyn PageSource),
    ) -> Result<(), RasterError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| RasterError::Unreadable(format!("{:?}", e)))?;
        let total = document.pages().len() as usize;
        debug!("Opened PDF with {} page(s)", total);

        visit(&mut PdfiumPages {
            document: &document,
            render_config: self.render_config(),
            total,
        });
        Ok(())
    }
}

/// An opened pdfium document.
struct PdfiumPages<'d, 'p> {
    document: &'d PdfDocument<'p>,
    render_config: PdfRenderConfig,
    total: usize,
}

impl PageSource for PdfiumPages<'_, '_> {
    fn render(&mut self, page_number: usize) -> Result<DynamicImage, RasterError> {
        render_page(self.document, &self.render_config, page_number)
    }

    fn page_count(&self) -> Option<usize> {
        Some(self.total)
    }
}

fn render_page(
    document: &PdfDocument<'_>,
    render_config: &PdfRenderConfig,
    page_number: usize,
) -> Result<DynamicImage, RasterError> {
    let pages = document.pages();
    let total = pages.len() as usize;
    if page_number == 0 || page_number > total {
        return Err(RasterError::NoSuchPage { page: page_number });
    }
    let index =
        u16::try_from(page_number - 1).map_err(|_| RasterError::NoSuchPage { page: page_number })?;

    let page = pages.get(index).map_err(|e| RasterError::Render {
        page: page_number,
        detail: format!("{:?}", e),
    })?;

    let bitmap = page
        .render_with_config(render_config)
        .map_err(|e| RasterError::Render {
            page: page_number,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    if image.width() == 0 || image.height() == 0 {
        warn!("Page {} rendered to an empty bitmap", page_number);
        return Err(RasterError::Render {
            page: page_number,
            detail: "empty bitmap".into(),
        });
    }
    debug!(
        "Rendered page {}/{} → {}x{} px",
        page_number,
        total,
        image.width(),
        image.height()
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_unavailable() {
        let r = PdfiumRasterizer::default().with_library_path("/nonexistent/libpdfium.so");
        let err = r.rasterize(b"%PDF-1.4", 1).unwrap_err();
        assert!(matches!(err, RasterError::Unavailable(_)), "got: {err:?}");
        assert!(!r.is_available());
    }

    #[test]
    fn missing_library_fails_before_visiting() {
        let r = PdfiumRasterizer::default().with_library_path("/nonexistent/libpdfium.so");
        let mut visited = false;
        let err = r
            .with_document(b"%PDF-1.4", &mut |_| visited = true)
            .unwrap_err();
        assert!(matches!(err, RasterError::Unavailable(_)));
        assert!(!visited);
    }

    struct Blank;

    impl PageRasterizer for Blank {
        fn rasterize(&self, _: &[u8], page: usize) -> Result<DynamicImage, RasterError> {
            if page > 2 {
                return Err(RasterError::NoSuchPage { page });
            }
            Ok(DynamicImage::new_rgb8(4, 4))
        }
    }

    #[test]
    fn default_document_pass_forwards_each_page() {
        let mut rendered = Vec::new();
        Blank
            .with_document(b"%PDF", &mut |source| {
                assert_eq!(source.page_count(), None);
                for n in 1..=3 {
                    rendered.push(source.render(n).is_ok());
                }
            })
            .unwrap();
        assert_eq!(rendered, vec![true, true, false]);
    }
}
