//! Text-to-image renderer: synthesise a page image from plain text.
//!
//! This is the fallback path for PDFs that cannot be rasterised. It is
//! lossy: the text is sanitised, cut to a fixed ceiling and
//! laid out in a single column on a fixed canvas with a page header and
//! footer. The result goes through the same [`encode`](super::encode) step as
//! every other page, so synthesised pages obey the same size bounds.
//!
//! Glyphs come from a TrueType/OpenType font found at construction time: an
//! explicit `font_path`, else common user and system fonts, else DejaVu Sans
//! compiled into the crate. If even that fails to parse, the page is still
//! produced with its header band and an empty body.

use super::encode::encode_image;
use super::sanitize::{escape_markup, strip_unrenderable, truncate_chars};
use crate::config::PipelineConfig;
use crate::document::{Page, PageEncoding};
use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Body text used when there is nothing to render.
pub const EMPTY_TEXT_PLACEHOLDER: &str = "Empty PDF or could not extract text";

const MARGIN: u32 = 60;
const HEADER_HEIGHT: u32 = 56;
const FOOTER_HEIGHT: u32 = 48;
const LINE_SPACING: f32 = 1.35;
const TAB: &str = "    ";

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([20, 20, 20]);
const BAND: Rgb<u8> = Rgb([236, 236, 236]);
const RULE: Rgb<u8> = Rgb([180, 180, 180]);

/// Font files tried, in order, when no `font_path` is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

/// DejaVu Sans, used when no configured or system font loads.
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Font file names looked up in the user font directory.
const USER_FONT_NAMES: &[&str] = &["DejaVuSans.ttf", "LiberationSans-Regular.ttf", "NotoSans-Regular.ttf"];

/// Renders text into bounded page images.
///
/// Cheap to clone; the loaded font is shared.
#[derive(Clone)]
pub struct TextPageRenderer {
    font: Option<Arc<FontVec>>,
    canvas_width: u32,
    canvas_height: u32,
    font_size: f32,
    max_chars: usize,
    max_width: u32,
    max_height: u32,
    quality: u8,
}

impl std::fmt::Debug for TextPageRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextPageRenderer")
            .field("font_loaded", &self.font.is_some())
            .field("canvas", &(self.canvas_width, self.canvas_height))
            .field("font_size", &self.font_size)
            .field("max_chars", &self.max_chars)
            .finish()
    }
}

impl TextPageRenderer {
    /// Build a renderer from the pipeline configuration, loading a font.
    pub fn new(config: &PipelineConfig) -> Self {
        let font = load_font(config.font_path.as_deref()).map(Arc::new);
        if font.is_none() {
            warn!("Bundled font failed to load; synthesised pages will carry headers only");
        }
        Self {
            font,
            canvas_width: config.canvas_width,
            canvas_height: config.canvas_height,
            font_size: config.font_size,
            max_chars: config.max_render_chars,
            max_width: config.max_width,
            max_height: config.max_height,
            quality: config.jpeg_quality,
        }
    }

    /// Whether glyphs can be drawn.
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render `text` as page `page_number` of `total_pages`.
    ///
    /// Never fails. Empty or whitespace-only text renders
    /// [`EMPTY_TEXT_PLACEHOLDER`].
    pub fn render(&self, text: &str, page_number: usize, total_pages: usize) -> Page {
        let stripped = strip_unrenderable(text);
        let body = if stripped.trim().is_empty() {
            EMPTY_TEXT_PLACEHOLDER
        } else {
            truncate_chars(&stripped, self.max_chars)
        };

        let canvas = self.layout(body, page_number, total_pages);
        match encode_image(
            &DynamicImage::ImageRgb8(canvas),
            self.max_width,
            self.max_height,
            self.quality,
        ) {
            Ok(mut page) => {
                page.text_layer = Some(escape_markup(body));
                page
            }
            Err(e) => {
                // An in-memory RGB canvas always encodes; keep the contract anyway.
                error!("Synthesised page {} failed to encode: {}", page_number, e);
                Page {
                    data: Vec::new(),
                    encoding: PageEncoding::Jpeg,
                    width: 0,
                    height: 0,
                    text_layer: Some(escape_markup(body)),
                }
            }
        }
    }

    fn layout(&self, body: &str, page_number: usize, total_pages: usize) -> RgbImage {
        let (w, h) = (self.canvas_width, self.canvas_height);
        let mut canvas = RgbImage::from_pixel(w, h, WHITE);

        // Header and footer bands.
        draw_filled_rect_mut(&mut canvas, Rect::at(0, 0).of_size(w, HEADER_HEIGHT), BAND);
        draw_filled_rect_mut(
            &mut canvas,
            Rect::at(0, (h - FOOTER_HEIGHT) as i32).of_size(w, FOOTER_HEIGHT),
            BAND,
        );
        draw_line_segment_mut(
            &mut canvas,
            (0.0, HEADER_HEIGHT as f32),
            (w as f32, HEADER_HEIGHT as f32),
            RULE,
        );

        let Some(font) = self.font.as_deref() else {
            return canvas;
        };

        let header_scale = PxScale::from(self.font_size * 1.1);
        let body_scale = PxScale::from(self.font_size);
        let header = format!("Page {} of {}", page_number, total_pages.max(page_number));
        draw_text_mut(
            &mut canvas,
            INK,
            MARGIN as i32,
            ((HEADER_HEIGHT as f32 - self.font_size * 1.1) / 2.0) as i32,
            header_scale,
            font,
            &header,
        );

        let footer = format!("Text extracted from PDF · {}/{}", page_number, total_pages.max(page_number));
        let (footer_w, _) = text_size(body_scale, font, &footer);
        draw_text_mut(
            &mut canvas,
            INK,
            w.saturating_sub(MARGIN + footer_w) as i32,
            (h - FOOTER_HEIGHT) as i32 + ((FOOTER_HEIGHT as f32 - self.font_size) / 2.0) as i32,
            body_scale,
            font,
            &footer,
        );

        let line_height = (self.font_size * LINE_SPACING).ceil() as u32;
        let body_width = w.saturating_sub(2 * MARGIN);
        let top = HEADER_HEIGHT + MARGIN / 2;
        let bottom = h.saturating_sub(FOOTER_HEIGHT + MARGIN / 2);
        let max_lines = (bottom.saturating_sub(top) / line_height.max(1)) as usize;

        let lines = wrap_text(body, body_width, |s| text_size(body_scale, font, s).0);
        if lines.len() > max_lines {
            debug!(
                "Page {}: {} wrapped lines, {} fit on canvas",
                page_number,
                lines.len(),
                max_lines
            );
        }
        for (i, line) in lines.iter().take(max_lines).enumerate() {
            let y = top + i as u32 * line_height;
            draw_text_mut(&mut canvas, INK, MARGIN as i32, y as i32, body_scale, font, line);
        }

        canvas
    }
}

/// Greedy word wrap. `measure` returns the rendered width of a string.
///
/// Paragraph breaks are kept as empty lines. Words wider than the line are
/// split at character boundaries.
fn wrap_text(text: &str, max_width: u32, measure: impl Fn(&str) -> u32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r').replace('\t', TAB);
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measure(word) <= max_width {
                current = word.to_string();
            } else {
                let mut piece = String::new();
                for c in word.chars() {
                    piece.push(c);
                    if measure(&piece) > max_width && piece.chars().count() > 1 {
                        piece.pop();
                        lines.push(std::mem::take(&mut piece));
                        piece.push(c);
                    }
                }
                current = piece;
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

fn load_font(explicit: Option<&Path>) -> Option<FontVec> {
    if let Some(path) = explicit {
        match read_font(path) {
            Some(font) => return Some(font),
            None => warn!("Configured font '{}' could not be loaded", path.display()),
        }
    }

    let user_fonts = dirs::font_dir()
        .map(|dir| {
            USER_FONT_NAMES
                .iter()
                .map(|name| dir.join(name))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    user_fonts
        .into_iter()
        .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from))
        .find_map(|p| read_font(&p))
        .or_else(bundled_font)
}

fn bundled_font() -> Option<FontVec> {
    match FontVec::try_from_vec(BUNDLED_FONT.to_vec()) {
        Ok(font) => {
            debug!("Using bundled DejaVu Sans");
            Some(font)
        }
        Err(e) => {
            warn!("Bundled font is unreadable: {}", e);
            None
        }
    }
}

fn read_font(path: &Path) -> Option<FontVec> {
    let bytes = std::fs::read(path).ok()?;
    match FontVec::try_from_vec(bytes) {
        Ok(font) => {
            debug!("Loaded font {}", path.display());
            Some(font)
        }
        Err(e) => {
            debug!("Skipping font {}: {}", path.display(), e);
            None
        }
    }
}
