//! Raster page encoder: arbitrary raster bytes → bounded JPEG [`Page`].
//!
//! Every page sent to the model passes through here, whichever path produced
//! it, so this is where the size invariant is enforced: neither dimension
//! exceeds the configured maximum, smaller images are never upscaled, and the
//! payload is a single lossy codec at a fixed quality.
//!
//! JPEG has no alpha channel. Transparent regions are composited onto white
//! rather than dropped, since a scanned page with a transparent background
//! would otherwise come out black.

use crate::document::{Page, PageEncoding};
use crate::error::EncodingError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::debug;

/// Decode `raw` and encode it as a bounded JPEG page.
///
/// Fails with [`EncodingError::Decode`] if `raw` is not a raster image the
/// `image` crate can read. The failure is scoped to this one page.
pub fn encode(
    raw: &[u8],
    max_width: u32,
    max_height: u32,
    quality: u8,
) -> Result<Page, EncodingError> {
    let img = image::load_from_memory(raw).map_err(|e| EncodingError::Decode(e.to_string()))?;
    encode_image(&img, max_width, max_height, quality)
}

/// Encode an already-decoded image as a bounded JPEG page.
pub fn encode_image(
    img: &DynamicImage,
    max_width: u32,
    max_height: u32,
    quality: u8,
) -> Result<Page, EncodingError> {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err(EncodingError::Empty {
            width: w,
            height: h,
        });
    }

    let (target_w, target_h) = fit_within(w, h, max_width, max_height);
    let resized;
    let img = if (target_w, target_h) != (w, h) {
        resized = img.resize_exact(target_w, target_h, FilterType::Lanczos3);
        &resized
    } else {
        img
    };

    let rgb = flatten_onto_white(img);
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)))
        .map_err(|e| EncodingError::Encode(e.to_string()))?;

    debug!(
        "Encoded {}x{} → {}x{} JPEG q{} ({} bytes)",
        w,
        h,
        target_w,
        target_h,
        quality,
        buf.len()
    );

    Ok(Page {
        data: buf,
        encoding: PageEncoding::Jpeg,
        width: target_w,
        height: target_h,
        text_layer: None,
    })
}

/// Largest size with the same aspect ratio that fits inside the bounds.
///
/// Returns the input unchanged when it already fits: images are never
/// upscaled. Each dimension is at least 1.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let max_width = max_width.max(1);
    let max_height = max_height.max(1);
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let ratio = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let w = ((width as f64 * ratio).round() as u32).clamp(1, max_width);
    let h = ((height as f64 * ratio).round() as u32).clamp(1, max_height);
    (w, h)
}

fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([200, 10, 10, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        buf
    }

    #[test]
    fn downscales_preserving_aspect() {
        let page = encode(&png_bytes(400, 200), 100, 100, 80).expect("encode");
        assert_eq!((page.width, page.height), (100, 50));
        assert_eq!(page.encoding, PageEncoding::Jpeg);

        let decoded = image::load_from_memory(&page.data).expect("valid jpeg");
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[test]
    fn never_upscales() {
        let page = encode(&png_bytes(30, 40), 1000, 1000, 80).expect("encode");
        assert_eq!((page.width, page.height), (30, 40));
    }

    #[test]
    fn tall_image_bounded_by_height() {
        let page = encode(&png_bytes(300, 900), 500, 300, 80).expect("encode");
        assert!(page.width <= 500 && page.height <= 300);
        assert_eq!(page.height, 300);
        assert_eq!(page.width, 100);
    }

    #[test]
    fn undecodable_input_is_encoding_error() {
        let err = encode(b"definitely not an image", 100, 100, 80).unwrap_err();
        assert!(matches!(err, EncodingError::Decode(_)));
    }

    #[test]
    fn fit_within_bounds() {
        assert_eq!(fit_within(10, 10, 100, 100), (10, 10));
        assert_eq!(fit_within(1000, 10, 100, 100), (100, 1));
        assert_eq!(fit_within(5000, 3000, 2000, 2000), (2000, 1200));
        for (w, h) in [(1, 9999), (9999, 1), (2001, 2001), (1999, 4001)] {
            let (fw, fh) = fit_within(w, h, 2000, 2000);
            assert!(fw <= 2000 && fh <= 2000 && fw >= 1 && fh >= 1);
        }
    }

    #[test]
    fn transparent_pixels_become_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0])));
        let rgb = flatten_onto_white(&img);
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
    }
}
