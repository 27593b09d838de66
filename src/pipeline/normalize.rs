//! Image normalization: decode, flatten, downscale, JPEG re-encode.
//!
//! ## Why Lanczos?
//!
//! Comic pages are full of halftone dot patterns. Nearest-neighbour or plain
//! bilinear downscaling turns those into Moiré artefacts; a windowed-sinc
//! filter (Lanczos3) is the cheapest filter that keeps halftones clean, so
//! it is the only filter this stage uses for downscaling.
//!
//! ## Why flatten onto white?
//!
//! PDF image XObjects in DeviceRGB carry no alpha channel, and comic pages
//! with transparency are almost always scans exported with a spurious alpha
//! layer. Compositing over opaque white matches what the page looked like on
//! paper.
//!
//! ## Memory discipline
//!
//! One decoded page lives at a time. Raw entry bytes and decode buffers drop
//! at the end of each call; only the finished JPEG bytes survive. Archives
//! with hundreds of multi-megapixel pages therefore run at a small, constant
//! decoded-pixel footprint. [`Normalizer::reset`] additionally releases the
//! reusable encode scratch buffer between archives.

use crate::config::ConversionConfig;
use crate::error::PageError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tracing::{debug, trace};

/// A page after normalization: canonical JPEG bytes plus final geometry.
#[derive(Debug, Clone)]
pub struct NormalizedPage {
    /// Finished JPEG stream, ready for direct embedding.
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Scan-order ordinal carried through from the page entry.
    pub ordinal: usize,
    /// True when the page was scaled down to the dimension cap.
    pub downscaled: bool,
}

/// Per-archive normalizer.
///
/// Owns the encode scratch buffer so repeated pages do not re-allocate; the
/// batch controller creates one per archive and calls [`Normalizer::reset`]
/// when the archive finishes so nothing is retained across archives.
pub struct Normalizer {
    max_dimension: u32,
    jpeg_quality: u8,
    scratch: Vec<u8>,
}

impl Normalizer {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            max_dimension: config.max_dimension,
            jpeg_quality: config.jpeg_quality,
            scratch: Vec::new(),
        }
    }

    /// Normalize one page, or reject it with a page-level error.
    ///
    /// Already-compliant JPEGs (RGB, within the dimension cap) are passed
    /// through byte-for-byte: re-encoding an efficient JPEG only loses
    /// quality.
    pub fn normalize_page(
        &mut self,
        entry: &str,
        bytes: &[u8],
        ordinal: usize,
    ) -> Result<NormalizedPage, PageError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| PageError::CorruptImage {
            entry: entry.to_string(),
            detail: e.to_string(),
        })?;

        let (width, height) = (decoded.width(), decoded.height());
        let has_alpha = decoded.color().has_alpha();
        let oversized = width > self.max_dimension || height > self.max_dimension;
        // Pass-through is only valid for 3-component JPEGs: the assembler
        // declares every image XObject as DeviceRGB, so grayscale and CMYK
        // streams must take the re-encode path.
        let is_rgb_jpeg = matches!(image::guess_format(bytes), Ok(ImageFormat::Jpeg))
            && decoded.color() == ColorType::Rgb8;

        if is_rgb_jpeg && !oversized {
            trace!(entry, width, height, "compliant JPEG passed through");
            return Ok(NormalizedPage {
                jpeg: bytes.to_vec(),
                width,
                height,
                ordinal,
                downscaled: false,
            });
        }

        let flattened = if has_alpha {
            flatten_onto_white(decoded)
        } else {
            decoded
        };

        let sized = if oversized {
            // resize() fits within the bounding square while preserving the
            // aspect ratio exactly; the guard above means it never upscales.
            let scaled = flattened.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3);
            debug!(
                entry,
                from = format!("{width}x{height}"),
                to = format!("{}x{}", scaled.width(), scaled.height()),
                "downscaled oversized page"
            );
            scaled
        } else {
            flattened
        };

        let rgb = sized.into_rgb8();
        let (out_w, out_h) = rgb.dimensions();

        self.scratch.clear();
        let mut encoder =
            JpegEncoder::new_with_quality(Cursor::new(&mut self.scratch), self.jpeg_quality);
        encoder
            .encode_image(&rgb)
            .map_err(|e| PageError::EncodeFailed {
                entry: entry.to_string(),
                detail: e.to_string(),
            })?;

        Ok(NormalizedPage {
            jpeg: self.scratch.clone(),
            width: out_w,
            height: out_h,
            ordinal,
            downscaled: oversized,
        })
    }

    /// Release pooled resources. Invoked between archives so a long batch
    /// run never accumulates scratch capacity sized for its largest page.
    pub fn reset(&mut self) {
        self.scratch = Vec::new();
    }
}

/// Composite an image with alpha over an opaque white background.
fn flatten_onto_white(img: DynamicImage) -> DynamicImage {
    let rgba = img.into_rgba8();
    let (w, h) = rgba.dimensions();
    let mut rgb = RgbImage::new(w, h);
    for (x, y, px) in rgba.enumerate_pixels() {
        let a = px[3] as u32;
        let blend = |c: u8| (((c as u32 * a) + 255 * (255 - a)) / 255) as u8;
        rgb.put_pixel(x, y, Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }
    DynamicImage::ImageRgb8(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn config() -> ConversionConfig {
        ConversionConfig::default()
    }

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn jpeg_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    fn solid_rgb(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(
            w,
            h,
            Rgb(rgb),
        ))
    }

    #[test]
    fn corrupt_bytes_are_rejected_not_fatal() {
        let mut norm = Normalizer::new(&config());
        match norm.normalize_page("bad.png", b"definitely not an image", 0) {
            Err(PageError::CorruptImage { entry, .. }) => assert_eq!(entry, "bad.png"),
            other => panic!("expected CorruptImage, got {other:?}"),
        }
    }

    #[test]
    fn compliant_jpeg_passes_through_byte_identical() {
        let mut norm = Normalizer::new(&config());
        let original = jpeg_bytes(&solid_rgb(300, 200, [120, 40, 40]));
        let page = norm.normalize_page("p.jpg", &original, 3).unwrap();
        assert_eq!(page.jpeg, original);
        assert_eq!((page.width, page.height), (300, 200));
        assert_eq!(page.ordinal, 3);
        assert!(!page.downscaled);
    }

    #[test]
    fn grayscale_jpeg_is_reencoded_as_rgb() {
        // A 1-component JPEG stream must not reach the assembler, which
        // declares DeviceRGB for every page.
        let mut norm = Normalizer::new(&config());
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            100,
            100,
            image::Luma([90]),
        ));
        let input = jpeg_bytes(&gray);
        assert_eq!(
            image::load_from_memory(&input).unwrap().color(),
            ColorType::L8
        );

        let page = norm.normalize_page("mono.jpg", &input, 0).unwrap();
        assert_ne!(page.jpeg, input, "grayscale must not pass through");
        let round = image::load_from_memory(&page.jpeg).unwrap();
        assert_eq!(round.color(), ColorType::Rgb8);
        assert_eq!((page.width, page.height), (100, 100));
        assert!(!page.downscaled);
    }

    #[test]
    fn compliant_png_keeps_dimensions() {
        // Idempotence on geometry: no alpha, within bounds, only the
        // encoding changes.
        let mut norm = Normalizer::new(&config());
        let input = png_bytes(&solid_rgb(640, 480, [10, 20, 30]));
        let page = norm.normalize_page("p.png", &input, 0).unwrap();
        assert_eq!((page.width, page.height), (640, 480));
        assert!(!page.downscaled);
        assert_eq!(
            image::guess_format(&page.jpeg).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn downscale_law_4000x2000_becomes_2560x1280() {
        let mut norm = Normalizer::new(&config());
        let input = png_bytes(&solid_rgb(4000, 2000, [128, 128, 128]));
        let page = norm.normalize_page("wide.png", &input, 0).unwrap();
        assert_eq!((page.width, page.height), (2560, 1280));
        assert!(page.downscaled);
    }

    #[test]
    fn tall_pages_clamp_the_height() {
        let mut norm = Normalizer::new(&config());
        let input = png_bytes(&solid_rgb(1000, 5120, [0, 0, 0]));
        let page = norm.normalize_page("tall.png", &input, 0).unwrap();
        assert_eq!((page.width, page.height), (500, 2560));
    }

    #[test]
    fn small_images_are_never_upscaled() {
        let mut norm = Normalizer::new(&config());
        let input = png_bytes(&solid_rgb(120, 90, [5, 5, 5]));
        let page = norm.normalize_page("small.png", &input, 0).unwrap();
        assert_eq!((page.width, page.height), (120, 90));
        assert!(!page.downscaled);
    }

    #[test]
    fn transparent_pixels_flatten_to_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            4,
            Rgba([200, 0, 0, 0]), // fully transparent red
        ));
        let flat = flatten_onto_white(img).into_rgb8();
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn opaque_pixels_survive_flattening_unchanged() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            4,
            Rgba([30, 60, 90, 255]),
        ));
        let flat = flatten_onto_white(img).into_rgb8();
        assert_eq!(flat.get_pixel(2, 2), &Rgb([30, 60, 90]));
    }

    #[test]
    fn alpha_page_flattens_through_full_path() {
        let mut norm = Normalizer::new(&config());
        let input = png_bytes(&DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            16,
            16,
            Rgba([0, 0, 0, 0]),
        )));
        let page = norm.normalize_page("ghost.png", &input, 0).unwrap();
        // Decode the produced JPEG and confirm near-white (allowing for
        // quantisation noise).
        let round = image::load_from_memory(&page.jpeg).unwrap().into_rgb8();
        let px = round.get_pixel(8, 8);
        assert!(px[0] > 250 && px[1] > 250 && px[2] > 250, "got {px:?}");
    }

    #[test]
    fn reset_releases_scratch_capacity() {
        let mut norm = Normalizer::new(&config());
        let input = png_bytes(&solid_rgb(640, 480, [1, 2, 3]));
        norm.normalize_page("p.png", &input, 0).unwrap();
        assert!(norm.scratch.capacity() > 0);
        norm.reset();
        assert_eq!(norm.scratch.capacity(), 0);
    }
}
