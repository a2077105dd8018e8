use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::{debug, warn};

use crate::llm::generator::GenerationError;
use crate::llm::media::GeneratedImage;

pub const WATERMARK_MAX_SIDE: u32 = 104;
pub const WATERMARK_MARGIN: u32 = 15;
pub const WATERMARK_OPACITY: f32 = 0.5;

/// Stamps the brand overlay in the bottom-left corner of a generated image.
#[derive(Debug, Clone)]
pub struct Watermarker {
    overlay_path: PathBuf,
}

fn scaled_overlay_size(width: u32, height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let aspect = width as f32 / height as f32;
    let max_side = WATERMARK_MAX_SIDE as f32;
    let (scaled_width, scaled_height) = if aspect > 1.0 {
        (max_side, max_side / aspect)
    } else {
        (max_side * aspect, max_side)
    };
    (
        (scaled_width.round() as u32).max(1),
        (scaled_height.round() as u32).max(1),
    )
}

fn fade(overlay: &mut RgbaImage, opacity: f32) {
    for pixel in overlay.pixels_mut() {
        pixel.0[3] = (pixel.0[3] as f32 * opacity).round() as u8;
    }
}

fn load_overlay(path: &Path) -> Option<RgbaImage> {
    match image::open(path) {
        Ok(image) => Some(image.to_rgba8()),
        Err(err) => {
            warn!(
                "Failed to load watermark {}: {}; returning original image",
                path.display(),
                err
            );
            None
        }
    }
}

pub fn stamp_overlay(base: &DynamicImage, overlay: &RgbaImage) -> RgbaImage {
    let mut canvas = base.to_rgba8();
    let (logo_width, logo_height) = scaled_overlay_size(overlay.width(), overlay.height());
    if logo_width == 0 || logo_height == 0 {
        return canvas;
    }

    let mut logo = imageops::resize(overlay, logo_width, logo_height, FilterType::Lanczos3);
    fade(&mut logo, WATERMARK_OPACITY);

    let x = i64::from(WATERMARK_MARGIN);
    let y = i64::from(canvas.height()) - i64::from(logo_height) - i64::from(WATERMARK_MARGIN);
    debug!(x, y, logo_width, logo_height, "Placing watermark");
    imageops::overlay(&mut canvas, &logo, x, y);
    canvas
}

impl Watermarker {
    pub fn new(overlay_path: impl Into<PathBuf>) -> Self {
        Self {
            overlay_path: overlay_path.into(),
        }
    }

    /// A missing or unreadable overlay yields the input unchanged; an undecodable base image is an error.
    pub fn apply(&self, image: &GeneratedImage) -> Result<GeneratedImage, GenerationError> {
        let Some(overlay) = load_overlay(&self.overlay_path) else {
            return Ok(image.clone());
        };

        let bytes = image
            .decode_bytes()
            .map_err(|err| GenerationError::Watermark(err.to_string()))?;
        let base = image::load_from_memory(&bytes)
            .map_err(|err| GenerationError::Watermark(err.to_string()))?;

        let stamped = stamp_overlay(&base, &overlay);
        let mut encoded = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(stamped)
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(|err| GenerationError::Watermark(err.to_string()))?;

        Ok(GeneratedImage::from_bytes(&encoded.into_inner(), "image/png"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::generator::testing::solid_png as png_bytes;

    pub(crate) fn write_overlay(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "aquavision-watermark-{}-{}.png",
            std::process::id(),
            name
        ));
        std::fs::write(&path, png_bytes(52, 26, [255, 255, 255, 255])).unwrap();
        path
    }

    pub(crate) fn decode(image: &GeneratedImage) -> RgbaImage {
        image::load_from_memory(&image.decode_bytes().unwrap())
            .unwrap()
            .to_rgba8()
    }

    #[test]
    fn overlay_longer_side_is_scaled_to_limit() {
        assert_eq!(scaled_overlay_size(52, 26), (104, 52));
        assert_eq!(scaled_overlay_size(50, 200), (26, 104));
        assert_eq!(scaled_overlay_size(300, 300), (104, 104));
    }

    #[test]
    fn stamps_half_opacity_logo_bottom_left() {
        let overlay = write_overlay("stamp");
        let base = GeneratedImage::from_bytes(&png_bytes(200, 150, [0, 0, 0, 255]), "image/png");
        let stamped = Watermarker::new(&overlay).apply(&base).unwrap();
        let _ = std::fs::remove_file(&overlay);

        assert_eq!(stamped.mime_type, "image/png");
        let pixels = decode(&stamped);
        assert_eq!(pixels.dimensions(), (200, 150));

        // Logo spans x 15..119, y 83..135.
        let inside = pixels.get_pixel(60, 110).0;
        assert!((120..=135).contains(&inside[0]), "got {:?}", inside);
        assert_eq!(pixels.get_pixel(5, 110).0, [0, 0, 0, 255]);
        assert_eq!(pixels.get_pixel(60, 140).0, [0, 0, 0, 255]);
        assert_eq!(pixels.get_pixel(150, 20).0, [0, 0, 0, 255]);
    }

    #[test]
    fn missing_overlay_returns_original() {
        let base = GeneratedImage::from_bytes(&png_bytes(20, 20, [9, 9, 9, 255]), "image/png");
        let missing = std::env::temp_dir().join("aquavision-no-such-logo.png");
        let result = Watermarker::new(missing).apply(&base).unwrap();
        assert_eq!(result, base);
    }

    #[test]
    fn undecodable_base_is_an_error() {
        let overlay = write_overlay("garbage");
        let base = GeneratedImage::from_bytes(b"not an image", "image/png");
        let result = Watermarker::new(&overlay).apply(&base);
        let _ = std::fs::remove_file(&overlay);
        assert!(matches!(result, Err(GenerationError::Watermark(_))));
    }
}
