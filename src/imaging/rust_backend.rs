//! Pure Rust codec on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::load_from_memory` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |
//! | Encode → PNG (lossless) | `image::codecs::png::PngEncoder`, best compression |

use super::backend::{CodecError, Dimensions, ImageCodec};
use super::params::{OutputFormat, Quality};
use image::codecs::png::{CompressionType, FilterType as PngFilter};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, RgbImage};
use std::io::Cursor;
use std::path::Path;

/// Extensions whose decoders are compiled in.
const INPUT_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
];

/// Whether `path` has an extension we can decode.
pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            INPUT_CANDIDATES
                .iter()
                .any(|(candidate, fmt)| {
                    ext.eq_ignore_ascii_case(candidate) && fmt.reading_enabled()
                })
        })
}

/// Default rav1e speed for AVIF (0 = slowest/best, 10 = fastest).
pub const DEFAULT_AVIF_SPEED: u8 = 6;

/// Codec backed by the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustCodec {
    avif_speed: u8,
}

impl RustCodec {
    pub fn new() -> Self {
        Self {
            avif_speed: DEFAULT_AVIF_SPEED,
        }
    }

    pub fn with_avif_speed(speed: u8) -> Self {
        Self {
            avif_speed: speed.clamp(1, 10),
        }
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, CodecError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(CodecError::Io)
}

fn encode_jpeg(pixels: &RgbImage, quality: Quality) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.encoder_level())
        .write_image(
            pixels.as_raw(),
            pixels.width(),
            pixels.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| CodecError::Encode(format!("JPEG encode failed: {}", e)))?;
    Ok(buf)
}

fn encode_avif(pixels: &RgbImage, quality: Quality, speed: u8) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    image::codecs::avif::AvifEncoder::new_with_speed_quality(
        &mut buf,
        speed,
        quality.encoder_level(),
    )
    .write_image(
        pixels.as_raw(),
        pixels.width(),
        pixels.height(),
        ExtendedColorType::Rgb8,
    )
    .map_err(|e| CodecError::Encode(format!("AVIF encode failed: {}", e)))?;
    Ok(buf)
}

fn encode_png(pixels: &RgbImage) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new_with_quality(
        &mut buf,
        CompressionType::Best,
        PngFilter::Adaptive,
    )
    .write_image(
        pixels.as_raw(),
        pixels.width(),
        pixels.height(),
        ExtendedColorType::Rgb8,
    )
    .map_err(|e| CodecError::Encode(format!("PNG encode failed: {}", e)))?;
    Ok(buf)
}

impl ImageCodec for RustCodec {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, CodecError> {
        let (width, height) = reader(bytes)?
            .into_dimensions()
            .map_err(|e| CodecError::Decode(format!("Failed to read dimensions: {}", e)))?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
        reader(bytes)?
            .decode()
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn encode(
        &self,
        pixels: &RgbImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError> {
        match format {
            OutputFormat::Jpeg => encode_jpeg(pixels, quality),
            OutputFormat::Avif => encode_avif(pixels, quality, self.avif_speed),
            OutputFormat::Lossless => encode_png(pixels),
        }
    }
}
