//! Shared test utilities for the pixpress test suite.
//!
//! Synthetic images that real encoders treat like photographs: a gradient
//! plus deterministic noise, so sizes respond to quality the way camera
//! output does.

use image::{ImageEncoder, Rgb, RgbImage};

// =========================================================================
// Pixel fixtures
// =========================================================================

/// Gradient with LCG noise. Same input, same pixels.
pub fn textured_rgb(width: u32, height: u32) -> RgbImage {
    let mut state: u32 = 0x2545_f491;
    RgbImage::from_fn(width, height, |x, y| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let noise = (state >> 24) as u8 / 4;
        let r = ((x * 255) / width.max(1)) as u8;
        let g = ((y * 255) / height.max(1)) as u8;
        let b = (((x + y) * 127) / (width + height).max(1)) as u8;
        Rgb([
            r.saturating_add(noise),
            g.saturating_add(noise / 2),
            b.saturating_add(noise),
        ])
    })
}

// =========================================================================
// Encoded fixtures
// =========================================================================

/// A `width × height` JPEG at quality 90.
pub fn encode_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let pixels = textured_rgb(width, height);
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 90)
        .write_image(
            pixels.as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
    buf
}

/// A `width × height` PNG.
pub fn encode_test_png(width: u32, height: u32) -> Vec<u8> {
    let pixels = textured_rgb(width, height);
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            pixels.as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
    buf
}
