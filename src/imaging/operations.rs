//! High-level image operations.
//!
//! These functions combine calculations with codec execution: geometry
//! first ([`render_transformed`]), then compression ([`compress`]).

use super::backend::{Dimensions, ImageCodec};
use super::calculations::{SampleRegion, compute_output_size, compute_region, pre_rotation_size};
use super::params::{Compression, CompressionSettings, Quality, Rotation, TransformSettings};
use super::search::{SearchAttempt, SearchError, SearchParams, Termination, search_quality};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage, RgbImage};
use std::ops::ControlFlow;

/// Canvas background. Transparent sources and uncovered areas end up white.
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Draw `region` of `source` onto an `output`-sized white canvas, rotated
/// about the canvas centre.
///
/// The region is resampled with Lanczos3 to the pre-rotation size, so the
/// rotated drawing fills the canvas exactly.
pub fn render(
    source: &DynamicImage,
    region: SampleRegion,
    output: (u32, u32),
    rotation: Rotation,
) -> RgbImage {
    let (x, y, w, h) = region.to_pixels(Dimensions::new(source.width(), source.height()));
    let (draw_w, draw_h) = pre_rotation_size(output, rotation);

    let sampled = source.crop_imm(x, y, w, h).to_rgba8();
    let drawn = if (w, h) == (draw_w, draw_h) {
        sampled
    } else {
        imageops::resize(&sampled, draw_w, draw_h, FilterType::Lanczos3)
    };

    let rotated = match rotation {
        Rotation::None => drawn,
        Rotation::Clockwise90 => imageops::rotate90(&drawn),
        Rotation::Half => imageops::rotate180(&drawn),
        Rotation::Clockwise270 => imageops::rotate270(&drawn),
    };

    let mut canvas = RgbaImage::from_pixel(output.0, output.1, BACKGROUND);
    let left = (output.0 as i64 - rotated.width() as i64) / 2;
    let top = (output.1 as i64 - rotated.height() as i64) / 2;
    imageops::overlay(&mut canvas, &rotated, left, top);

    DynamicImage::ImageRgba8(canvas).into_rgb8()
}

/// Pixels after the geometry stage, with the region they were sampled from.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub pixels: RgbImage,
    pub region: SampleRegion,
}

impl RenderedImage {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.pixels.width(), self.pixels.height())
    }
}

/// Run the full geometry stage for one source image.
pub fn render_transformed(source: &DynamicImage, settings: &TransformSettings) -> RenderedImage {
    let dims = Dimensions::new(source.width(), source.height());
    let region = compute_region(dims, &settings.crop);
    let output = compute_output_size(dims, &settings.resize, &settings.crop, settings.rotation);
    log::debug!(
        "render {}x{} → {}x{} (rotation {}°, region {:.1}x{:.1}+{:.1}+{:.1})",
        dims.width,
        dims.height,
        output.0,
        output.1,
        settings.rotation.degrees(),
        region.width,
        region.height,
        region.x,
        region.y
    );
    RenderedImage {
        pixels: render(source, region, output, settings.rotation),
        region,
    }
}

/// Encoded output of the compression stage.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    /// Quality the bytes were encoded at (`1.0` for lossless).
    pub quality: Quality,
    pub size: u64,
    /// Attempts spent and why the search stopped; `None` for single encodes.
    pub search: Option<(u32, Termination)>,
}

/// Encode rendered pixels according to the compression settings.
///
/// Quality mode and lossless output encode once. Size mode runs
/// [`search_quality`], reporting every attempt through `on_attempt`.
pub fn compress<C: ImageCodec + ?Sized>(
    codec: &C,
    pixels: &RgbImage,
    settings: &CompressionSettings,
    params: &SearchParams,
    on_attempt: impl FnMut(&SearchAttempt) -> ControlFlow<()>,
) -> Result<Encoded, SearchError> {
    let format = settings.format;
    match settings.mode {
        Compression::TargetSize(target) if !format.is_lossless() => {
            let outcome =
                search_quality(codec, pixels, format, target.bytes(), params, on_attempt)?;
            Ok(Encoded {
                bytes: outcome.bytes,
                quality: outcome.quality,
                size: outcome.size,
                search: Some((outcome.attempts, outcome.termination)),
            })
        }
        mode => {
            if let Compression::TargetSize(target) = mode {
                log::info!(
                    "{} ignores target size {}; encoding once",
                    format.label(),
                    target
                );
            }
            let quality = match mode {
                _ if format.is_lossless() => Quality::MAX,
                Compression::Quality(q) => q,
                Compression::TargetSize(_) => Quality::default(),
            };
            let bytes = codec.encode(pixels, format, quality)?;
            let size = codec.exact_byte_length(&bytes);
            Ok(Encoded {
                bytes,
                quality,
                size,
                search: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockCodec, RecordedOp};
    use crate::imaging::params::{CropSettings, OutputFormat, ResizeMode, SizeUnit, TargetSize};
    use image::{Rgb, Rgba};

    fn two_colour_source() -> DynamicImage {
        // Left half red, right half blue
        let mut img = RgbaImage::new(40, 20);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = if x < 20 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            };
        }
        DynamicImage::ImageRgba8(img)
    }

    fn is_red(p: &Rgb<u8>) -> bool {
        p[0] > 200 && p[2] < 60
    }

    fn is_blue(p: &Rgb<u8>) -> bool {
        p[2] > 200 && p[0] < 60
    }

    // =========================================================================
    // render tests
    // =========================================================================

    #[test]
    fn render_identity_keeps_pixels() {
        let source = two_colour_source();
        let out = render(
            &source,
            SampleRegion::whole(Dimensions::new(40, 20)),
            (40, 20),
            Rotation::None,
        );
        assert_eq!(out.dimensions(), (40, 20));
        assert!(is_red(out.get_pixel(0, 0)));
        assert!(is_blue(out.get_pixel(39, 19)));
    }

    #[test]
    fn render_clockwise_moves_left_edge_to_top() {
        let source = two_colour_source();
        let out = render(
            &source,
            SampleRegion::whole(Dimensions::new(40, 20)),
            (20, 40),
            Rotation::Clockwise90,
        );
        assert_eq!(out.dimensions(), (20, 40));
        assert!(is_red(out.get_pixel(10, 2)));
        assert!(is_blue(out.get_pixel(10, 37)));
    }

    #[test]
    fn render_half_turn_swaps_sides() {
        let source = two_colour_source();
        let out = render(
            &source,
            SampleRegion::whole(Dimensions::new(40, 20)),
            (40, 20),
            Rotation::Half,
        );
        assert!(is_blue(out.get_pixel(2, 10)));
        assert!(is_red(out.get_pixel(37, 10)));
    }

    #[test]
    fn render_fills_transparency_with_white() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0])));
        let out = render(
            &source,
            SampleRegion::whole(Dimensions::new(8, 8)),
            (8, 8),
            Rotation::None,
        );
        assert!(out.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn render_resamples_region_to_output() {
        let source = two_colour_source();
        // Right half only, upscaled
        let region = SampleRegion {
            x: 20.0,
            y: 0.0,
            width: 20.0,
            height: 20.0,
        };
        let out = render(&source, region, (60, 60), Rotation::None);
        assert_eq!(out.dimensions(), (60, 60));
        assert!(out.pixels().all(is_blue));
    }

    // =========================================================================
    // render_transformed tests
    // =========================================================================

    #[test]
    fn render_transformed_crop_gives_box_size() {
        let source = DynamicImage::ImageRgb8(RgbImage::new(2000, 1500));
        let mut crop = CropSettings::default();
        crop.enabled = true;
        crop.set_zoom(200);
        let settings = TransformSettings {
            crop,
            ..TransformSettings::default()
        };
        let rendered = render_transformed(&source, &settings);
        assert_eq!(rendered.dimensions(), Dimensions::new(413, 531));
        assert_eq!(rendered.region.width, 206.5);
    }

    #[test]
    fn render_transformed_scale_and_rotate() {
        let source = DynamicImage::ImageRgb8(RgbImage::new(1000, 800));
        let settings = TransformSettings {
            rotation: Rotation::Clockwise270,
            resize: ResizeMode::Scale { percent: 50 },
            crop: CropSettings::default(),
        };
        let rendered = render_transformed(&source, &settings);
        assert_eq!(rendered.dimensions(), Dimensions::new(400, 500));
    }

    // =========================================================================
    // compress tests
    // =========================================================================

    fn no_callback(_: &SearchAttempt) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    #[test]
    fn compress_quality_mode_encodes_once() {
        let codec = MockCodec::new(100, 100);
        let pixels = RgbImage::new(100, 100);
        let settings = CompressionSettings {
            mode: Compression::Quality(Quality::new(0.6)),
            format: OutputFormat::Jpeg,
        };
        let encoded =
            compress(&codec, &pixels, &settings, &SearchParams::default(), no_callback).unwrap();
        assert_eq!(encoded.quality, Quality::new(0.6));
        assert_eq!(encoded.size, encoded.bytes.len() as u64);
        assert!(encoded.search.is_none());
        assert_eq!(codec.encode_count(), 1);
    }

    #[test]
    fn compress_size_mode_searches() {
        let codec = MockCodec::new(1000, 1000);
        let pixels = RgbImage::new(1000, 1000);
        let settings = CompressionSettings {
            mode: Compression::TargetSize(TargetSize::new(200, SizeUnit::KB)),
            format: OutputFormat::Avif,
        };
        let encoded =
            compress(&codec, &pixels, &settings, &SearchParams::default(), no_callback).unwrap();
        let (attempts, termination) = encoded.search.unwrap();
        assert_eq!(termination, Termination::Converged);
        assert_eq!(attempts as usize, codec.encode_count());
    }

    #[test]
    fn compress_lossless_skips_search() {
        let codec = MockCodec::new(100, 100);
        let pixels = RgbImage::new(100, 100);
        let settings = CompressionSettings {
            mode: Compression::TargetSize(TargetSize::new(1, SizeUnit::KB)),
            format: OutputFormat::Lossless,
        };
        let encoded =
            compress(&codec, &pixels, &settings, &SearchParams::default(), no_callback).unwrap();
        assert_eq!(encoded.quality, Quality::MAX);
        assert!(encoded.search.is_none());
        assert!(matches!(
            codec.get_operations()[..],
            [RecordedOp::Encode {
                format: OutputFormat::Lossless,
                ..
            }]
        ));
    }
}
