//! Pure calculation functions for the transform geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;
use super::params::{CropSettings, ResizeMode, Rotation};

/// Source rectangle sampled into the output canvas, in source pixels.
///
/// Fractional on purpose: zoom divides the crop box by arbitrary factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SampleRegion {
    pub fn whole(source: Dimensions) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: source.width as f64,
            height: source.height as f64,
        }
    }

    /// Integer pixel rectangle `(x, y, width, height)` covering the region,
    /// never empty and never outside `source`.
    pub fn to_pixels(&self, source: Dimensions) -> (u32, u32, u32, u32) {
        let x = (self.x.round() as u32).min(source.width.saturating_sub(1));
        let y = (self.y.round() as u32).min(source.height.saturating_sub(1));
        let w = (self.width.round() as u32).clamp(1, source.width - x);
        let h = (self.height.round() as u32).clamp(1, source.height - y);
        (x, y, w, h)
    }
}

/// Compute the sampled source rectangle for the given crop settings.
///
/// With crop disabled this is the whole image. With crop enabled, zoom `z%`
/// samples `crop / (z / 100)` source pixels around the crop box centre, then
/// the rectangle is clamped into the source. A source smaller than the sample
/// in some dimension is clamped on that axis only (no padding).
///
/// # Examples
/// ```
/// # use pixpress::imaging::{CropSettings, Dimensions, compute_region};
/// let mut crop = CropSettings::new(413, 531);
/// crop.enabled = true;
/// crop.set_zoom(200);
/// let region = compute_region(Dimensions::new(2000, 1500), &crop);
/// assert_eq!((region.width, region.height), (206.5, 265.5));
/// ```
pub fn compute_region(source: Dimensions, crop: &CropSettings) -> SampleRegion {
    if !crop.enabled {
        return SampleRegion::whole(source);
    }

    let src_w = source.width as f64;
    let src_h = source.height as f64;
    let zoom = crop.zoom() as f64 / 100.0;

    let sampled_w = crop.width as f64 / zoom;
    let sampled_h = crop.height as f64 / zoom;

    // Keep the sample centred on the crop box
    let centered_x = crop.x as f64 + (crop.width as f64 - sampled_w) / 2.0;
    let centered_y = crop.y as f64 + (crop.height as f64 - sampled_h) / 2.0;

    let x = centered_x.clamp(0.0, (src_w - sampled_w).max(0.0));
    let y = centered_y.clamp(0.0, (src_h - sampled_h).max(0.0));

    SampleRegion {
        x,
        y,
        width: sampled_w.min(src_w - x),
        height: sampled_h.min(src_h - y),
    }
}

/// Calculate the output canvas size.
///
/// # Arguments
/// * `source` - Dimensions of the sampled source
/// * `resize` - Scale or absolute sizing
/// * `crop` - When enabled, the crop box size overrides `resize`
/// * `rotation` - 90°/270° swap the result
///
/// # Returns
/// * `(width, height)` - Final canvas dimensions, each at least 1
pub fn compute_output_size(
    source: Dimensions,
    resize: &ResizeMode,
    crop: &CropSettings,
    rotation: Rotation,
) -> (u32, u32) {
    let (w, h) = if crop.enabled {
        (crop.width, crop.height)
    } else {
        resized_dimensions(source, resize)
    };

    let (w, h) = (w.max(1), h.max(1));
    if rotation.swaps_dimensions() {
        (h, w)
    } else {
        (w, h)
    }
}

fn resized_dimensions(source: Dimensions, resize: &ResizeMode) -> (u32, u32) {
    match *resize {
        ResizeMode::Scale { percent } => {
            let scale = percent as f64 / 100.0;
            (
                (source.width as f64 * scale).round() as u32,
                (source.height as f64 * scale).round() as u32,
            )
        }
        ResizeMode::Absolute {
            width,
            height,
            keep_aspect,
        } => {
            let aspect = source.aspect_ratio();
            match (width, height) {
                (Some(w), None) if keep_aspect => (w, (w as f64 / aspect).round() as u32),
                (None, Some(h)) if keep_aspect => ((h as f64 * aspect).round() as u32, h),
                (w, h) => (w.unwrap_or(source.width), h.unwrap_or(source.height)),
            }
        }
    }
}

/// Size to draw the sampled region at before rotating onto an
/// `output`-sized canvas.
pub fn pre_rotation_size(output: (u32, u32), rotation: Rotation) -> (u32, u32) {
    if rotation.swaps_dimensions() {
        (output.1, output.0)
    } else {
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_crop(zoom: u32, x: u32, y: u32) -> CropSettings {
        let mut crop = CropSettings::new(413, 531);
        crop.enabled = true;
        crop.set_zoom(zoom);
        crop.x = x;
        crop.y = y;
        crop
    }

    // =========================================================================
    // compute_region tests
    // =========================================================================

    #[test]
    fn region_whole_image_when_crop_disabled() {
        let region = compute_region(Dimensions::new(1000, 800), &CropSettings::default());
        assert_eq!(region, SampleRegion::whole(Dimensions::new(1000, 800)));
    }

    #[test]
    fn region_equals_crop_box_at_100_percent() {
        let region = compute_region(Dimensions::new(2000, 1500), &enabled_crop(100, 50, 60));
        assert_eq!(
            region,
            SampleRegion {
                x: 50.0,
                y: 60.0,
                width: 413.0,
                height: 531.0
            }
        );
    }

    #[test]
    fn region_zoom_200_from_origin() {
        // 413/2 × 531/2, shifted by half the size difference
        let region = compute_region(Dimensions::new(2000, 1500), &enabled_crop(200, 0, 0));
        assert_eq!(region.width, 206.5);
        assert_eq!(region.height, 265.5);
        assert_eq!(region.x, 103.25);
        assert_eq!(region.y, 132.75);
    }

    #[test]
    fn region_width_follows_zoom_across_range() {
        let source = Dimensions::new(4000, 4000);
        for zoom in (25..=500).step_by(25) {
            let region = compute_region(source, &enabled_crop(zoom, 1000, 1000));
            let expected = 413.0 / (zoom as f64 / 100.0);
            assert!((region.width - expected.min(4000.0)).abs() < 1e-9, "zoom {zoom}");
            assert!(region.x >= 0.0 && region.x + region.width <= 4000.0);
        }
    }

    #[test]
    fn region_zoom_out_clamps_to_origin() {
        // 25% samples 1652×2124, larger than the offset allows
        let region = compute_region(Dimensions::new(3000, 3000), &enabled_crop(25, 10, 10));
        assert_eq!(region.x, 0.0);
        assert_eq!(region.y, 0.0);
        assert_eq!(region.width, 1652.0);
        assert_eq!(region.height, 2124.0);
    }

    #[test]
    fn region_clamped_to_far_edge() {
        let region = compute_region(Dimensions::new(1000, 1000), &enabled_crop(100, 900, 900));
        assert_eq!(region.x, 587.0);
        assert_eq!(region.y, 469.0);
    }

    #[test]
    fn region_source_smaller_than_box_is_clamped_per_axis() {
        // 300 wide source, 413 wide box: width clamps to 300, height untouched
        let region = compute_region(Dimensions::new(300, 1000), &enabled_crop(100, 0, 0));
        assert_eq!(region.x, 0.0);
        assert_eq!(region.width, 300.0);
        assert_eq!(region.height, 531.0);
    }

    #[test]
    fn region_to_pixels_stays_inside_source() {
        let source = Dimensions::new(2000, 1500);
        let region = compute_region(source, &enabled_crop(200, 0, 0));
        let (x, y, w, h) = region.to_pixels(source);
        assert_eq!((x, y), (103, 133));
        assert_eq!((w, h), (207, 266));

        let edge = SampleRegion {
            x: 1999.7,
            y: 0.0,
            width: 5.0,
            height: 5.0,
        };
        assert_eq!(edge.to_pixels(source), (1999, 0, 1, 5));
    }

    // =========================================================================
    // compute_output_size tests
    // =========================================================================

    #[test]
    fn output_scale_50_percent() {
        let size = compute_output_size(
            Dimensions::new(1000, 800),
            &ResizeMode::Scale { percent: 50 },
            &CropSettings::default(),
            Rotation::None,
        );
        assert_eq!(size, (500, 400));
    }

    #[test]
    fn output_scale_rounds_to_nearest() {
        let size = compute_output_size(
            Dimensions::new(333, 101),
            &ResizeMode::Scale { percent: 50 },
            &CropSettings::default(),
            Rotation::None,
        );
        assert_eq!(size, (167, 51));
    }

    #[test]
    fn output_absolute_backfills_height_with_aspect_lock() {
        let size = compute_output_size(
            Dimensions::new(1600, 1200),
            &ResizeMode::Absolute {
                width: Some(800),
                height: None,
                keep_aspect: true,
            },
            &CropSettings::default(),
            Rotation::None,
        );
        assert_eq!(size, (800, 600));
    }

    #[test]
    fn output_absolute_backfills_width_with_aspect_lock() {
        let size = compute_output_size(
            Dimensions::new(1600, 1200),
            &ResizeMode::Absolute {
                width: None,
                height: Some(300),
                keep_aspect: true,
            },
            &CropSettings::default(),
            Rotation::None,
        );
        assert_eq!(size, (400, 300));
    }

    #[test]
    fn output_absolute_without_lock_keeps_source_dimension() {
        let size = compute_output_size(
            Dimensions::new(1600, 1200),
            &ResizeMode::Absolute {
                width: Some(800),
                height: None,
                keep_aspect: false,
            },
            &CropSettings::default(),
            Rotation::None,
        );
        assert_eq!(size, (800, 1200));
    }

    #[test]
    fn output_absolute_both_given_used_verbatim() {
        let size = compute_output_size(
            Dimensions::new(1600, 1200),
            &ResizeMode::Absolute {
                width: Some(100),
                height: Some(700),
                keep_aspect: true,
            },
            &CropSettings::default(),
            Rotation::None,
        );
        assert_eq!(size, (100, 700));
    }

    #[test]
    fn output_crop_overrides_resize() {
        let size = compute_output_size(
            Dimensions::new(2000, 1500),
            &ResizeMode::Scale { percent: 10 },
            &enabled_crop(200, 0, 0),
            Rotation::None,
        );
        assert_eq!(size, (413, 531));
    }

    #[test]
    fn output_rotation_swaps_after_sizing() {
        let resize = ResizeMode::Scale { percent: 50 };
        let crop = CropSettings::default();
        let source = Dimensions::new(1000, 800);
        assert_eq!(
            compute_output_size(source, &resize, &crop, Rotation::Clockwise90),
            (400, 500)
        );
        assert_eq!(
            compute_output_size(source, &resize, &crop, Rotation::Half),
            (500, 400)
        );
        assert_eq!(
            compute_output_size(source, &resize, &enabled_crop(100, 0, 0), Rotation::Clockwise270),
            (531, 413)
        );
    }

    #[test]
    fn output_never_zero() {
        let size = compute_output_size(
            Dimensions::new(3, 3),
            &ResizeMode::Scale { percent: 1 },
            &CropSettings::default(),
            Rotation::None,
        );
        assert_eq!(size, (1, 1));
    }

    #[test]
    fn pre_rotation_size_undoes_swap() {
        assert_eq!(pre_rotation_size((400, 500), Rotation::Clockwise90), (500, 400));
        assert_eq!(pre_rotation_size((400, 500), Rotation::Half), (400, 500));
    }
}
