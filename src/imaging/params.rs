//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the batch orchestrator (which snapshots them at batch
//! start) and the geometry engine, search and codec (which do the pixel and
//! byte work).
//!
//! ## Types
//!
//! - [`Quality`] — Encoder quality in `[0, 1]`. Clamped on construction.
//! - [`Rotation`] — Quarter-turn rotation, wrapping modulo 360.
//! - [`ResizeMode`] — Percentage scale or absolute dimensions with aspect lock.
//! - [`CropSettings`] — Fixed-size crop box with offset and zoom.
//! - [`TransformSettings`] — Everything the geometry engine needs for one batch.
//! - [`OutputFormat`], [`TargetSize`], [`Compression`], [`CompressionSettings`].

use super::backend::Dimensions;
use serde::{Deserialize, Serialize};

/// Encoder quality in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Quality(f32);

impl Quality {
    pub const MAX: Quality = Quality(1.0);

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Build from the 0–100 scale used on the command line and in config files.
    pub fn from_percent(percent: u32) -> Self {
        Self::new(percent.min(100) as f32 / 100.0)
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Rounded 0–100 value, for display and file names.
    pub fn percent(self) -> u32 {
        (self.0 * 100.0).round() as u32
    }

    /// Quality on the 1–100 scale the `image` encoders take.
    pub fn encoder_level(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.8)
    }
}

/// Rotation in quarter turns. Only 0/90/180/270 are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "i64")]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Half,
    Clockwise270,
}

impl Rotation {
    /// Normalize any angle: wraps modulo 360 and snaps to the nearest quarter turn.
    pub fn from_degrees(degrees: i64) -> Self {
        let quarter = ((degrees.rem_euclid(360) as f64) / 90.0).round() as i64 % 4;
        match quarter {
            0 => Rotation::None,
            1 => Rotation::Clockwise90,
            2 => Rotation::Half,
            _ => Rotation::Clockwise270,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Clockwise90 => 90,
            Rotation::Half => 180,
            Rotation::Clockwise270 => 270,
        }
    }

    pub fn radians(self) -> f64 {
        self.degrees() as f64 * std::f64::consts::PI / 180.0
    }

    pub fn clockwise(self) -> Self {
        Self::from_degrees(self.degrees() as i64 + 90)
    }

    pub fn counter_clockwise(self) -> Self {
        Self::from_degrees(self.degrees() as i64 - 90)
    }

    pub fn half_turn(self) -> Self {
        Self::from_degrees(self.degrees() as i64 + 180)
    }

    /// 90° and 270° swap output width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Clockwise90 | Rotation::Clockwise270)
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> u32 {
        rotation.degrees()
    }
}

impl TryFrom<i64> for Rotation {
    type Error = std::convert::Infallible;

    fn try_from(degrees: i64) -> Result<Self, Self::Error> {
        Ok(Self::from_degrees(degrees))
    }
}

/// How the output canvas is sized when cropping is off.
#[derive(Debug, Clone, PartialEq)]
pub enum ResizeMode {
    /// Multiply both source dimensions by `percent / 100`.
    Scale { percent: u32 },
    /// Explicit dimensions. A missing one falls back to the source dimension,
    /// or is derived from the source aspect ratio when `keep_aspect` is set.
    Absolute {
        width: Option<u32>,
        height: Option<u32>,
        keep_aspect: bool,
    },
}

impl Default for ResizeMode {
    fn default() -> Self {
        ResizeMode::Scale { percent: 100 }
    }
}

impl ResizeMode {
    /// Keep absolute dimensions consistent with `reference`'s aspect ratio.
    ///
    /// Width wins when both are set, matching the order users edit them in.
    pub fn sync_aspect(&mut self, reference: Dimensions) {
        if let ResizeMode::Absolute {
            width,
            height,
            keep_aspect: true,
        } = self
        {
            let aspect = reference.aspect_ratio();
            if let Some(w) = *width {
                *height = Some(((w as f64 / aspect).round() as u32).max(1));
            } else if let Some(h) = *height {
                *width = Some(((h as f64 * aspect).round() as u32).max(1));
            }
        }
    }
}

/// Fixed-size crop box ("ID photo" mode).
#[derive(Debug, Clone, PartialEq)]
pub struct CropSettings {
    pub enabled: bool,
    /// Crop box width in pixels; also the output width.
    pub width: u32,
    /// Crop box height in pixels; also the output height.
    pub height: u32,
    /// Top-left corner of the crop box in source pixels.
    pub x: u32,
    pub y: u32,
    /// No explicit offset yet: the box goes to the centre of the first image.
    pub centered: bool,
    zoom: u32,
}

impl CropSettings {
    pub const MIN_ZOOM: u32 = 25;
    pub const MAX_ZOOM: u32 = 500;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            enabled: false,
            width: width.max(1),
            height: height.max(1),
            x: 0,
            y: 0,
            centered: true,
            zoom: 100,
        }
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn set_zoom(&mut self, percent: u32) {
        self.zoom = percent.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
    }

    /// Largest offset that keeps the crop box inside `source`.
    pub fn max_offset(&self, source: Dimensions) -> (u32, u32) {
        (
            source.width.saturating_sub(self.width),
            source.height.saturating_sub(self.height),
        )
    }

    /// Set the offset, clamped so the crop box stays within `source`.
    pub fn set_offset(&mut self, x: u32, y: u32, source: Dimensions) {
        let (max_x, max_y) = self.max_offset(source);
        self.x = x.min(max_x);
        self.y = y.min(max_y);
        self.centered = false;
    }

    /// Fit the box to a newly loaded reference image: centred when no offset
    /// was given, otherwise the given offset clamped. Zoom is kept.
    pub fn place(&mut self, source: Dimensions) {
        if self.centered {
            let (max_x, max_y) = self.max_offset(source);
            self.x = (max_x as f64 / 2.0).round() as u32;
            self.y = (max_y as f64 / 2.0).round() as u32;
        } else {
            let (x, y) = (self.x, self.y);
            self.set_offset(x, y, source);
        }
    }

    /// Centre the crop box on `source` and reset zoom to 100%.
    pub fn center_on(&mut self, source: Dimensions) {
        self.centered = true;
        self.place(source);
        self.zoom = 100;
    }
}

impl Default for CropSettings {
    /// 3.5cm × 4.5cm at 300 DPI.
    fn default() -> Self {
        Self::new(413, 531)
    }
}

/// Geometry settings for one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformSettings {
    pub rotation: Rotation,
    pub resize: ResizeMode,
    pub crop: CropSettings,
}

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Avif,
    /// Maximum fidelity: PNG, quality is ignored.
    Lossless,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Avif => "avif",
            OutputFormat::Lossless => "png",
        }
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, OutputFormat::Lossless)
    }

    pub fn label(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Avif => "AVIF",
            OutputFormat::Lossless => "PNG (lossless)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SizeUnit {
    #[default]
    KB,
    MB,
}

impl SizeUnit {
    pub fn bytes(self) -> u64 {
        match self {
            SizeUnit::KB => 1024,
            SizeUnit::MB => 1024 * 1024,
        }
    }

    /// Largest accepted target in this unit (10240 KB / 100 MB).
    pub fn max_value(self) -> u32 {
        match self {
            SizeUnit::KB => 10240,
            SizeUnit::MB => 100,
        }
    }
}

/// Requested encoded size. Clamped to `[1, unit max]` on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    value: u32,
    unit: SizeUnit,
}

impl TargetSize {
    pub fn new(value: u32, unit: SizeUnit) -> Self {
        Self {
            value: value.clamp(1, unit.max_value()),
            unit,
        }
    }

    pub fn value(self) -> u32 {
        self.value
    }

    pub fn unit(self) -> SizeUnit {
        self.unit
    }

    pub fn bytes(self) -> u64 {
        self.value as u64 * self.unit.bytes()
    }
}

impl std::fmt::Display for TargetSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:?}", self.value, self.unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Compression {
    Quality(Quality),
    TargetSize(TargetSize),
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Quality(Quality::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompressionSettings {
    pub mode: Compression,
    pub format: OutputFormat,
}
