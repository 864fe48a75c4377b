//! Session configuration module.
//!
//! Handles loading, merging and clamping `pixpress.toml` files. Stock
//! defaults are the base layer; a user config file overrides any subset of
//! them, and command-line flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! rotation = 0              # Degrees, snapped to 0/90/180/270
//!
//! [resize]
//! mode = "scale"            # "scale" or "absolute"
//! percent = 100             # Scale mode: 1-400
//! # width = 800             # Absolute mode
//! # height = 600
//! keep_aspect = true        # Derive the missing dimension from the first image
//!
//! [crop]
//! enabled = false
//! width = 413               # 3.5cm at 300 DPI
//! height = 531              # 4.5cm at 300 DPI
//! # x = 0                   # Top-left offset; unset centres the box
//! # y = 0
//! zoom = 100                # 25-500
//!
//! [compression]
//! mode = "quality"          # "quality" or "size"
//! quality = 80              # 0-100
//! target = 500              # Size mode target, with unit
//! unit = "KB"               # "KB" (max 10240) or "MB" (max 100)
//! format = "jpeg"           # "jpeg", "avif" or "lossless"
//!
//! [search]
//! tolerance = 0.08          # 0.06-0.10
//! max_attempts = 30         # 25-50
//! ratio_jump_attempts = 3
//! fallback_quality = 95
//!
//! [codec]
//! avif_speed = 6            # 1 (slow, small) - 10 (fast)
//! ```
//!
//! ## Out-of-range Values
//!
//! Values outside their range are clamped to the nearest bound with a
//! warning, never rejected. Unknown keys and malformed TOML are errors.

use crate::imaging::{
    Compression, CompressionSettings, CropSettings, OutputFormat, Quality, ResizeMode, Rotation,
    SearchParams, SeedBand, SeedTable, SizeUnit, TargetSize, TransformSettings,
};
use crate::process::BatchSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Session configuration loaded from a TOML file.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Rotation in degrees; wraps and snaps to quarter turns.
    pub rotation: Rotation,
    pub resize: ResizeConfig,
    pub crop: CropConfig,
    pub compression: CompressionConfig,
    pub search: SearchConfig,
    pub codec: CodecConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rotation: Rotation::None,
            resize: ResizeConfig::default(),
            crop: CropConfig::default(),
            compression: CompressionConfig::default(),
            search: SearchConfig::default(),
            codec: CodecConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeKind {
    #[default]
    Scale,
    Absolute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub mode: ResizeKind,
    pub percent: u32,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub keep_aspect: bool,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            mode: ResizeKind::Scale,
            percent: 100,
            width: None,
            height: None,
            keep_aspect: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    /// Top-left offset; leave both unset to centre on the first image.
    pub x: Option<u32>,
    pub y: Option<u32>,
    pub zoom: u32,
}

impl Default for CropConfig {
    fn default() -> Self {
        let crop = CropSettings::default();
        Self {
            enabled: false,
            width: crop.width,
            height: crop.height,
            x: None,
            y: None,
            zoom: crop.zoom(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    #[default]
    Quality,
    Size,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    pub mode: CompressionKind,
    /// Encoder quality, 0-100.
    pub quality: u32,
    pub target: u32,
    pub unit: SizeUnit,
    pub format: OutputFormat,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            mode: CompressionKind::Quality,
            quality: Quality::default().percent(),
            target: 500,
            unit: SizeUnit::KB,
            format: OutputFormat::Jpeg,
        }
    }
}

/// One seed band: targets up to `up_to_kb` start at `quality` (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedConfig {
    pub up_to_kb: u64,
    pub quality: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub tolerance: f64,
    pub max_attempts: u32,
    pub ratio_jump_attempts: u32,
    pub fallback_quality: u32,
    pub jpeg_seeds: Vec<SeedConfig>,
    pub avif_seeds: Vec<SeedConfig>,
}

fn seeds_to_config(bands: &[SeedBand]) -> Vec<SeedConfig> {
    bands
        .iter()
        .map(|band| SeedConfig {
            up_to_kb: band.up_to_bytes / 1024,
            quality: Quality::new(band.quality).percent(),
        })
        .collect()
}

fn seeds_from_config(seeds: &[SeedConfig]) -> Vec<SeedBand> {
    let mut bands: Vec<SeedBand> = seeds
        .iter()
        .map(|seed| {
            SeedBand::new(
                seed.up_to_kb * 1024,
                Quality::from_percent(seed.quality).value(),
            )
        })
        .collect();
    bands.sort_by_key(|band| band.up_to_bytes);
    bands
}

impl Default for SearchConfig {
    fn default() -> Self {
        let params = SearchParams::default();
        Self {
            tolerance: params.tolerance(),
            max_attempts: params.max_attempts(),
            ratio_jump_attempts: params.ratio_jump_attempts,
            fallback_quality: Quality::new(params.seeds.fallback).percent(),
            jpeg_seeds: seeds_to_config(&params.seeds.jpeg),
            avif_seeds: seeds_to_config(&params.seeds.avif),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// rav1e speed, 1 (slowest, smallest) to 10 (fastest).
    pub avif_speed: u8,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            avif_speed: crate::imaging::rust_backend::DEFAULT_AVIF_SPEED,
        }
    }
}

/// Clamp `value` into `[min, max]`, warning when it moves.
fn clamp_warn<T>(key: &str, value: T, min: T, max: T) -> T
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    let clamped = if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    };
    if clamped != value {
        log::warn!(
            "{} = {} is out of range {}..={}; using {}",
            key,
            value,
            min,
            max,
            clamped
        );
    }
    clamped
}

impl SessionConfig {
    pub const PERCENT_RANGE: (u32, u32) = (1, 400);

    /// Copy with every value clamped into its accepted range.
    pub fn clamped(&self) -> Self {
        let mut config = self.clone();

        let (min_pct, max_pct) = Self::PERCENT_RANGE;
        let resize = &mut config.resize;
        resize.percent = clamp_warn("resize.percent", resize.percent, min_pct, max_pct);
        resize.width = resize
            .width
            .map(|w| clamp_warn("resize.width", w, 1, u32::MAX));
        resize.height = resize
            .height
            .map(|h| clamp_warn("resize.height", h, 1, u32::MAX));

        let crop = &mut config.crop;
        crop.width = clamp_warn("crop.width", crop.width, 1, u32::MAX);
        crop.height = clamp_warn("crop.height", crop.height, 1, u32::MAX);
        crop.zoom = clamp_warn(
            "crop.zoom",
            crop.zoom,
            CropSettings::MIN_ZOOM,
            CropSettings::MAX_ZOOM,
        );

        let compression = &mut config.compression;
        compression.quality = clamp_warn("compression.quality", compression.quality, 0, 100);
        compression.target = clamp_warn(
            "compression.target",
            compression.target,
            1,
            compression.unit.max_value(),
        );

        let search = &mut config.search;
        let (min_tol, max_tol) = SearchParams::TOLERANCE_RANGE;
        search.tolerance = if search.tolerance.is_nan() {
            let fallback = SearchConfig::default().tolerance;
            log::warn!("search.tolerance is NaN; using {}", fallback);
            fallback
        } else {
            clamp_warn("search.tolerance", search.tolerance, min_tol, max_tol)
        };
        let (min_att, max_att) = SearchParams::ATTEMPT_RANGE;
        search.max_attempts =
            clamp_warn("search.max_attempts", search.max_attempts, min_att, max_att);
        search.fallback_quality =
            clamp_warn("search.fallback_quality", search.fallback_quality, 1, 99);
        for seed in search.jpeg_seeds.iter_mut().chain(search.avif_seeds.iter_mut()) {
            seed.quality = clamp_warn("search seed quality", seed.quality, 1, 99);
        }

        config.codec.avif_speed = clamp_warn("codec.avif_speed", config.codec.avif_speed, 1, 10);
        config
    }

    pub fn transform(&self) -> TransformSettings {
        let resize = match self.resize.mode {
            ResizeKind::Scale => ResizeMode::Scale {
                percent: self.resize.percent,
            },
            ResizeKind::Absolute => ResizeMode::Absolute {
                width: self.resize.width,
                height: self.resize.height,
                keep_aspect: self.resize.keep_aspect,
            },
        };
        let mut crop = CropSettings::new(self.crop.width, self.crop.height);
        crop.enabled = self.crop.enabled;
        if self.crop.x.is_some() || self.crop.y.is_some() {
            crop.x = self.crop.x.unwrap_or(0);
            crop.y = self.crop.y.unwrap_or(0);
            crop.centered = false;
        }
        crop.set_zoom(self.crop.zoom);
        TransformSettings {
            rotation: self.rotation,
            resize,
            crop,
        }
    }

    pub fn compression(&self) -> CompressionSettings {
        let mode = match self.compression.mode {
            CompressionKind::Quality => {
                Compression::Quality(Quality::from_percent(self.compression.quality))
            }
            CompressionKind::Size => Compression::TargetSize(TargetSize::new(
                self.compression.target,
                self.compression.unit,
            )),
        };
        CompressionSettings {
            mode,
            format: self.compression.format,
        }
    }

    pub fn search_params(&self) -> SearchParams {
        let mut params = SearchParams::new(self.search.tolerance, self.search.max_attempts);
        params.ratio_jump_attempts = self.search.ratio_jump_attempts;
        params.seeds = SeedTable {
            jpeg: seeds_from_config(&self.search.jpeg_seeds),
            avif: seeds_from_config(&self.search.avif_seeds),
            fallback: Quality::from_percent(self.search.fallback_quality).value(),
        };
        params
    }

    /// Settings snapshot for [`Session::new`](crate::process::Session::new).
    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            transform: self.transform(),
            compression: self.compression(),
            search: self.search_params(),
        }
    }
}

// =============================================================================
// Config loading and merging
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SessionConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, deserialize and clamp.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<SessionConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SessionConfig = merged.try_into()?;
    Ok(config.clamped())
}

/// Load a config file, or the stock defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<SessionConfig, ConfigError> {
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixpress Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
#
# Out-of-range values are clamped to the nearest bound with a warning.
# Unknown keys will cause an error.

# Rotation in degrees. Any angle is accepted; it wraps modulo 360 and snaps
# to the nearest quarter turn.
rotation = 0

# ---------------------------------------------------------------------------
# Resize (ignored while the crop box is enabled)
# ---------------------------------------------------------------------------
[resize]
# "scale" multiplies both dimensions by percent/100.
# "absolute" uses width/height below.
mode = "scale"

# Scale percentage, 1-400.
percent = 100

# Absolute dimensions in pixels. With keep_aspect, give one of them and the
# other follows the first image's aspect ratio.
# width = 800
# height = 600
keep_aspect = true

# ---------------------------------------------------------------------------
# Crop box ("ID photo" mode)
# ---------------------------------------------------------------------------
[crop]
enabled = false

# Output size in pixels. Default is 3.5cm x 4.5cm at 300 DPI.
width = 413
height = 531

# Top-left corner in source pixels, clamped inside the first image.
# Leave both unset to centre the box on the first image.
# x = 0
# y = 0

# Zoom percentage, 25-500. Above 100 samples a smaller area.
zoom = 100

# ---------------------------------------------------------------------------
# Compression
# ---------------------------------------------------------------------------
[compression]
# "quality" encodes once at the given quality.
# "size" searches for the quality that hits the target file size.
mode = "quality"

# Encoder quality, 0 (worst) - 100 (best).
quality = 80

# Target file size for "size" mode: 1-10240 KB or 1-100 MB.
target = 500
unit = "KB"

# "jpeg", "avif" or "lossless" (PNG, quality ignored).
format = "jpeg"

# ---------------------------------------------------------------------------
# Target-size search
# ---------------------------------------------------------------------------
[search]
# Accept sizes within this fraction of the target, 0.06-0.10.
tolerance = 0.08

# Encode attempts before settling for the closest result, 25-50.
max_attempts = 30

# Attempts that jump by the size ratio before switching to bisection.
ratio_jump_attempts = 3

# Starting quality for targets larger than every seed band.
fallback_quality = 95

# Starting quality by target size, per format.
jpeg_seeds = [
    { up_to_kb = 20, quality = 15 },
    { up_to_kb = 60, quality = 35 },
    { up_to_kb = 150, quality = 55 },
    { up_to_kb = 400, quality = 70 },
    { up_to_kb = 1024, quality = 80 },
    { up_to_kb = 3072, quality = 88 },
]
avif_seeds = [
    { up_to_kb = 20, quality = 15 },
    { up_to_kb = 60, quality = 30 },
    { up_to_kb = 150, quality = 45 },
    { up_to_kb = 400, quality = 60 },
    { up_to_kb = 1024, quality = 72 },
    { up_to_kb = 3072, quality = 82 },
]

# ---------------------------------------------------------------------------
# Codec
# ---------------------------------------------------------------------------
[codec]
# AVIF encoder speed, 1 (slowest, smallest files) - 10 (fastest).
avif_speed = 6
"##
}
