//! Image processing on the pure-Rust `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Crop / zoom / rotate** | `crop_imm`, Lanczos3 `resize`, `rotate90/180/270` |
//! | **Encode → JPEG / AVIF / PNG** | `JpegEncoder`, `AvifEncoder` (rav1e), `PngEncoder` |
//! | **Target size** | [`search_quality`] over repeated encodes |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for region and canvas math (unit testable)
//! - **Parameters**: Data structures describing the transform and compression
//! - **Backend**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Search**: Size-targeted quality search over any [`ImageCodec`]
//! - **Operations**: High-level functions combining calculations + codec

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;
pub mod search;

pub use backend::{CodecError, Dimensions, ImageCodec};
pub use calculations::{SampleRegion, compute_output_size, compute_region, pre_rotation_size};
pub use operations::{Encoded, RenderedImage, compress, render, render_transformed};
pub use params::{
    Compression, CompressionSettings, CropSettings, OutputFormat, Quality, ResizeMode, Rotation,
    SizeUnit, TargetSize, TransformSettings,
};
pub use rust_backend::{RustCodec, is_supported_input};
pub use search::{
    SearchAttempt, SearchError, SearchOutcome, SearchParams, SeedBand, SeedTable, Termination,
    search_quality,
};
