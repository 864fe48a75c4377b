//! Codec trait and shared types.
//!
//! The [`ImageCodec`] trait defines the four operations every codec must
//! support: identify, decode, encode and exact byte measurement. Geometry,
//! search and batch code only talk to this trait, so they are unit-testable
//! with the recording mock in [`tests`].
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec), built on the `image` crate.

use super::params::{OutputFormat, Quality};
use image::{DynamicImage, RgbImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }
}

/// Trait for image codecs.
pub trait ImageCodec {
    /// Read pixel dimensions without decoding the whole image.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, CodecError>;

    /// Decode raw bytes into pixels.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError>;

    /// Encode an opaque RGB buffer. Lossless formats ignore `quality`.
    fn encode(
        &self,
        pixels: &RgbImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError>;

    /// Exact size of an encoded payload in bytes.
    fn exact_byte_length(&self, encoded: &[u8]) -> u64 {
        encoded.len() as u64
    }
}
