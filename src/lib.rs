//! # pixpress
//!
//! Batch image preparation: crop, zoom, resize and rotate a set of images,
//! then encode them either at a fixed quality or at whatever quality lands
//! the file within tolerance of a target size.
//!
//! # Architecture: One Pipeline Per Image
//!
//! Every image in a batch runs through the same stages with one immutable
//! snapshot of the settings:
//!
//! ```text
//! 1. Identify   bytes       →  SourceImage      (header only, no decode)
//! 2. Render     SourceImage →  RgbImage         (crop/zoom → resize → rotate)
//! 3. Compress   RgbImage    →  Encoded          (fixed quality, or size search)
//! 4. Export     results     →  files / PDF      (Exporter implementations)
//! ```
//!
//! Geometry is pure arithmetic in [`imaging::calculations`](imaging) and
//! the size search only sees an [`imaging::ImageCodec`], so both are unit
//! tested against a recording mock without encoding a single real image.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Settings types, geometry math, codec trait + `image` backend, quality search |
//! | [`process`] | Batch processing, progress events, cancellation, the [`process::Session`] |
//! | [`export`] | Directory and PDF exporters |
//! | [`naming`] | `<stem>_<tags>.<ext>` output names |
//! | [`config`] | `pixpress.toml` loading, merging over stock defaults, clamping |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Search, Tunable
//!
//! Size targeting is a single algorithm: a seeded first guess, ratio jumps
//! while far off, then bisection over a shrinking quality bracket, with
//! averaging when the last attempts oscillate. Tolerance, budget and seed
//! tables are configuration, not separate code paths. The search always
//! returns the closest candidate it saw, so a batch never fails just
//! because a target was out of reach.
//!
//! ## Abort On Decode Failure
//!
//! A batch is all-or-nothing. The first image that fails to decode stops
//! the batch with its position and name, and no partial results are kept.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, Lanczos3 resampling and JPEG / PNG / AVIF encoding all come
//! from the `image` crate, so the binary has no system dependencies.

pub mod config;
pub mod export;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod process;

#[cfg(test)]
pub(crate) mod test_helpers;
