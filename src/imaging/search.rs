//! Size-targeted quality search.
//!
//! Encoded size is monotonic but steep and format-dependent in the encoder
//! quality, and the encoder cannot be inverted. [`search_quality`] treats it
//! as a black box: it re-encodes at chosen qualities until the measured size
//! lands within `tolerance` of the target, or the attempt budget runs out.
//!
//! ## Strategy
//!
//! 1. **Seed** from a [`SeedTable`] keyed by target size and format.
//! 2. **Bracket**: the closest undersized and oversized qualities seen so far.
//! 3. **Ratio jumps** (`q × clamp(target / size)`) in early attempts or when
//!    the size is far off; **bisection** of the bracket afterwards.
//! 4. **Oscillation damping**: if the last four sizes alternate around the
//!    target, continue from the mean of the last two qualities.
//!
//! Qualities are snapped to the encoder's 1–100 grid and clamped to
//! `[0.01, 0.99]`. A quality level is never encoded twice: once no untried
//! level is left inside the bracket the search stops early.
//!
//! The search never fails on non-convergence. It returns the candidate
//! closest to the target along with a [`Termination`] reason.

use super::backend::{CodecError, ImageCodec};
use super::params::{OutputFormat, Quality};
use image::RgbImage;
use std::ops::ControlFlow;
use thiserror::Error;

pub const MIN_QUALITY: f32 = 0.01;
pub const MAX_QUALITY: f32 = 0.99;

/// Ratio jumps never shrink quality below half or grow it past 1.6× per step.
const JUMP_FACTOR_RANGE: (f64, f64) = (0.5, 1.6);
/// Size ratios outside this band count as far from target.
const FAR_RATIO_RANGE: (f64, f64) = (0.5, 2.0);
/// Sides of the target compared when looking for ping-pong.
const OSCILLATION_WINDOW: usize = 4;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Search interrupted")]
    Interrupted,
}

/// Starting quality for targets up to `up_to_bytes`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedBand {
    pub up_to_bytes: u64,
    pub quality: f32,
}

impl SeedBand {
    pub fn new(up_to_bytes: u64, quality: f32) -> Self {
        Self {
            up_to_bytes,
            quality,
        }
    }
}

/// Seed qualities per format, as ascending size bands.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedTable {
    pub jpeg: Vec<SeedBand>,
    pub avif: Vec<SeedBand>,
    /// Used for targets above every band.
    pub fallback: f32,
}

impl SeedTable {
    /// Seed quality for `target_bytes`, clamped to the searchable range.
    pub fn seed(&self, target_bytes: u64, format: OutputFormat) -> f32 {
        let bands = match format {
            OutputFormat::Jpeg => &self.jpeg,
            OutputFormat::Avif => &self.avif,
            OutputFormat::Lossless => return MAX_QUALITY,
        };
        bands
            .iter()
            .find(|band| target_bytes <= band.up_to_bytes)
            .map(|band| band.quality)
            .unwrap_or(self.fallback)
            .clamp(MIN_QUALITY, MAX_QUALITY)
    }
}

impl Default for SeedTable {
    fn default() -> Self {
        const KB: u64 = 1024;
        Self {
            jpeg: vec![
                SeedBand::new(20 * KB, 0.15),
                SeedBand::new(60 * KB, 0.35),
                SeedBand::new(150 * KB, 0.55),
                SeedBand::new(400 * KB, 0.7),
                SeedBand::new(1024 * KB, 0.8),
                SeedBand::new(3072 * KB, 0.88),
            ],
            avif: vec![
                SeedBand::new(20 * KB, 0.15),
                SeedBand::new(60 * KB, 0.3),
                SeedBand::new(150 * KB, 0.45),
                SeedBand::new(400 * KB, 0.6),
                SeedBand::new(1024 * KB, 0.72),
                SeedBand::new(3072 * KB, 0.82),
            ],
            fallback: 0.95,
        }
    }
}

/// Tunables for [`search_quality`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    tolerance: f64,
    max_attempts: u32,
    /// Attempts that always use ratio jumps before switching to bisection.
    pub ratio_jump_attempts: u32,
    pub seeds: SeedTable,
}

impl SearchParams {
    pub const TOLERANCE_RANGE: (f64, f64) = (0.06, 0.10);
    pub const ATTEMPT_RANGE: (u32, u32) = (25, 50);

    /// Tolerance is clamped to 6–10%, the budget to 25–50 attempts.
    pub fn new(tolerance: f64, max_attempts: u32) -> Self {
        let tolerance = if tolerance.is_nan() { 0.08 } else { tolerance };
        Self {
            tolerance: tolerance.clamp(Self::TOLERANCE_RANGE.0, Self::TOLERANCE_RANGE.1),
            max_attempts: max_attempts.clamp(Self::ATTEMPT_RANGE.0, Self::ATTEMPT_RANGE.1),
            ratio_jump_attempts: 3,
            seeds: SeedTable::default(),
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether `size` is close enough to `target`.
    pub fn accepts(&self, size: u64, target: u64) -> bool {
        size.abs_diff(target) as f64 <= target as f64 * self.tolerance
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::new(0.08, 30)
    }
}

/// One encode-and-measure step, reported to the caller as it happens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    pub quality: f32,
    pub size: u64,
    pub target: u64,
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Size within tolerance.
    Converged,
    /// Attempt budget spent.
    BudgetExhausted,
    /// Oversized at the lowest quality or undersized at the highest.
    Unreachable,
    /// No untried quality level left between an undersized and an oversized result.
    Stalled,
}

/// Best candidate found by [`search_quality`].
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub bytes: Vec<u8>,
    pub quality: Quality,
    pub size: u64,
    pub target: u64,
    pub attempts: u32,
    pub termination: Termination,
}

impl SearchOutcome {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

struct Candidate {
    bytes: Vec<u8>,
    quality: f32,
    size: u64,
}

/// Quality on the encoder's hundredths grid, unclamped.
fn level(quality: f32) -> i32 {
    (quality * 100.0).round() as i32
}

fn from_level(level: i32) -> f32 {
    level as f32 / 100.0
}

/// Closer to target wins; on a tie, the smaller file.
fn is_better(candidate: &Candidate, best: &Candidate, target: u64) -> bool {
    let (a, b) = (candidate.size.abs_diff(target), best.size.abs_diff(target));
    a < b || (a == b && candidate.size < best.size)
}

fn is_oscillating(history: &[(f32, u64)], target: u64) -> bool {
    if history.len() < OSCILLATION_WINDOW {
        return false;
    }
    let recent = &history[history.len() - OSCILLATION_WINDOW..];
    recent
        .windows(2)
        .all(|pair| (pair[0].1 > target) != (pair[1].1 > target))
}

/// Pick the next quality strictly inside the `(low, high)` bracket.
///
/// Requires at least one untried level between `low` and `high`.
fn next_quality(
    history: &[(f32, u64)],
    target: u64,
    bracket: (f32, f32),
    attempt: u32,
    params: &SearchParams,
) -> f32 {
    let (low, high) = bracket;
    let &(quality, size) = history.last().unwrap_or(&(MAX_QUALITY, 0));
    let midpoint = (low + high) / 2.0;

    let proposed = if is_oscillating(history, target) {
        let n = history.len();
        (history[n - 1].0 + history[n - 2].0) / 2.0
    } else {
        let ratio = target as f64 / size.max(1) as f64;
        let far = ratio < FAR_RATIO_RANGE.0 || ratio > FAR_RATIO_RANGE.1;
        if attempt <= params.ratio_jump_attempts || far {
            let factor = ratio.clamp(JUMP_FACTOR_RANGE.0, JUMP_FACTOR_RANGE.1) as f32;
            quality * factor
        } else {
            midpoint
        }
    };

    let (low_level, high_level) = (level(low), level(high));
    let mut next = level(proposed.clamp(MIN_QUALITY, MAX_QUALITY));
    if next <= low_level || next >= high_level {
        next = (low_level + high_level) / 2;
    }
    from_level(next.clamp(level(MIN_QUALITY), level(MAX_QUALITY)))
}

/// Search for the encoder quality whose output is closest to `target_bytes`.
///
/// `on_attempt` runs after every encode; returning [`ControlFlow::Break`]
/// abandons the search with [`SearchError::Interrupted`]. Lossless formats
/// ignore quality, so they are encoded exactly once.
pub fn search_quality<C: ImageCodec + ?Sized>(
    codec: &C,
    pixels: &RgbImage,
    format: OutputFormat,
    target_bytes: u64,
    params: &SearchParams,
    mut on_attempt: impl FnMut(&SearchAttempt) -> ControlFlow<()>,
) -> Result<SearchOutcome, SearchError> {
    let target = target_bytes.max(1);

    let mut encode_at = |quality: f32, attempt: u32| -> Result<Candidate, SearchError> {
        let bytes = codec.encode(pixels, format, Quality::new(quality))?;
        let size = codec.exact_byte_length(&bytes);
        log::debug!(
            "attempt {}: quality {:.2} → {} bytes (target {})",
            attempt,
            quality,
            size,
            target
        );
        let report = SearchAttempt {
            attempt,
            quality,
            size,
            target,
        };
        if on_attempt(&report).is_break() {
            return Err(SearchError::Interrupted);
        }
        Ok(Candidate {
            bytes,
            quality,
            size,
        })
    };

    if format.is_lossless() {
        let only = encode_at(Quality::MAX.value(), 1)?;
        let termination = if params.accepts(only.size, target) {
            Termination::Converged
        } else {
            Termination::Unreachable
        };
        return Ok(finish(only, target, 1, termination));
    }

    let seed = from_level(level(params.seeds.seed(target, format)));
    let mut best = encode_at(seed, 1)?;
    let mut history = vec![(best.quality, best.size)];
    let mut attempts = 1;
    // Closest undersized / oversized qualities; the open ends sit just
    // outside the searchable range.
    let mut low = 0.0f32;
    let mut high = 1.0f32;

    loop {
        let &(quality, size) = history.last().unwrap_or(&(seed, best.size));

        if params.accepts(size, target) {
            return Ok(finish(best, target, attempts, Termination::Converged));
        }

        let oversized = size > target;
        if oversized {
            high = quality;
        } else {
            low = quality;
        }

        if (oversized && level(quality) <= level(MIN_QUALITY))
            || (!oversized && level(quality) >= level(MAX_QUALITY))
        {
            return Ok(finish(best, target, attempts, Termination::Unreachable));
        }
        if level(high) - level(low) <= 1 {
            return Ok(finish(best, target, attempts, Termination::Stalled));
        }
        if attempts >= params.max_attempts() {
            return Ok(finish(best, target, attempts, Termination::BudgetExhausted));
        }

        let next = next_quality(&history, target, (low, high), attempts, params);
        attempts += 1;
        let candidate = encode_at(next, attempts)?;
        history.push((candidate.quality, candidate.size));
        if is_better(&candidate, &best, target) {
            best = candidate;
        }
    }
}

fn finish(best: Candidate, target: u64, attempts: u32, termination: Termination) -> SearchOutcome {
    if termination != Termination::Converged {
        log::warn!(
            "target {} bytes not reached ({:?} after {} attempts); best {} bytes at quality {:.2}",
            target,
            termination,
            attempts,
            best.size,
            best.quality
        );
    }
    SearchOutcome {
        bytes: best.bytes,
        quality: Quality::new(best.quality),
        size: best.size,
        target,
        attempts,
        termination,
    }
}
