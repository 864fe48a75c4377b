//! CLI output formatting.
//!
//! Each image leads with its 1-based position and source name; settings
//! and results follow as indented context lines. Search attempts are
//! listed under the image they belong to.
//!
//! # Output Format
//!
//! ```text
//! Processing 2 images → JPEG, target 500 KB
//! 001 beach.jpg (3000×2000)
//!     attempt 01: q72 → 612.4 KB
//!     attempt 02: q58 → 488.1 KB
//!     Output: beach_q58.jpeg (3000×2000, 488.1 KB)
//!     Search: 2 attempts, converged
//! 002 dunes.png (1200×800)
//!     ...
//!
//! Processed 2 images, 901.3 KB total
//!     out/beach_q58.jpeg
//!     out/dunes_q61.jpeg
//! ```
//!
//! Format functions return `Vec<String>` and never touch stdout, so the
//! binary decides where the lines go.

use crate::imaging::{Dimensions, Quality, Termination};
use crate::process::{BatchReport, ProcessEvent};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_dimensions(d: Dimensions) -> String {
    format!("{}\u{00d7}{}", d.width, d.height)
}

/// Human-readable size in binary units, at most two decimals.
///
/// ```text
/// 0        → 0 Bytes
/// 1536     → 1.5 KB
/// 512000   → 500 KB
/// 2621440  → 2.5 MB
/// ```
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }

    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", text, UNITS[unit])
}

fn termination_label(termination: Termination) -> &'static str {
    match termination {
        Termination::Converged => "converged",
        Termination::BudgetExhausted => "attempt budget spent, closest kept",
        Termination::Unreachable => "target out of reach, closest kept",
        Termination::Stalled => "no quality step left, closest kept",
    }
}

// ============================================================================
// Processing progress
// ============================================================================

/// Format a single process progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::BatchStarted {
            image_count,
            format,
            target_bytes,
        } => {
            let noun = if *image_count == 1 { "image" } else { "images" };
            let header = match target_bytes {
                Some(target) => format!(
                    "Processing {} {} \u{2192} {}, target {}",
                    image_count,
                    noun,
                    format.label(),
                    format_file_size(*target)
                ),
                None => format!(
                    "Processing {} {} \u{2192} {}",
                    image_count,
                    noun,
                    format.label()
                ),
            };
            vec![header]
        }
        ProcessEvent::ImageStarted {
            index,
            name,
            dimensions,
        } => vec![format!(
            "{} {} ({})",
            format_index(*index),
            name,
            format_dimensions(*dimensions)
        )],
        ProcessEvent::SearchAttempt { attempt, .. } => vec![format!(
            "{}attempt {:02}: q{} \u{2192} {}",
            indent(1),
            attempt.attempt,
            Quality::new(attempt.quality).percent(),
            format_file_size(attempt.size)
        )],
        ProcessEvent::ImageProcessed {
            output_name,
            dimensions,
            size,
            quality,
            search,
            ..
        } => {
            let mut lines = vec![format!(
                "{}Output: {} ({}, {})",
                indent(1),
                output_name,
                format_dimensions(*dimensions),
                format_file_size(*size)
            )];
            match search {
                Some(summary) => lines.push(format!(
                    "{}Search: {} attempt{}, {}",
                    indent(1),
                    summary.attempts,
                    if summary.attempts == 1 { "" } else { "s" },
                    termination_label(summary.termination)
                )),
                None => lines.push(format!("{}Quality: {}", indent(1), quality.percent())),
            }
            lines
        }
    }
}

// ============================================================================
// Batch summary
// ============================================================================

/// Closing lines: image count, total size, then every exported path.
pub fn format_batch_summary(report: &BatchReport<'_>) -> Vec<String> {
    let count = report.images.len();
    let mut lines = vec![format!(
        "Processed {} image{}, {} total",
        count,
        if count == 1 { "" } else { "s" },
        format_file_size(report.total_bytes)
    )];
    for path in &report.exported {
        lines.push(format!("{}{}", indent(1), path.display()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{OutputFormat, Rotation, SearchAttempt};
    use crate::process::{BatchSettings, ProcessedImage, SearchSummary};
    use std::path::PathBuf;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads_to_three() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(999), "999");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(800), "800 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(512_000), "500 KB");
        assert_eq!(format_file_size(2_621_440), "2.5 MB");
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
    }

    // =========================================================================
    // Process event formatting tests
    // =========================================================================

    #[test]
    fn batch_started_with_target() {
        let event = ProcessEvent::BatchStarted {
            image_count: 3,
            format: OutputFormat::Jpeg,
            target_bytes: Some(512_000),
        };
        assert_eq!(
            format_process_event(&event),
            vec!["Processing 3 images \u{2192} JPEG, target 500 KB"]
        );
    }

    #[test]
    fn batch_started_single_lossless() {
        let event = ProcessEvent::BatchStarted {
            image_count: 1,
            format: OutputFormat::Lossless,
            target_bytes: None,
        };
        assert_eq!(
            format_process_event(&event),
            vec!["Processing 1 image \u{2192} PNG (lossless)"]
        );
    }

    #[test]
    fn image_started_line() {
        let event = ProcessEvent::ImageStarted {
            index: 2,
            name: "beach.jpg".to_string(),
            dimensions: Dimensions::new(3000, 2000),
        };
        assert_eq!(
            format_process_event(&event),
            vec!["002 beach.jpg (3000\u{00d7}2000)"]
        );
    }

    #[test]
    fn search_attempt_line() {
        let event = ProcessEvent::SearchAttempt {
            index: 1,
            attempt: SearchAttempt {
                attempt: 3,
                quality: 0.72,
                size: 1536,
                target: 1024,
            },
        };
        assert_eq!(
            format_process_event(&event),
            vec!["    attempt 03: q72 \u{2192} 1.5 KB"]
        );
    }

    #[test]
    fn processed_with_search_summary() {
        let event = ProcessEvent::ImageProcessed {
            index: 1,
            name: "beach.jpg".to_string(),
            output_name: "beach_q58.jpeg".to_string(),
            dimensions: Dimensions::new(1200, 800),
            size: 512_000,
            quality: Quality::from_percent(58),
            search: Some(SearchSummary {
                target: 512_000,
                attempts: 4,
                termination: Termination::Converged,
            }),
        };
        let lines = format_process_event(&event);
        assert_eq!(lines[0], "    Output: beach_q58.jpeg (1200\u{00d7}800, 500 KB)");
        assert_eq!(lines[1], "    Search: 4 attempts, converged");
    }

    #[test]
    fn processed_without_search_shows_quality() {
        let event = ProcessEvent::ImageProcessed {
            index: 1,
            name: "a.png".to_string(),
            output_name: "a_processed.jpeg".to_string(),
            dimensions: Dimensions::new(10, 10),
            size: 900,
            quality: Quality::default(),
            search: None,
        };
        assert_eq!(
            format_process_event(&event),
            vec!["    Output: a_processed.jpeg (10\u{00d7}10, 900 Bytes)", "    Quality: 80"]
        );
    }

    #[test]
    fn unreachable_search_is_labelled() {
        let event = ProcessEvent::ImageProcessed {
            index: 1,
            name: "a.png".to_string(),
            output_name: "a_q1.jpeg".to_string(),
            dimensions: Dimensions::new(10, 10),
            size: 900,
            quality: Quality::from_percent(1),
            search: Some(SearchSummary {
                target: 100,
                attempts: 1,
                termination: Termination::Unreachable,
            }),
        };
        let lines = format_process_event(&event);
        assert_eq!(lines[1], "    Search: 1 attempt, target out of reach, closest kept");
    }

    // =========================================================================
    // Batch summary tests
    // =========================================================================

    #[test]
    fn summary_lists_exported_paths() {
        let images = vec![ProcessedImage {
            source_name: "a.jpg".to_string(),
            output_name: "a_processed.jpeg".to_string(),
            bytes: vec![0; 2048],
            size: 2048,
            dimensions: Dimensions::new(4, 4),
            format: OutputFormat::Jpeg,
            quality: Quality::default(),
            rotation: Rotation::None,
            cropped: false,
            search: None,
        }];
        let mut report = BatchReport::new(&BatchSettings::default(), &images);
        report.exported = vec![PathBuf::from("out/a_processed.jpeg")];

        assert_eq!(
            format_batch_summary(&report),
            vec!["Processed 1 image, 2 KB total", "    out/a_processed.jpeg"]
        );
    }
}
