//! Output filename derivation.
//!
//! Processed files are named after their source with the applied settings
//! appended as tags:
//!
//! ```text
//! <stem>_<tag>_<tag>....<ext>
//! ```
//!
//! Tags, in order:
//! - `50%` - scale mode with a percentage other than 100 (not when cropping,
//!   since the crop box then sets the size)
//! - `lossless` for lossless output, otherwise `q<NN>` when the quality
//!   differs from the default 80 (quality mode) or always with the achieved
//!   quality (target-size mode)
//! - `r90` / `r180` / `r270` - rotation
//! - `id-photo` - crop box applied
//!
//! No tags at all gives `<stem>_processed.<ext>`. The extension always
//! follows the output format, so lossless output is `.png` whatever the
//! source was.
//!
//! Sources that differ only by extension (`a.jpg`, `a.png`) map to the same
//! name; within a batch the later ones get a counter before the extension:
//! `a_processed.jpeg`, `a_processed_2.jpeg`, `a_processed_3.jpeg`.

use crate::imaging::{Compression, CompressionSettings, Quality, ResizeMode, TransformSettings};
use std::collections::HashSet;

/// Source name without its last extension.
///
/// - `"photo.jpg"` → `"photo"`
/// - `"archive.tar.gz"` → `"archive.tar"`
/// - `"dir/shot.png"` → `"shot"`
/// - `"README"` → `"README"`
pub fn stem(name: &str) -> &str {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < file.len() => &file[..pos],
        _ => file,
    }
}

/// Tags describing the applied settings, in file name order.
pub fn setting_tags(
    transform: &TransformSettings,
    compression: &CompressionSettings,
    achieved: Quality,
) -> Vec<String> {
    let mut tags = Vec::new();

    match transform.resize {
        ResizeMode::Scale { percent } if percent != 100 && !transform.crop.enabled => {
            tags.push(format!("{}%", percent));
        }
        _ => {}
    }

    if compression.format.is_lossless() {
        tags.push("lossless".to_string());
    } else {
        match compression.mode {
            Compression::Quality(q) if q.percent() != Quality::default().percent() => {
                tags.push(format!("q{}", q.percent()));
            }
            Compression::Quality(_) => {}
            Compression::TargetSize(_) => tags.push(format!("q{}", achieved.percent())),
        }
    }

    let degrees = transform.rotation.degrees();
    if degrees != 0 {
        tags.push(format!("r{}", degrees));
    }

    if transform.crop.enabled {
        tags.push("id-photo".to_string());
    }

    tags
}

/// Output file name for a processed image.
pub fn processed_name(
    original: &str,
    transform: &TransformSettings,
    compression: &CompressionSettings,
    achieved: Quality,
) -> String {
    let tags = setting_tags(transform, compression, achieved);
    let suffix = if tags.is_empty() {
        "processed".to_string()
    } else {
        tags.join("_")
    };
    format!(
        "{}_{}.{}",
        stem(original),
        suffix,
        compression.format.extension()
    )
}

/// Claim `name` in `taken`, appending `_2`, `_3`, ... to the stem until it
/// is free. Comparison ignores case so the names stay distinct on
/// case-insensitive file systems.
pub fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_lowercase()) {
        return name;
    }

    let (base, ext) = match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name.as_str(), ""),
    };
    let mut counter = 2;
    loop {
        let candidate = format!("{}_{}{}", base, counter, ext);
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{OutputFormat, Rotation, SizeUnit, TargetSize};

    fn quality(percent: u32) -> CompressionSettings {
        CompressionSettings {
            mode: Compression::Quality(Quality::from_percent(percent)),
            format: OutputFormat::Jpeg,
        }
    }

    #[test]
    fn stem_strips_last_extension_only() {
        assert_eq!(stem("photo.jpg"), "photo");
        assert_eq!(stem("archive.tar.gz"), "archive.tar");
        assert_eq!(stem("README"), "README");
        assert_eq!(stem(".hidden"), ".hidden");
        assert_eq!(stem("trailing."), "trailing.");
    }

    #[test]
    fn stem_drops_directories() {
        assert_eq!(stem("holiday/beach.png"), "beach");
        assert_eq!(stem("C:\\scans\\page1.tif"), "page1");
    }

    #[test]
    fn defaults_give_processed_suffix() {
        let name = processed_name(
            "photo.jpg",
            &TransformSettings::default(),
            &quality(80),
            Quality::default(),
        );
        assert_eq!(name, "photo_processed.jpeg");
    }

    #[test]
    fn scale_50_suffix() {
        let transform = TransformSettings {
            resize: ResizeMode::Scale { percent: 50 },
            ..TransformSettings::default()
        };
        let name = processed_name("photo.jpg", &transform, &quality(80), Quality::default());
        assert_eq!(name, "photo_50%.jpeg");
    }

    #[test]
    fn all_tags_in_order() {
        let mut transform = TransformSettings {
            rotation: Rotation::Clockwise90,
            resize: ResizeMode::Scale { percent: 75 },
            ..TransformSettings::default()
        };
        let compression = CompressionSettings {
            mode: Compression::Quality(Quality::from_percent(65)),
            format: OutputFormat::Avif,
        };
        assert_eq!(
            processed_name("a.png", &transform, &compression, Quality::default()),
            "a_75%_q65_r90.avif"
        );

        // Crop replaces the scale tag
        transform.crop.enabled = true;
        assert_eq!(
            processed_name("a.png", &transform, &compression, Quality::default()),
            "a_q65_r90_id-photo.avif"
        );
    }

    #[test]
    fn lossless_tag_and_png_extension() {
        let compression = CompressionSettings {
            mode: Compression::Quality(Quality::from_percent(30)),
            format: OutputFormat::Lossless,
        };
        let name = processed_name(
            "scan.jpeg",
            &TransformSettings::default(),
            &compression,
            Quality::MAX,
        );
        assert_eq!(name, "scan_lossless.png");
    }

    #[test]
    fn target_size_uses_achieved_quality() {
        let compression = CompressionSettings {
            mode: Compression::TargetSize(TargetSize::new(500, SizeUnit::KB)),
            format: OutputFormat::Jpeg,
        };
        let name = processed_name(
            "big.jpg",
            &TransformSettings::default(),
            &compression,
            Quality::new(0.8),
        );
        assert_eq!(name, "big_q80.jpeg");
    }

    #[test]
    fn half_turn_tag() {
        let transform = TransformSettings {
            rotation: Rotation::Half,
            ..TransformSettings::default()
        };
        let name = processed_name("x.gif", &transform, &quality(80), Quality::default());
        assert_eq!(name, "x_r180.jpeg");
    }

    #[test]
    fn unique_name_counts_up_on_collision() {
        let mut taken = HashSet::new();
        let names: Vec<String> = [
            "a_processed.jpeg",
            "b_processed.jpeg",
            "a_processed.jpeg",
            "A_Processed.JPEG",
        ]
        .into_iter()
        .map(|n| unique_name(n.to_string(), &mut taken))
        .collect();
        assert_eq!(
            names,
            vec![
                "a_processed.jpeg",
                "b_processed.jpeg",
                "a_processed_2.jpeg",
                "A_Processed_3.JPEG"
            ]
        );
    }

    #[test]
    fn unique_name_skips_counters_already_taken() {
        let mut taken = HashSet::new();
        unique_name("x_q80.jpeg".to_string(), &mut taken);
        unique_name("x_q80_2.jpeg".to_string(), &mut taken);
        assert_eq!(unique_name("x_q80.jpeg".to_string(), &mut taken), "x_q80_3.jpeg");
        assert_eq!(unique_name("noext".to_string(), &mut taken), "noext");
        assert_eq!(unique_name("noext".to_string(), &mut taken), "noext_2");
    }
}
