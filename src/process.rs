//! Batch processing: transform and compress a set of source images.
//!
//! [`process_all`] runs the geometry stage and the compression stage for
//! every image, strictly in order and one full-resolution buffer at a time.
//! Settings are passed in as a [`BatchSettings`] snapshot taken at batch
//! start, so nothing a caller changes mid-batch leaks into later images.
//!
//! [`Session`] wraps the interactive cycle around it:
//!
//! ```text
//! add images → adjust settings → process → export | reset
//! ```
//!
//! ## Failure Policy
//!
//! A source that cannot be decoded aborts the whole batch with
//! [`ProcessError::Decode`], naming the image and its 1-based position. No
//! partial results are returned. Missing a size target is *not* a failure:
//! the closest candidate is kept and its [`SearchSummary`] says why the
//! search stopped.
//!
//! ## Progress
//!
//! Pass a [`Sender<ProcessEvent>`](std::sync::mpsc::Sender) to receive
//! events as images start, as search attempts complete and as images finish.
//! The CLI prints them from a separate thread via
//! [`output::format_process_event`](crate::output::format_process_event).

use crate::export::{ExportError, Exporter};
use crate::imaging::{
    CodecError, Compression, CompressionSettings, Dimensions, ImageCodec, OutputFormat, Quality,
    ResizeMode, Rotation, SearchAttempt, SearchError, SearchParams, Termination, TransformSettings,
    compress, render_transformed,
};
use crate::naming::{processed_name, unique_name};
use serde::Serialize;
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to decode image {index} ({name}): {source}")]
    Decode {
        index: usize,
        name: String,
        #[source]
        source: CodecError,
    },
    #[error("Failed to encode {name}: {source}")]
    Codec {
        name: String,
        #[source]
        source: CodecError,
    },
    #[error("Processing cancelled")]
    Cancelled,
    #[error("No images to process")]
    NoImages,
}

/// A loaded source image. Immutable once created.
#[derive(Debug, Clone)]
pub struct SourceImage {
    name: String,
    bytes: Vec<u8>,
    dimensions: Dimensions,
}

impl SourceImage {
    /// Identify `bytes` and keep them for processing.
    ///
    /// Only the header is read here; full decoding happens per batch.
    pub fn load(
        codec: &(impl ImageCodec + ?Sized),
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, CodecError> {
        let dimensions = codec.identify(&bytes)?;
        Ok(Self {
            name: name.into(),
            bytes,
            dimensions,
        })
    }

    pub fn from_path(codec: &(impl ImageCodec + ?Sized), path: &Path) -> Result<Self, CodecError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::load(codec, name, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }
}

/// How a target-size search ended for one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchSummary {
    pub target: u64,
    pub attempts: u32,
    pub termination: Termination,
}

/// Output of one transform + encode pass.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedImage {
    pub source_name: String,
    pub output_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub size: u64,
    pub dimensions: Dimensions,
    pub format: OutputFormat,
    pub quality: Quality,
    pub rotation: Rotation,
    pub cropped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchSummary>,
}

/// Immutable settings snapshot for one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSettings {
    pub transform: TransformSettings,
    pub compression: CompressionSettings,
    pub search: SearchParams,
}

impl BatchSettings {
    /// Requested byte size in target-size mode.
    pub fn target_bytes(&self) -> Option<u64> {
        match self.compression.mode {
            Compression::TargetSize(target) => Some(target.bytes()),
            Compression::Quality(_) => None,
        }
    }
}

/// Progress events emitted during [`process_all`].
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    BatchStarted {
        image_count: usize,
        format: OutputFormat,
        target_bytes: Option<u64>,
    },
    ImageStarted {
        index: usize,
        name: String,
        dimensions: Dimensions,
    },
    SearchAttempt {
        index: usize,
        attempt: SearchAttempt,
    },
    ImageProcessed {
        index: usize,
        name: String,
        output_name: String,
        dimensions: Dimensions,
        size: u64,
        quality: Quality,
        search: Option<SearchSummary>,
    },
}

/// Shared cancellation switch, checked between images and between search
/// attempts.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Transform and encode every image in order.
///
/// Aborts on the first decode failure; see the [module docs](self).
pub fn process_all<C: ImageCodec + ?Sized>(
    codec: &C,
    images: &[SourceImage],
    settings: &BatchSettings,
    progress: Option<Sender<ProcessEvent>>,
    cancel: &CancelFlag,
) -> Result<Vec<ProcessedImage>, ProcessError> {
    if images.is_empty() {
        return Err(ProcessError::NoImages);
    }

    log::info!(
        "processing {} image(s) as {}",
        images.len(),
        settings.compression.format.label()
    );
    send(
        &progress,
        ProcessEvent::BatchStarted {
            image_count: images.len(),
            format: settings.compression.format,
            target_bytes: settings.target_bytes(),
        },
    );

    let mut results = Vec::with_capacity(images.len());
    let mut taken = HashSet::with_capacity(images.len());
    for (position, image) in images.iter().enumerate() {
        if cancel.is_cancelled() {
            log::info!("batch cancelled after {} image(s)", position);
            return Err(ProcessError::Cancelled);
        }
        results.push(process_one(
            codec,
            position + 1,
            image,
            settings,
            &mut taken,
            &progress,
            cancel,
        )?);
    }
    Ok(results)
}

fn send(progress: &Option<Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = progress {
        tx.send(event).ok();
    }
}

fn process_one<C: ImageCodec + ?Sized>(
    codec: &C,
    index: usize,
    image: &SourceImage,
    settings: &BatchSettings,
    taken: &mut HashSet<String>,
    progress: &Option<Sender<ProcessEvent>>,
    cancel: &CancelFlag,
) -> Result<ProcessedImage, ProcessError> {
    send(
        progress,
        ProcessEvent::ImageStarted {
            index,
            name: image.name.clone(),
            dimensions: image.dimensions,
        },
    );

    let decoded = codec
        .decode(&image.bytes)
        .map_err(|source| ProcessError::Decode {
            index,
            name: image.name.clone(),
            source,
        })?;
    let rendered = render_transformed(&decoded, &settings.transform);
    drop(decoded);

    let encoded = compress(
        codec,
        &rendered.pixels,
        &settings.compression,
        &settings.search,
        |attempt| {
            send(
                progress,
                ProcessEvent::SearchAttempt {
                    index,
                    attempt: *attempt,
                },
            );
            if cancel.is_cancelled() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        },
    )
    .map_err(|e| match e {
        SearchError::Interrupted => ProcessError::Cancelled,
        SearchError::Codec(source) => ProcessError::Codec {
            name: image.name.clone(),
            source,
        },
    })?;

    let output_name = unique_name(
        processed_name(
            &image.name,
            &settings.transform,
            &settings.compression,
            encoded.quality,
        ),
        taken,
    );
    let search = match (encoded.search, settings.target_bytes()) {
        (Some((attempts, termination)), Some(target)) => Some(SearchSummary {
            target,
            attempts,
            termination,
        }),
        _ => None,
    };
    let dimensions = rendered.dimensions();

    log::info!(
        "{} → {} ({}x{}, {} bytes, quality {})",
        image.name,
        output_name,
        dimensions.width,
        dimensions.height,
        encoded.size,
        encoded.quality.percent()
    );
    send(
        progress,
        ProcessEvent::ImageProcessed {
            index,
            name: image.name.clone(),
            output_name: output_name.clone(),
            dimensions,
            size: encoded.size,
            quality: encoded.quality,
            search,
        },
    );

    Ok(ProcessedImage {
        source_name: image.name.clone(),
        output_name,
        bytes: encoded.bytes,
        size: encoded.size,
        dimensions,
        format: settings.compression.format,
        quality: encoded.quality,
        rotation: settings.transform.rotation,
        cropped: settings.transform.crop.enabled,
        search,
    })
}

/// Summary of a processed batch, written as JSON by the CLI.
#[derive(Debug, Serialize)]
pub struct BatchReport<'a> {
    pub format: OutputFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_bytes: Option<u64>,
    pub total_bytes: u64,
    pub images: &'a [ProcessedImage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exported: Vec<PathBuf>,
}

impl<'a> BatchReport<'a> {
    pub fn new(settings: &BatchSettings, images: &'a [ProcessedImage]) -> Self {
        Self {
            format: settings.compression.format,
            target_bytes: settings.target_bytes(),
            total_bytes: images.iter().map(|i| i.size).sum(),
            images,
            exported: Vec::new(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// One upload → configure → process → export/reset cycle.
///
/// The first image added is the reference for aspect lock and crop
/// placement.
#[derive(Debug, Default)]
pub struct Session {
    images: Vec<SourceImage>,
    /// Settings restored by [`Session::reset`].
    initial: BatchSettings,
    settings: BatchSettings,
    results: Vec<ProcessedImage>,
    cancel: CancelFlag,
}

impl Session {
    pub fn new(settings: BatchSettings) -> Self {
        Self {
            initial: settings.clone(),
            settings,
            ..Self::default()
        }
    }

    pub fn images(&self) -> &[SourceImage] {
        &self.images
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    pub fn results(&self) -> &[ProcessedImage] {
        &self.results
    }

    /// Handle for cancelling a running batch from another thread.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn reference(&self) -> Option<Dimensions> {
        self.images.first().map(SourceImage::dimensions)
    }

    pub fn add_image(&mut self, image: SourceImage) {
        let first = self.images.is_empty();
        let dims = image.dimensions();
        self.images.push(image);
        if first {
            self.settings.transform.resize.sync_aspect(dims);
            self.settings.transform.crop.place(dims);
        }
    }

    /// Direct access to the transform. Unlike the setters, edits here skip
    /// aspect sync and crop clamping.
    pub fn transform_mut(&mut self) -> &mut TransformSettings {
        &mut self.settings.transform
    }

    pub fn compression_mut(&mut self) -> &mut CompressionSettings {
        &mut self.settings.compression
    }

    pub fn search_mut(&mut self) -> &mut SearchParams {
        &mut self.settings.search
    }

    pub fn set_resize(&mut self, resize: ResizeMode) {
        self.settings.transform.resize = resize;
        if let Some(reference) = self.reference() {
            self.settings.transform.resize.sync_aspect(reference);
        }
    }

    /// Set an absolute width. With aspect lock the height follows.
    pub fn set_width(&mut self, new_width: u32) {
        let resize = match self.settings.transform.resize {
            ResizeMode::Absolute {
                height,
                keep_aspect,
                ..
            } => ResizeMode::Absolute {
                width: Some(new_width),
                height: if keep_aspect { None } else { height },
                keep_aspect,
            },
            ResizeMode::Scale { .. } => ResizeMode::Absolute {
                width: Some(new_width),
                height: None,
                keep_aspect: true,
            },
        };
        self.set_resize(resize);
    }

    /// Set an absolute height. With aspect lock the width follows.
    pub fn set_height(&mut self, new_height: u32) {
        let resize = match self.settings.transform.resize {
            ResizeMode::Absolute {
                width,
                keep_aspect,
                ..
            } => ResizeMode::Absolute {
                width: if keep_aspect { None } else { width },
                height: Some(new_height),
                keep_aspect,
            },
            ResizeMode::Scale { .. } => ResizeMode::Absolute {
                width: None,
                height: Some(new_height),
                keep_aspect: true,
            },
        };
        self.set_resize(resize);
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.settings.transform.rotation = rotation;
    }

    pub fn rotate_clockwise(&mut self) {
        self.set_rotation(self.settings.transform.rotation.clockwise());
    }

    pub fn rotate_counter_clockwise(&mut self) {
        self.set_rotation(self.settings.transform.rotation.counter_clockwise());
    }

    pub fn rotate_half_turn(&mut self) {
        self.set_rotation(self.settings.transform.rotation.half_turn());
    }

    /// Turn the crop box on or off. Turning it on centres it on the
    /// reference image.
    pub fn enable_crop(&mut self, enabled: bool) {
        let crop = &mut self.settings.transform.crop;
        crop.enabled = enabled;
        if !enabled {
            return;
        }
        if let Some(reference) = self.images.first().map(SourceImage::dimensions) {
            crop.center_on(reference);
        }
    }

    pub fn set_crop_size(&mut self, width: u32, height: u32) {
        let crop = &mut self.settings.transform.crop;
        crop.width = width.max(1);
        crop.height = height.max(1);
        if let Some(reference) = self.images.first().map(SourceImage::dimensions) {
            let (x, y) = (crop.x, crop.y);
            crop.set_offset(x, y, reference);
        }
    }

    /// Move the crop box, clamped inside the reference image.
    pub fn set_crop_offset(&mut self, x: u32, y: u32) {
        let crop = &mut self.settings.transform.crop;
        match self.images.first().map(SourceImage::dimensions) {
            Some(reference) => crop.set_offset(x, y, reference),
            None => {
                crop.x = x;
                crop.y = y;
                crop.centered = false;
            }
        }
    }

    pub fn set_zoom(&mut self, percent: u32) {
        self.settings.transform.crop.set_zoom(percent);
    }

    /// Process all images with a snapshot of the current settings.
    ///
    /// Previous results are discarded first; on error none are kept.
    pub fn process<C: ImageCodec + ?Sized>(
        &mut self,
        codec: &C,
        progress: Option<Sender<ProcessEvent>>,
    ) -> Result<&[ProcessedImage], ProcessError> {
        self.results.clear();
        let snapshot = self.settings.clone();
        self.results = process_all(codec, &self.images, &snapshot, progress, &self.cancel)?;
        Ok(&self.results)
    }

    /// Hand the current results to an exporter. Results are left untouched.
    pub fn export(&self, exporter: &dyn Exporter) -> Result<Vec<PathBuf>, ExportError> {
        exporter.export(&self.results)
    }

    /// Drop images, results and settings changes, and stop any running batch.
    pub fn reset(&mut self) {
        self.cancel.cancel();
        self.images.clear();
        self.results.clear();
        self.settings = self.initial.clone();
        self.cancel = CancelFlag::new();
    }
}
