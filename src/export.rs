//! Writing processed images out of the session.
//!
//! Exporters only read the batch result; a failed export leaves the
//! processed buffers untouched so the caller can retry elsewhere.
//!
//! - [`DirectoryExporter`]: one file per image under its generated name.
//! - [`PdfExporter`]: one A4 page per image, fitted inside a 10 mm margin
//!   and centred. JPEG buffers are embedded as-is (`DCTDecode`), lossless
//!   PNG buffers are decoded and re-packed as zlib RGB (`FlateDecode`).
//!   AVIF has no PDF filter and is rejected.

use crate::imaging::OutputFormat;
use crate::process::ProcessedImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("cannot decode {name} for export: {source}")]
    Image {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("{name}: {} output cannot be placed in this export", .format.label())]
    UnsupportedFormat { name: String, format: OutputFormat },
    #[error("nothing to export")]
    Empty,
    #[error("two images share the output name {0}")]
    DuplicateName(String),
}

/// Destination for a finished batch.
pub trait Exporter {
    /// Write every image, returning the paths created.
    fn export(&self, images: &[ProcessedImage]) -> Result<Vec<PathBuf>, ExportError>;
}

// =========================================================================
// Directory
// =========================================================================

/// Writes each buffer to `<dir>/<output_name>`, creating `dir` if needed.
///
/// Names must be distinct (case-insensitively); a batch that would write
/// one file over another is rejected before anything is written.
#[derive(Debug, Clone)]
pub struct DirectoryExporter {
    dir: PathBuf,
}

impl DirectoryExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Exporter for DirectoryExporter {
    fn export(&self, images: &[ProcessedImage]) -> Result<Vec<PathBuf>, ExportError> {
        if images.is_empty() {
            return Err(ExportError::Empty);
        }
        let mut seen = HashSet::with_capacity(images.len());
        for image in images {
            if !seen.insert(image.output_name.to_lowercase()) {
                return Err(ExportError::DuplicateName(image.output_name.clone()));
            }
        }
        std::fs::create_dir_all(&self.dir)?;

        let mut written = Vec::with_capacity(images.len());
        for image in images {
            let path = self.dir.join(&image.output_name);
            std::fs::write(&path, &image.bytes)?;
            log::debug!("wrote {} ({} bytes)", path.display(), image.bytes.len());
            written.push(path);
        }
        Ok(written)
    }
}

// =========================================================================
// PDF
// =========================================================================

/// A4 portrait in points.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
/// 10 mm.
pub const PAGE_MARGIN: f32 = 28.35;

/// Placement of an image on the page: `(x, y, width, height)` in points,
/// origin bottom-left.
///
/// The image is scaled to the largest size that fits inside the margins
/// with its aspect ratio unchanged, then centred on the page.
pub fn page_layout(image_width: u32, image_height: u32) -> (f32, f32, f32, f32) {
    let avail_w = PAGE_WIDTH - 2.0 * PAGE_MARGIN;
    let avail_h = PAGE_HEIGHT - 2.0 * PAGE_MARGIN;
    let iw = image_width.max(1) as f32;
    let ih = image_height.max(1) as f32;

    let scale = (avail_w / iw).min(avail_h / ih);
    let w = iw * scale;
    let h = ih * scale;
    ((PAGE_WIDTH - w) / 2.0, (PAGE_HEIGHT - h) / 2.0, w, h)
}

/// Writes the whole batch into one PDF, one page per image.
#[derive(Debug, Clone)]
pub struct PdfExporter {
    path: PathBuf,
}

impl PdfExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Build the document in memory.
    pub fn render(&self, images: &[ProcessedImage]) -> Result<Vec<u8>, ExportError> {
        if images.is_empty() {
            return Err(ExportError::Empty);
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::with_capacity(images.len());

        for image in images {
            let xobject = image_xobject(image)?;
            let image_id = doc.add_object(Object::Stream(xobject));
            let page_id = add_page(&mut doc, pages_id, image_id, image)?;
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out)?;
        Ok(out)
    }
}

impl Exporter for PdfExporter {
    fn export(&self, images: &[ProcessedImage]) -> Result<Vec<PathBuf>, ExportError> {
        let bytes = self.render(images)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, &bytes)?;
        log::debug!(
            "wrote {} ({} pages, {} bytes)",
            self.path.display(),
            images.len(),
            bytes.len()
        );
        Ok(vec![self.path.clone()])
    }
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    image_id: ObjectId,
    image: &ProcessedImage,
) -> Result<ObjectId, ExportError> {
    let (x, y, w, h) = page_layout(image.dimensions.width, image.dimensions.height);
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    w.into(),
                    0.into(),
                    0.into(),
                    h.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });
    Ok(page_id)
}

fn image_xobject(image: &ProcessedImage) -> Result<Stream, ExportError> {
    let (filter, data) = match image.format {
        OutputFormat::Jpeg => ("DCTDecode", image.bytes.clone()),
        OutputFormat::Lossless => ("FlateDecode", deflate_rgb(image)?),
        OutputFormat::Avif => {
            return Err(ExportError::UnsupportedFormat {
                name: image.output_name.clone(),
                format: image.format,
            });
        }
    };

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(image.dimensions.width as i64));
    dict.set("Height", Object::Integer(image.dimensions.height as i64));
    dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    dict.set("Length", Object::Integer(data.len() as i64));

    // Already filtered; keep lopdf from compressing it a second time.
    Ok(Stream::new(dict, data).with_compression(false))
}

fn deflate_rgb(image: &ProcessedImage) -> Result<Vec<u8>, ExportError> {
    let decoded = image::load_from_memory_with_format(&image.bytes, image::ImageFormat::Png)
        .map_err(|source| ExportError::Image {
            name: image.output_name.clone(),
            source,
        })?;
    let rgb = decoded.to_rgb8();

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
    encoder.write_all(rgb.as_raw())?;
    Ok(encoder.finish()?)
}
