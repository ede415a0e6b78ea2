//! Writes executed images and their side outputs.
//!
//! Layout under the output directory:
//!
//! ```text
//! <name>.<ext>                  enhanced image
//! <name>.metadata.json          preserved metadata (optional)
//! thumbnails/<name>.webp        thumbnail (optional)
//! originals/<name>.<src ext>    untouched source (optional)
//! ```
//!
//! Only the main image is fatal for the result; a failed side output is
//! logged and left out of the report.

use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::borrow::Cow;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::config::{OutputConfig, OutputFormat, DEFAULT_COMPRESSION_QUALITY};
use crate::error::{PipelineError, PipelineResult};
use crate::handle::{ImageHandle, Metadata};
use crate::types::{FailureKind, ProcessedImage, ProcessingResult};

use super::executor::ExecutedImage;
use super::naming::{self, NamingTemplate};

/// Subdirectory receiving thumbnails.
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Subdirectory receiving untouched originals.
pub const ORIGINALS_DIR: &str = "originals";

/// Encode `handle` as `format` and write it to `path`, creating parent
/// directories.
///
/// JPEG is encoded at `quality`. Lossless formats are written as-is unless
/// `quality` is below [`DEFAULT_COMPRESSION_QUALITY`], in which case the
/// pixels first take a JPEG round trip at that quality.
pub fn save(
    handle: &ImageHandle,
    path: &Path,
    format: OutputFormat,
    quality: u8,
) -> PipelineResult<()> {
    let bytes = encode(handle.image(), format, quality).map_err(|e| save_error(path, e))?;
    write_file(path, &bytes)
}

/// Write a WebP thumbnail whose longest edge is at most `max_size`.
pub fn save_thumbnail(handle: &ImageHandle, path: &Path, max_size: u32) -> PipelineResult<()> {
    let thumbnail = handle.image().thumbnail(max_size, max_size);
    let mut buffer = Cursor::new(Vec::new());
    prepare(&thumbnail, OutputFormat::Webp)
        .write_to(&mut buffer, ImageFormat::WebP)
        .map_err(|e| save_error(path, e))?;
    write_file(path, buffer.get_ref())
}

/// Write the untouched source image in its own format at full quality.
pub fn save_original(
    handle: &ImageHandle,
    path: &Path,
    format: OutputFormat,
) -> PipelineResult<()> {
    save(handle, path, format, 100)
}

/// Write metadata as a pretty JSON object.
pub fn save_metadata(metadata: &Metadata, path: &Path) -> PipelineResult<()> {
    let json = serde_json::to_vec_pretty(metadata).map_err(|e| save_error(path, e))?;
    write_file(path, &json)
}

/// Describe a `compression_quality` that leaves some outputs untouched:
/// above the default it only raises JPEG quality.
pub fn unused_quality_note(quality: u8, conversion: Option<OutputFormat>) -> Option<String> {
    if quality <= DEFAULT_COMPRESSION_QUALITY || conversion == Some(OutputFormat::Jpeg) {
        return None;
    }
    let outputs = match conversion {
        Some(format) => format!("{format} outputs"),
        None => "non-JPEG outputs".to_string(),
    };
    Some(format!(
        "compression_quality = {quality} only applies to JPEG; {outputs} are written losslessly"
    ))
}

fn save_error(path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Save {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| save_error(parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| save_error(path, e))
}

/// Narrow the pixel layout to what the encoder accepts.
fn prepare(image: &DynamicImage, format: OutputFormat) -> Cow<'_, DynamicImage> {
    match format {
        OutputFormat::Png | OutputFormat::Tiff => Cow::Borrowed(image),
        OutputFormat::Webp if image.color().has_alpha() => match image {
            DynamicImage::ImageRgba8(_) => Cow::Borrowed(image),
            _ => Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8())),
        },
        OutputFormat::Webp | OutputFormat::Bmp | OutputFormat::Jpeg => match image {
            DynamicImage::ImageRgb8(_) => Cow::Borrowed(image),
            _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
        },
    }
}

fn encode(image: &DynamicImage, format: OutputFormat, quality: u8) -> image::ImageResult<Vec<u8>> {
    let quality = quality.clamp(1, 100);
    match format {
        OutputFormat::Jpeg => encode_jpeg(image, quality),
        other if quality < DEFAULT_COMPRESSION_QUALITY => {
            let lossy = jpeg_round_trip(image, quality)?;
            encode_lossless(&lossy, other)
        }
        other => encode_lossless(image, other),
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(&image.to_rgb8())?;
    Ok(buffer.into_inner())
}

fn encode_lossless(image: &DynamicImage, format: OutputFormat) -> image::ImageResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    prepare(image, format).write_to(&mut buffer, format.image_format())?;
    Ok(buffer.into_inner())
}

/// Pass the color channels through a JPEG encode and decode. Alpha is kept
/// from the input.
fn jpeg_round_trip(image: &DynamicImage, quality: u8) -> image::ImageResult<DynamicImage> {
    let jpeg = encode_jpeg(image, quality)?;
    let lossy = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)?.to_rgb8();
    if !image.color().has_alpha() {
        return Ok(DynamicImage::ImageRgb8(lossy));
    }

    let mut rgba = image.to_rgba8();
    for (pixel, color) in rgba.pixels_mut().zip(lossy.pixels()) {
        pixel.0[..3].copy_from_slice(&color.0);
    }
    Ok(DynamicImage::ImageRgba8(rgba))
}

/// Naming and side-output policy for one run.
#[derive(Debug, Clone)]
pub struct OutputSink {
    output_dir: PathBuf,
    naming: NamingTemplate,
    quality: u8,
    thumbnail_size: Option<u32>,
    preserve_original: bool,
    write_metadata: bool,
}

impl OutputSink {
    pub fn new(output_dir: PathBuf, output: &OutputConfig, quality: u8) -> Self {
        Self {
            output_dir,
            naming: NamingTemplate::new(&output.naming_template),
            quality,
            thumbnail_size: output.thumbnails.then_some(output.thumbnail_size),
            preserve_original: output.preserve_original,
            write_metadata: output.write_metadata,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the output directory if it is missing.
    pub fn prepare_dir(&self) -> PipelineResult<()> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| save_error(&self.output_dir, e))
    }

    /// Write on the blocking pool and build the final result.
    pub async fn write(&self, executed: ExecutedImage) -> ProcessingResult {
        let sink = self.clone();
        let source_path = executed.source.path.clone();

        match tokio::task::spawn_blocking(move || sink.write_sync(executed)).await {
            Ok(Ok(processed)) => ProcessingResult::Success(Box::new(processed)),
            Ok(Err(e)) => {
                tracing::error!("Failed: {:?} - {e}", source_path);
                ProcessingResult::failed(&source_path, e.kind(), e.to_string())
            }
            Err(e) => ProcessingResult::failed(
                &source_path,
                FailureKind::Internal,
                format!("save task failed: {e}"),
            ),
        }
    }

    /// Write the image and its side outputs.
    pub fn write_sync(&self, executed: ExecutedImage) -> PipelineResult<ProcessedImage> {
        let stamp = naming::timestamp(Local::now());
        let stem = executed.source.stem();
        let name = self.naming.render(&stem, &stamp);

        let output_path = self
            .output_dir
            .join(self.naming.file_name(&stem, &stamp, executed.format));
        save(&executed.handle, &output_path, executed.format, self.quality)?;
        tracing::info!("Saved {:?}", output_path);

        let thumbnail_path = self.thumbnail_size.and_then(|size| {
            let path = self.output_dir.join(THUMBNAILS_DIR).join(format!("{name}.webp"));
            side_output("thumbnail", &path, save_thumbnail(&executed.handle, &path, size))
        });

        let original_path = if self.preserve_original {
            let format = executed.source.output_format().unwrap_or(OutputFormat::Png);
            let path = self
                .output_dir
                .join(ORIGINALS_DIR)
                .join(format!("{name}.{}", format.extension()));
            side_output(
                "original",
                &path,
                save_original(&executed.source.handle, &path, format),
            )
        } else {
            None
        };

        let metadata = executed.handle.metadata();
        let metadata_path = if self.write_metadata && !metadata.is_empty() {
            let path = self.output_dir.join(format!("{name}.metadata.json"));
            side_output("metadata", &path, save_metadata(metadata, &path))
        } else {
            None
        };

        Ok(ProcessedImage {
            source_path: executed.source.path,
            content_hash: executed.source.content_hash,
            output_path,
            thumbnail_path,
            original_path,
            metadata_path,
            width: executed.handle.width(),
            height: executed.handle.height(),
            format: executed.format.name().to_string(),
            applied_operations: executed.applied_operations,
            skipped_operations: executed.skipped_operations,
            detections: executed.detections,
        })
    }
}

fn side_output(what: &str, path: &Path, result: PipelineResult<()>) -> Option<PathBuf> {
    match result {
        Ok(()) => Some(path.to_path_buf()),
        Err(e) => {
            tracing::warn!("Could not write {what}: {e}");
            None
        }
    }
}
