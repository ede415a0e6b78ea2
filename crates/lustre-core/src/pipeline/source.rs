//! Image source: enumerate an input directory and load files from it.

use image::ImageFormat;
use std::path::{Path, PathBuf};

use crate::config::{InputConfig, LimitsConfig, OutputFormat};
use crate::error::PipelineError;
use crate::handle::ImageHandle;

use super::decode::ImageDecoder;
use super::discovery::{DiscoveredFile, FileDiscovery};
use super::hash::Hasher;
use super::metadata::MetadataExtractor;
use super::validate::Validator;

/// A loaded source image, ready for the executor.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub path: PathBuf,
    /// Decoded raster with the file's EXIF metadata
    pub handle: ImageHandle,
    /// Format detected from the file content
    pub format: ImageFormat,
    /// BLAKE3 hash of the file bytes
    pub content_hash: String,
    pub file_size: u64,
}

impl SourceImage {
    /// The encodable format matching the source, if Lustre can write it.
    pub fn output_format(&self) -> Option<OutputFormat> {
        OutputFormat::from_image_format(self.format)
    }

    /// File stem used by the naming template.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string())
    }
}

/// Enumerates and loads candidate images.
pub struct ImageSource {
    discovery: FileDiscovery,
    validator: Validator,
    decoder: ImageDecoder,
}

impl ImageSource {
    pub fn new(input: InputConfig, limits: LimitsConfig) -> Self {
        Self {
            discovery: FileDiscovery::new(input),
            validator: Validator::new(limits.clone()),
            decoder: ImageDecoder::new(limits),
        }
    }

    /// Supported files in `directory`, sorted by path.
    pub fn enumerate(&self, directory: &Path) -> Result<Vec<DiscoveredFile>, PipelineError> {
        self.discovery.enumerate(directory)
    }

    /// Read, validate, hash and decode one file.
    ///
    /// Any failure here is a per-image `Decode`-class error.
    pub async fn load(&self, path: &Path) -> Result<SourceImage, PipelineError> {
        let start = std::time::Instant::now();

        let bytes = tokio::fs::read(path).await.map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read file: {e}"),
        })?;
        let file_size = bytes.len() as u64;

        self.validator.check_size(path, file_size)?;
        self.validator.check_header(path, &bytes)?;

        let content_hash = Hasher::content_hash(&bytes);
        let metadata = MetadataExtractor::extract(&bytes);
        let decoded = self.decoder.decode(bytes, path).await?;

        tracing::trace!(
            "Loaded {:?}: {}x{} {:?}, {} metadata tag(s) in {:?}",
            path,
            decoded.width,
            decoded.height,
            decoded.format,
            metadata.len(),
            start.elapsed()
        );

        Ok(SourceImage {
            path: path.to_path_buf(),
            handle: ImageHandle::with_metadata(decoded.image, metadata),
            format: decoded.format,
            content_hash,
            file_size,
        })
    }
}
