//! Cheap checks run before a full decode.

use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Rejects oversized files and files that are not a known raster format.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Check the on-disk size against `max_file_size_mb`.
    pub fn check_size(&self, path: &Path, size: u64) -> Result<(), PipelineError> {
        let max_bytes = self.limits.max_file_size_mb.saturating_mul(1024 * 1024);
        if size > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: size / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }
        Ok(())
    }

    /// Check that the leading bytes carry a supported signature.
    pub fn check_header(&self, path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
        if bytes.len() < 4 {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "File too small to be a valid image".to_string(),
            });
        }
        if !Self::is_valid_image_header(bytes) {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "Unrecognized image format (invalid magic bytes)".to_string(),
            });
        }
        Ok(())
    }

    /// PNG, JPEG, WebP, BMP or TIFF signature.
    fn is_valid_image_header(header: &[u8]) -> bool {
        match header {
            [0xFF, 0xD8, 0xFF, ..] => true,
            [0x89, b'P', b'N', b'G', ..] => true,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => true,
            [b'B', b'M', ..] => true,
            [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => true,
            _ => false,
        }
    }
}
