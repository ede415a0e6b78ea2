//! Core data types for the Lustre pipeline.
//!
//! These types describe the outcome of pushing one image (or one batch)
//! through the pipeline. They are serialized into the per-run report.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Category of a failure, used for both fatal per-image failures and
/// skipped operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Input directory missing or unreadable
    Directory,
    /// File could not be read or decoded
    Decode,
    /// A transform raised
    Operation,
    /// The final write failed
    Save,
    /// The inference backend failed
    Inference,
    /// A panic escaped the executor
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Directory => "directory",
            FailureKind::Decode => "decode",
            FailureKind::Operation => "operation",
            FailureKind::Save => "save",
            FailureKind::Inference => "inference",
            FailureKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// An axis-aligned box in pixel coordinates (e.g. a detected face).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the pixel at `(px, py)` lies inside this box.
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x
            && py >= self.y
            && px < self.x.saturating_add(self.width)
            && py < self.y.saturating_add(self.height)
    }
}

/// An operation that was bypassed under skip-and-continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedOperation {
    /// Registry name of the operation
    pub operation: String,

    /// Why it was skipped (operation or inference failure)
    pub kind: FailureKind,

    /// Human-readable reason
    pub reason: String,
}

/// A successfully processed image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedImage {
    /// Path of the source file
    pub source_path: PathBuf,

    /// BLAKE3 hash of the source bytes
    pub content_hash: String,

    /// Where the enhanced image was written
    pub output_path: PathBuf,

    /// Thumbnail location, if thumbnails are enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,

    /// Copy of the untouched original, if requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<PathBuf>,

    /// Metadata sidecar, if metadata was preserved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_path: Option<PathBuf>,

    /// Final width in pixels
    pub width: u32,

    /// Final height in pixels
    pub height: u32,

    /// Encoded output format ("png", "jpeg", ...)
    pub format: String,

    /// Operations that ran, in the order they ran
    pub applied_operations: Vec<String>,

    /// Operations that failed and were bypassed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_operations: Vec<SkippedOperation>,

    /// Faces reported by the face detection operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detections: Option<Vec<BoundingBox>>,
}

/// An image that could not be processed at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedImage {
    /// Path of the source file
    pub source_path: PathBuf,

    /// Failure category
    pub kind: FailureKind,

    /// Error message
    pub message: String,
}

/// Per-image outcome: exactly one of success or failure.
///
/// Internally tagged: `{"status":"success",...}` or `{"status":"failure",...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProcessingResult {
    Success(Box<ProcessedImage>),
    Failure(FailedImage),
}

impl ProcessingResult {
    /// Build a failure result.
    pub fn failed(source_path: &Path, kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure(FailedImage {
            source_path: source_path.to_path_buf(),
            kind,
            message: message.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Path of the source image this result describes.
    pub fn source_path(&self) -> &Path {
        match self {
            Self::Success(image) => &image.source_path,
            Self::Failure(failed) => &failed.source_path,
        }
    }

    /// Number of operations bypassed while producing this result.
    pub fn skipped_operations(&self) -> usize {
        match self {
            Self::Success(image) => image.skipped_operations.len(),
            Self::Failure(_) => 0,
        }
    }
}

/// Processing statistics for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProcessingStats {
    /// Images handed to the worker pool
    pub submitted: usize,

    /// Images written successfully
    pub succeeded: usize,

    /// Images that failed to load or save
    pub failed: usize,

    /// Operations bypassed across all images
    pub skipped_operations: usize,

    /// Images never submitted because the run was stopped
    pub cancelled: usize,

    /// Processing rate in images per second
    pub images_per_second: f64,

    /// Total processing time in seconds
    pub total_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_processed() -> ProcessedImage {
        ProcessedImage {
            source_path: PathBuf::from("/photos/beach.jpg"),
            content_hash: "abc123".to_string(),
            output_path: PathBuf::from("/out/beach_20240101_120000.jpg"),
            thumbnail_path: None,
            original_path: None,
            metadata_path: None,
            width: 200,
            height: 100,
            format: "jpeg".to_string(),
            applied_operations: vec!["upscale".to_string()],
            skipped_operations: vec![],
            detections: None,
        }
    }

    #[test]
    fn test_result_serializes_with_status_tag() {
        let result = ProcessingResult::Success(Box::new(sample_processed()));
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""status":"success""#));
        assert!(!json.contains("thumbnail_path"));
        assert!(!json.contains("skipped_operations"));

        let failed = ProcessingResult::failed(Path::new("bad.png"), FailureKind::Decode, "corrupt");
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains(r#""status":"failure""#));
        assert!(json.contains(r#""kind":"decode""#));
    }

    #[test]
    fn test_result_accessors() {
        let mut image = sample_processed();
        image.skipped_operations.push(SkippedOperation {
            operation: "sepia".into(),
            kind: FailureKind::Operation,
            reason: "boom".into(),
        });
        let result = ProcessingResult::Success(Box::new(image));
        assert!(result.is_success());
        assert_eq!(result.skipped_operations(), 1);
        assert_eq!(result.source_path(), Path::new("/photos/beach.jpg"));
    }

    #[test]
    fn test_bounding_box_contains() {
        let b = BoundingBox::new(10, 10, 5, 5);
        assert!(b.contains(10, 10));
        assert!(b.contains(14, 14));
        assert!(!b.contains(15, 10));
        assert!(!b.contains(9, 12));
    }
}
