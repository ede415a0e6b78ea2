//! Error types for the Lustre image-enhancement pipeline.
//!
//! Errors are organized by stage so that each failure can be isolated at the
//! right boundary: directory errors abort a run, decode and save errors fail a
//! single image, operation and inference errors skip a single step.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::FailureKind;

/// Top-level error type for Lustre operations.
#[derive(Error, Debug)]
pub enum LustreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Operation registry errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
///
/// `Config::load` never surfaces these; they are logged and the default
/// configuration is used instead. `Config::load_strict` returns them.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse JSON configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse TOML config: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Failed to serialize the configuration
    #[error("Failed to serialize config: {0}")]
    SerializeError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input directory does not exist
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Input path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Input directory could not be listed
    #[error("Cannot read directory {path}: {message}")]
    Directory { path: PathBuf, message: String },

    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// A single transform failed
    #[error("Operation '{operation}' failed: {message}")]
    Operation { operation: String, message: String },

    /// Writing an output file failed
    #[error("Save error for {path}: {message}")]
    Save { path: PathBuf, message: String },

    /// The inference backend failed or is unavailable
    #[error("Inference error in {task}: {message}")]
    Inference {
        task: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },
}

impl PipelineError {
    /// Shorthand for an operation failure.
    pub fn operation(operation: &str, message: impl Into<String>) -> Self {
        Self::Operation {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for an inference failure without an HTTP status.
    pub fn inference(task: &str, message: impl Into<String>) -> Self {
        Self::Inference {
            task: task.to_string(),
            message: message.into(),
            status_code: None,
        }
    }

    /// The per-image failure category this error maps to.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::DirectoryNotFound(_) | Self::NotADirectory(_) | Self::Directory { .. } => {
                FailureKind::Directory
            }
            Self::Decode { .. }
            | Self::UnsupportedFormat { .. }
            | Self::FileTooLarge { .. }
            | Self::ImageTooLarge { .. }
            | Self::Timeout { .. } => FailureKind::Decode,
            Self::Operation { .. } => FailureKind::Operation,
            Self::Save { .. } => FailureKind::Save,
            Self::Inference { .. } => FailureKind::Inference,
        }
    }

    /// Whether this error aborts the whole run rather than a single image.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self.kind(), FailureKind::Directory)
    }
}

/// Operation registry errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// An operation with this name is already registered
    #[error("Operation '{0}' is already registered")]
    DuplicateName(String),

    /// Another operation already occupies this position
    #[error("Order {order} for '{name}' is already taken by '{existing}'")]
    DuplicateOrder {
        name: String,
        order: u32,
        existing: String,
    },

    /// No operation with this name
    #[error("Unknown operation: {0}")]
    NotFound(String),
}

/// Convenience type alias for Lustre results.
pub type Result<T> = std::result::Result<T, LustreError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
