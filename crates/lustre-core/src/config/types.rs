//! Sub-configuration structs and parameter enums with documented defaults.

use image::ImageFormat;
use serde::{Deserialize, Serialize};

use super::lenient;
use std::path::PathBuf;

/// Where the watermark text is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum WatermarkPosition {
    Center,
    #[default]
    BottomRight,
    TopLeft,
}

impl From<String> for WatermarkPosition {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "center" | "centre" => Self::Center,
            "bottom_right" => Self::BottomRight,
            "top_left" => Self::TopLeft,
            other => {
                tracing::warn!("Unknown watermark_position '{other}', using top_left");
                Self::TopLeft
            }
        }
    }
}

/// Mirror axis for the flip operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum FlipMode {
    #[default]
    None,
    Horizontal,
    Vertical,
}

impl From<String> for FlipMode {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "" | "none" => Self::None,
            "horizontal" => Self::Horizontal,
            "vertical" => Self::Vertical,
            other => {
                tracing::warn!("Unknown flip_mode '{other}', flip disabled");
                Self::None
            }
        }
    }
}

/// Encoded output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
    Bmp,
    Tiff,
}

impl OutputFormat {
    /// Parse a format name (case-insensitive, "jpg" accepted).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::Webp),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Map a decoder-reported format onto an output format.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::WebP => Some(Self::Webp),
            ImageFormat::Bmp => Some(Self::Bmp),
            ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Webp => ImageFormat::WebP,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
        }
    }

    /// File extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    /// Lowercase name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg | Self::Bmp)
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unsupported output format '{value}'"))
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        format.name().to_uppercase()
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Input discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Supported input extensions (matched case-insensitively)
    pub supported_formats: Vec<String>,

    /// Descend into subdirectories
    pub recursive: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            supported_formats: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
            recursive: false,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum chunks processed concurrently. Kept small: every in-flight
    /// image is held fully decoded.
    #[serde(deserialize_with = "lenient::saturating_usize")]
    pub workers: usize,

    /// Images per chunk
    #[serde(deserialize_with = "lenient::saturating_usize")]
    pub chunk_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            chunk_size: 4,
        }
    }
}

/// Output naming and side outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File name template; supports `{original_name}` and `{timestamp}`
    pub naming_template: String,

    /// Write a thumbnail next to each output
    pub thumbnails: bool,

    /// Thumbnail size in pixels (longest edge)
    #[serde(deserialize_with = "lenient::saturating_u32")]
    pub thumbnail_size: u32,

    /// Write an untouched copy of each source image
    pub preserve_original: bool,

    /// Write preserved metadata as a JSON sidecar
    pub write_metadata: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            naming_template: "{original_name}_{timestamp}".to_string(),
            thumbnails: false,
            thumbnail_size: 256,
            preserve_original: false,
            write_metadata: true,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    #[serde(deserialize_with = "lenient::saturating_u64")]
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    #[serde(deserialize_with = "lenient::saturating_u32")]
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    #[serde(deserialize_with = "lenient::saturating_u64")]
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 20000,
            decode_timeout_ms: 10000,
        }
    }
}

/// Inference backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of a remote inference service. Without it, inference-backed
    /// operations degrade to returning their input.
    pub endpoint: Option<String>,

    /// Per-call timeout in milliseconds
    #[serde(deserialize_with = "lenient::saturating_u64")]
    pub timeout_ms: u64,

    /// Calls allowed in flight at once across all workers
    #[serde(deserialize_with = "lenient::saturating_usize")]
    pub max_concurrent: usize,

    /// Retries for transient failures
    #[serde(deserialize_with = "lenient::saturating_u32")]
    pub retry_attempts: u32,

    /// Base backoff delay in milliseconds
    #[serde(deserialize_with = "lenient::saturating_u64")]
    pub retry_delay_ms: u64,

    /// Send a whole chunk to the batched enhance call
    pub batch_enhance: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 60000,
            max_concurrent: 1,
            retry_attempts: 2,
            retry_delay_ms: 500,
            batch_enhance: true,
        }
    }
}

/// Completion notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotificationConfig {
    /// Send notifications at all
    pub enabled: bool,

    /// Notify for every saved image, not just the batch summary
    pub per_image: bool,

    /// POST notifications as JSON to this URL instead of logging them
    pub webhook_url: Option<String>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,

    /// Also write a log file into this directory
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            directory: None,
        }
    }
}
