//! Configuration management for Lustre.
//!
//! The configuration file is a flat JSON object of operation parameters
//! (the keys the original batch tool used) plus nested sections for batch,
//! output, limits, inference, notification and logging settings. Every
//! struct implements `Default` with the documented defaults, and a user file
//! is merged onto those defaults key by key, so a partial file still yields a
//! fully populated config.

mod lenient;
mod merge;
mod types;
mod validate;

pub use merge::merge_values;
pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default `compression_quality`. Lossless outputs are only degraded below it.
pub const DEFAULT_COMPRESSION_QUALITY: u8 = 85;

/// Root configuration structure for Lustre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for input images
    pub input_directory: PathBuf,

    /// Directory receiving enhanced images
    pub output_directory: PathBuf,

    /// Scale factor for upscaling (1.0 disables)
    pub upscale_factor: f32,

    /// Contrast enhancement factor (1.0 disables)
    pub contrast_factor: f32,

    /// Color saturation factor (1.0 disables)
    pub color_factor: f32,

    /// Apply a 3x3 sharpening kernel
    pub sharpen: bool,

    /// Watermark text (empty disables)
    pub watermark_text: String,

    /// Watermark anchor
    pub watermark_position: WatermarkPosition,

    /// Nominal watermark glyph height in pixels
    #[serde(deserialize_with = "lenient::saturating_u32")]
    pub watermark_font_size: u32,

    /// Watermark alpha (0-255)
    #[serde(deserialize_with = "lenient::saturating_u8")]
    pub watermark_opacity: u8,

    /// Re-encode output in this format (absent keeps the source format)
    #[serde(deserialize_with = "lenient::output_format")]
    pub format_conversion: Option<OutputFormat>,

    /// Crop box as [left, top, right, bottom] (all zero disables)
    #[serde(deserialize_with = "lenient::u32_array")]
    pub crop_settings: [u32; 4],

    /// Resize target as [width, height] (both zero disables; one zero keeps
    /// the aspect ratio)
    #[serde(deserialize_with = "lenient::u32_array")]
    pub resize_settings: [u32; 2],

    /// Counter-clockwise rotation in degrees (0 disables)
    pub rotation_angle: f32,

    /// Mirror axis
    pub flip_mode: FlipMode,

    /// Median-filter denoising
    pub noise_reduction: bool,

    /// Luma histogram equalization
    pub histogram_equalization: bool,

    /// Sepia tone filter
    pub sepia_filter: bool,

    /// Gaussian vignette filter
    pub vignette_filter: bool,

    /// Detect faces and outline them (inference)
    pub face_detection: bool,

    /// Remove the background (inference)
    pub background_removal: bool,

    /// AI super-resolution / enhancement (inference)
    pub ai_enhance: bool,

    /// Output quality (1-100): the JPEG encoder quality, and below the
    /// default a lossy pass before lossless encoders
    #[serde(deserialize_with = "lenient::saturating_u8")]
    pub compression_quality: u8,

    /// Carry source metadata onto the output
    pub preserve_metadata: bool,

    /// Input discovery settings
    pub input: InputConfig,

    /// Worker pool settings
    pub batch: BatchConfig,

    /// Output naming and side outputs
    pub output: OutputConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Inference backend settings
    pub inference: InferenceConfig,

    /// Completion notifications
    pub notifications: NotificationConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_directory: PathBuf::from("."),
            output_directory: PathBuf::from("output"),
            upscale_factor: 2.0,
            contrast_factor: 1.0,
            color_factor: 1.0,
            sharpen: false,
            watermark_text: String::new(),
            watermark_position: WatermarkPosition::BottomRight,
            watermark_font_size: 36,
            watermark_opacity: 128,
            format_conversion: None,
            crop_settings: [0, 0, 0, 0],
            resize_settings: [0, 0],
            rotation_angle: 0.0,
            flip_mode: FlipMode::None,
            noise_reduction: false,
            histogram_equalization: false,
            sepia_filter: false,
            vignette_filter: false,
            face_detection: false,
            background_removal: false,
            ai_enhance: false,
            compression_quality: DEFAULT_COMPRESSION_QUALITY,
            preserve_metadata: true,
            input: InputConfig::default(),
            batch: BatchConfig::default(),
            output: OutputConfig::default(),
            limits: LimitsConfig::default(),
            inference: InferenceConfig::default(),
            notifications: NotificationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file, never failing.
    ///
    /// A missing, unreadable or malformed file yields the default
    /// configuration and a warning.
    pub fn load(path: &Path) -> Self {
        match Self::load_strict(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "Failed to load config {:?}: {e}. Using default configuration.",
                    path
                );
                Self::default()
            }
        }
    }

    /// Load configuration from a file, surfacing read and parse errors.
    ///
    /// The file is merged onto the defaults and out-of-range values are
    /// clamped (with a warning per adjustment).
    pub fn load_strict(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let overrides: serde_json::Value = if is_toml(path) {
            let value: toml::Value = toml::from_str(&content)?;
            serde_json::to_value(value)?
        } else {
            serde_json::from_str(&content)?
        };

        let mut config = Self::merge(&Self::default(), &overrides)?;
        for adjustment in config.sanitize() {
            tracing::warn!("Config {:?}: {adjustment}", path);
        }
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load from an explicit path, or from the first config file found in
    /// the working directory (`config.json`) or the platform config dir.
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        match Self::locate(explicit) {
            Some(path) => Self::load(&path),
            None => {
                tracing::info!("No configuration file found, using defaults");
                Self::default()
            }
        }
    }

    /// The config file `load_or_default` would read, if any.
    ///
    /// An explicit path is returned as-is even when it does not exist.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        [PathBuf::from("config.json"), Self::default_path()]
            .into_iter()
            .find(|p| p.exists())
    }

    /// Apply `overrides` onto `base` key by key.
    ///
    /// Only keys present in `overrides` change; nested sections merge
    /// recursively. `merge(base, {})` returns `base` unchanged.
    pub fn merge(base: &Config, overrides: &serde_json::Value) -> Result<Self, ConfigError> {
        let mut value = serde_json::to_value(base)?;
        merge_values(&mut value, overrides);
        Ok(serde_json::from_value(value)?)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/org.lustre.lustre/config.json
    /// - Linux: ~/.config/lustre/config.json
    /// - Windows: C:\Users\<User>\AppData\Roaming\lustre\lustre\config\config.json
    ///
    /// Falls back to ~/.lustre/config.json if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "lustre", "lustre")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.json"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".lustre").join("config.json")
            })
    }

    /// Resolved input directory (with ~ expansion).
    pub fn input_dir(&self) -> PathBuf {
        expand(&self.input_directory)
    }

    /// Resolved output directory (with ~ expansion).
    pub fn output_dir(&self) -> PathBuf {
        expand(&self.output_directory)
    }

    /// Serialize the config to a pretty JSON string.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"))
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}
