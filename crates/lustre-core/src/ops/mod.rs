//! Image operations and the registry that orders them.
//!
//! Every operation is a named, ordered entry in the [`OperationRegistry`]. An
//! entry pairs a selector (reads the [`Config`](crate::Config) and yields the
//! operation's parameters when it is enabled) with a transform. Pixel
//! transforms are plain functions over an [`ImageHandle`]; inference
//! transforms name a task for the [`InferenceContext`](crate::inference::InferenceContext).
//!
//! - **geometry**: upscale, crop, resize, rotate, flip, format conversion
//! - **color**: contrast, saturation, sepia, histogram equalization
//! - **filters**: sharpen, noise reduction, vignette
//! - **watermark**: bitmap-font text overlay
//! - **detection**: outline detected faces

pub mod color;
pub mod detection;
pub mod filters;
pub mod geometry;
pub mod registry;
pub mod watermark;

pub use registry::{OperationRegistry, OperationSpec, PlannedOperation};

use serde::Serialize;

use crate::config::{FlipMode, OutputFormat, WatermarkPosition};
use crate::error::PipelineResult;
use crate::handle::ImageHandle;

/// Typed parameters, one variant per operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationParams {
    /// `max_dimension` bounds either output edge.
    Upscale {
        factor: f32,
        max_dimension: u32,
    },
    Contrast {
        factor: f32,
    },
    Color {
        factor: f32,
    },
    Sharpen,
    Watermark {
        text: String,
        position: WatermarkPosition,
        font_size: u32,
        opacity: u8,
    },
    ConvertFormat {
        format: OutputFormat,
    },
    /// Box in source coordinates; a zero `right`/`bottom` means the image edge.
    Crop {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },
    /// Target size; a zero dimension is derived from the other.
    Resize {
        width: u32,
        height: u32,
        max_dimension: u32,
    },
    /// Degrees, counter-clockwise.
    Rotate {
        angle: f32,
    },
    Flip {
        mode: FlipMode,
    },
    NoiseReduction {
        radius: u32,
    },
    HistogramEqualization,
    Sepia,
    Vignette {
        sigma: f32,
    },
    FaceDetection,
    BackgroundRemoval,
    AiEnhance,
}

impl OperationParams {
    /// The output format this step commits the image to, if any.
    pub fn output_format(&self) -> Option<OutputFormat> {
        match self {
            Self::ConvertFormat { format } => Some(*format),
            _ => None,
        }
    }
}

/// A pure pixel transform: never mutates its input.
pub type PixelFn = fn(&ImageHandle, &OperationParams) -> PipelineResult<ImageHandle>;

/// Work delegated to the inference backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceTask {
    DetectFaces,
    RemoveBackground,
    Enhance,
}

impl InferenceTask {
    pub fn name(self) -> &'static str {
        match self {
            Self::DetectFaces => "detect_faces",
            Self::RemoveBackground => "remove_background",
            Self::Enhance => "enhance",
        }
    }
}

/// How an operation is carried out.
#[derive(Debug, Clone, Copy)]
pub enum Transform {
    Pixel(PixelFn),
    Inference(InferenceTask),
}

impl Transform {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pixel(_) => "pixel",
            Self::Inference(_) => "inference",
        }
    }
}

/// Error for a transform handed parameters of another operation.
pub(crate) fn wrong_params(
    operation: &str,
    params: &OperationParams,
) -> crate::error::PipelineError {
    crate::error::PipelineError::operation(operation, format!("unexpected parameters {params:?}"))
}
