//! Catalog of named operations in a fixed total order.

use crate::config::{Config, FlipMode, LimitsConfig, OutputFormat, WatermarkPosition};
use crate::error::RegistryError;

use super::{color, filters, geometry, watermark};
use super::{InferenceTask, OperationParams, Transform};

/// Reads the config and returns the operation's parameters if it is enabled.
pub type Selector = fn(&Config) -> Option<OperationParams>;

/// A registered operation.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    /// Unique name, used in logs and reports
    pub name: &'static str,

    /// Position in the pipeline; unique across the registry
    pub order: u32,

    /// One-line description for listings
    pub description: &'static str,

    /// Parameters used when the operation runs with default settings
    pub defaults: OperationParams,

    pub select: Selector,

    pub transform: Transform,
}

/// An enabled operation with its resolved parameters.
#[derive(Debug, Clone)]
pub struct PlannedOperation {
    pub name: &'static str,
    pub params: OperationParams,
    pub transform: Transform,
}

/// Operations kept sorted by `order`.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    specs: Vec<OperationSpec>,
}

impl OperationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation, rejecting a duplicate name or order.
    pub fn register(&mut self, spec: OperationSpec) -> Result<(), RegistryError> {
        if self.specs.iter().any(|s| s.name == spec.name) {
            return Err(RegistryError::DuplicateName(spec.name.to_string()));
        }
        if let Some(existing) = self.specs.iter().find(|s| s.order == spec.order) {
            return Err(RegistryError::DuplicateOrder {
                name: spec.name.to_string(),
                order: spec.order,
                existing: existing.name.to_string(),
            });
        }

        let index = self.specs.partition_point(|s| s.order < spec.order);
        self.specs.insert(index, spec);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&OperationSpec, RegistryError> {
        self.specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Operations in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = &OperationSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Enabled operations for `config`, in registry order.
    ///
    /// Each enable/disable decision is logged once here, so per-image
    /// execution never re-reads the config.
    pub fn plan(&self, config: &Config) -> Vec<PlannedOperation> {
        let mut planned = Vec::new();
        for spec in &self.specs {
            match (spec.select)(config) {
                Some(params) => {
                    tracing::info!(operation = spec.name, ?params, "Operation enabled");
                    planned.push(PlannedOperation {
                        name: spec.name,
                        params,
                        transform: spec.transform,
                    });
                }
                None => tracing::debug!(operation = spec.name, "Operation disabled"),
            }
        }
        planned
    }

    /// The seventeen built-in operations in their canonical order.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for spec in builtin_specs() {
            // Names and orders below are distinct literals.
            if let Err(e) = registry.register(spec) {
                tracing::error!("Built-in operation rejected: {e}");
            }
        }
        registry
    }
}

fn factor_enabled(factor: f32) -> bool {
    (factor - 1.0).abs() > f32::EPSILON
}

fn builtin_specs() -> Vec<OperationSpec> {
    vec![
        OperationSpec {
            name: "upscale",
            order: 1,
            description: "Scale both dimensions by upscale_factor (Lanczos)",
            defaults: OperationParams::Upscale {
                factor: 2.0,
                max_dimension: LimitsConfig::default().max_image_dimension,
            },
            select: |c| {
                factor_enabled(c.upscale_factor).then(|| OperationParams::Upscale {
                    factor: c.upscale_factor,
                    max_dimension: c.limits.max_image_dimension,
                })
            },
            transform: Transform::Pixel(geometry::upscale),
        },
        OperationSpec {
            name: "contrast",
            order: 2,
            description: "Scale contrast around the mean luminance",
            defaults: OperationParams::Contrast { factor: 1.0 },
            select: |c| {
                factor_enabled(c.contrast_factor).then(|| OperationParams::Contrast {
                    factor: c.contrast_factor,
                })
            },
            transform: Transform::Pixel(color::contrast),
        },
        OperationSpec {
            name: "color",
            order: 3,
            description: "Scale saturation against the grayscale image",
            defaults: OperationParams::Color { factor: 1.0 },
            select: |c| {
                factor_enabled(c.color_factor).then(|| OperationParams::Color {
                    factor: c.color_factor,
                })
            },
            transform: Transform::Pixel(color::saturation),
        },
        OperationSpec {
            name: "sharpen",
            order: 4,
            description: "3x3 sharpening kernel",
            defaults: OperationParams::Sharpen,
            select: |c| c.sharpen.then_some(OperationParams::Sharpen),
            transform: Transform::Pixel(filters::sharpen),
        },
        OperationSpec {
            name: "watermark",
            order: 5,
            description: "Overlay semi-transparent text",
            defaults: OperationParams::Watermark {
                text: String::new(),
                position: WatermarkPosition::BottomRight,
                font_size: 36,
                opacity: 128,
            },
            select: |c| {
                (!c.watermark_text.is_empty()).then(|| OperationParams::Watermark {
                    text: c.watermark_text.clone(),
                    position: c.watermark_position,
                    font_size: c.watermark_font_size,
                    opacity: c.watermark_opacity,
                })
            },
            transform: Transform::Pixel(watermark::apply),
        },
        OperationSpec {
            name: "format_conversion",
            order: 6,
            description: "Re-encode in format_conversion, flattening alpha when needed",
            defaults: OperationParams::ConvertFormat {
                format: OutputFormat::Png,
            },
            select: |c| {
                c.format_conversion
                    .map(|format| OperationParams::ConvertFormat { format })
            },
            transform: Transform::Pixel(geometry::convert_format),
        },
        OperationSpec {
            name: "crop",
            order: 7,
            description: "Crop to [left, top, right, bottom]",
            defaults: OperationParams::Crop {
                left: 0,
                top: 0,
                right: 0,
                bottom: 0,
            },
            select: |c| {
                let [left, top, right, bottom] = c.crop_settings;
                c.crop_settings.iter().any(|&v| v != 0).then_some(OperationParams::Crop {
                    left,
                    top,
                    right,
                    bottom,
                })
            },
            transform: Transform::Pixel(geometry::crop),
        },
        OperationSpec {
            name: "resize",
            order: 8,
            description: "Resize to [width, height] (Lanczos)",
            defaults: OperationParams::Resize {
                width: 0,
                height: 0,
                max_dimension: LimitsConfig::default().max_image_dimension,
            },
            select: |c| {
                let [width, height] = c.resize_settings;
                (width != 0 || height != 0).then_some(OperationParams::Resize {
                    width,
                    height,
                    max_dimension: c.limits.max_image_dimension,
                })
            },
            transform: Transform::Pixel(geometry::resize),
        },
        OperationSpec {
            name: "rotate",
            order: 9,
            description: "Rotate counter-clockwise about the center, keeping size",
            defaults: OperationParams::Rotate { angle: 0.0 },
            select: |c| {
                (c.rotation_angle != 0.0).then_some(OperationParams::Rotate {
                    angle: c.rotation_angle,
                })
            },
            transform: Transform::Pixel(geometry::rotate),
        },
        OperationSpec {
            name: "flip",
            order: 10,
            description: "Mirror horizontally or vertically",
            defaults: OperationParams::Flip {
                mode: FlipMode::None,
            },
            select: |c| {
                (c.flip_mode != FlipMode::None)
                    .then_some(OperationParams::Flip { mode: c.flip_mode })
            },
            transform: Transform::Pixel(geometry::flip),
        },
        OperationSpec {
            name: "noise_reduction",
            order: 11,
            description: "Median filter denoising",
            defaults: OperationParams::NoiseReduction { radius: 1 },
            select: |c| {
                c.noise_reduction
                    .then_some(OperationParams::NoiseReduction { radius: 1 })
            },
            transform: Transform::Pixel(filters::noise_reduction),
        },
        OperationSpec {
            name: "histogram_equalization",
            order: 12,
            description: "Equalize the luma histogram",
            defaults: OperationParams::HistogramEqualization,
            select: |c| {
                c.histogram_equalization
                    .then_some(OperationParams::HistogramEqualization)
            },
            transform: Transform::Pixel(color::equalize_histogram),
        },
        OperationSpec {
            name: "sepia",
            order: 13,
            description: "Sepia tone",
            defaults: OperationParams::Sepia,
            select: |c| c.sepia_filter.then_some(OperationParams::Sepia),
            transform: Transform::Pixel(color::sepia),
        },
        OperationSpec {
            name: "vignette",
            order: 14,
            description: "Gaussian falloff toward the corners",
            defaults: OperationParams::Vignette {
                sigma: filters::VIGNETTE_SIGMA,
            },
            select: |c| {
                c.vignette_filter.then_some(OperationParams::Vignette {
                    sigma: filters::VIGNETTE_SIGMA,
                })
            },
            transform: Transform::Pixel(filters::vignette),
        },
        OperationSpec {
            name: "face_detection",
            order: 15,
            description: "Detect faces and outline them (inference)",
            defaults: OperationParams::FaceDetection,
            select: |c| c.face_detection.then_some(OperationParams::FaceDetection),
            transform: Transform::Inference(InferenceTask::DetectFaces),
        },
        OperationSpec {
            name: "background_removal",
            order: 16,
            description: "Make the background transparent (inference)",
            defaults: OperationParams::BackgroundRemoval,
            select: |c| {
                c.background_removal
                    .then_some(OperationParams::BackgroundRemoval)
            },
            transform: Transform::Inference(InferenceTask::RemoveBackground),
        },
        OperationSpec {
            name: "ai_enhance",
            order: 17,
            description: "Model-based enhancement (inference, batched per chunk)",
            defaults: OperationParams::AiEnhance,
            select: |c| c.ai_enhance.then_some(OperationParams::AiEnhance),
            transform: Transform::Inference(InferenceTask::Enhance),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineResult;
    use crate::handle::ImageHandle;

    fn identity(handle: &ImageHandle, _: &OperationParams) -> PipelineResult<ImageHandle> {
        Ok(handle.clone())
    }

    fn custom(name: &'static str, order: u32) -> OperationSpec {
        OperationSpec {
            name,
            order,
            description: "test",
            defaults: OperationParams::Sharpen,
            select: |_| Some(OperationParams::Sharpen),
            transform: Transform::Pixel(identity),
        }
    }

    fn names(plan: &[PlannedOperation]) -> Vec<&'static str> {
        plan.iter().map(|p| p.name).collect()
    }

    #[test]
    fn test_builtin_order() {
        let registry = OperationRegistry::builtin();
        let names: Vec<_> = registry.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "upscale",
                "contrast",
                "color",
                "sharpen",
                "watermark",
                "format_conversion",
                "crop",
                "resize",
                "rotate",
                "flip",
                "noise_reduction",
                "histogram_equalization",
                "sepia",
                "vignette",
                "face_detection",
                "background_removal",
                "ai_enhance",
            ]
        );
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = OperationRegistry::new();
        registry.register(custom("a", 1)).unwrap();

        assert_eq!(
            registry.register(custom("a", 2)),
            Err(RegistryError::DuplicateName("a".into()))
        );
        assert!(matches!(
            registry.register(custom("b", 1)),
            Err(RegistryError::DuplicateOrder { order: 1, .. })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_keeps_order_sorted() {
        let mut registry = OperationRegistry::new();
        registry.register(custom("late", 30)).unwrap();
        registry.register(custom("early", 10)).unwrap();
        registry.register(custom("middle", 20)).unwrap();

        let names: Vec<_> = registry.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_resolve() {
        let registry = OperationRegistry::builtin();
        assert_eq!(registry.resolve("sepia").unwrap().order, 13);
        assert_eq!(
            registry.resolve("blur").unwrap_err(),
            RegistryError::NotFound("blur".into())
        );
    }

    #[test]
    fn test_default_config_plans_only_upscale() {
        let plan = OperationRegistry::builtin().plan(&Config::default());
        assert_eq!(names(&plan), vec!["upscale"]);
    }

    #[test]
    fn test_plan_follows_registry_order() {
        let mut config = Config::default();
        config.vignette_filter = true;
        config.sharpen = true;
        config.flip_mode = FlipMode::Horizontal;
        config.contrast_factor = 1.2;
        config.ai_enhance = true;

        let plan = OperationRegistry::builtin().plan(&config);
        assert_eq!(
            names(&plan),
            vec!["upscale", "contrast", "sharpen", "flip", "vignette", "ai_enhance"]
        );
        assert!(matches!(
            plan.last().unwrap().transform,
            Transform::Inference(InferenceTask::Enhance)
        ));
    }

    #[test]
    fn test_plan_independent_of_key_order() {
        let a: Config = serde_json::from_str(
            r#"{"sepia_filter": true, "upscale_factor": 1.0, "crop_settings": [1, 1, 5, 5]}"#,
        )
        .unwrap();
        let b: Config = serde_json::from_str(
            r#"{"crop_settings": [1, 1, 5, 5], "upscale_factor": 1.0, "sepia_filter": true}"#,
        )
        .unwrap();

        let registry = OperationRegistry::builtin();
        assert_eq!(names(&registry.plan(&a)), names(&registry.plan(&b)));
        assert_eq!(names(&registry.plan(&a)), vec!["crop", "sepia"]);
    }

    #[test]
    fn test_plan_carries_params() {
        let mut config = Config::default();
        config.upscale_factor = 1.0;
        config.resize_settings = [640, 0];
        config.watermark_text = "Sample".into();

        let plan = OperationRegistry::builtin().plan(&config);
        assert_eq!(
            plan[1].params,
            OperationParams::Resize {
                width: 640,
                height: 0,
                max_dimension: 20000,
            }
        );
        assert!(matches!(
            &plan[0].params,
            OperationParams::Watermark { text, .. } if text == "Sample"
        ));
    }
}
