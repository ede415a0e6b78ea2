//! End-to-end runs of the batch pipeline over generated images.

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use lustre_core::config::WatermarkPosition;
use lustre_core::ops::watermark::text_bounds;
use lustre_core::{
    Config, Lustre, OutputFormat, PipelineError, ProcessedImage, ProcessingResult, StopSignal,
};
use std::path::Path;

fn config_for(input: &Path, output: &Path) -> Config {
    Config {
        input_directory: input.to_path_buf(),
        output_directory: output.to_path_buf(),
        upscale_factor: 1.0,
        ..Default::default()
    }
}

fn noisy(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729) ^ (x * y)) % 256;
        Rgb([v as u8, (v * 3 % 256) as u8, (255 - v) as u8])
    })
}

fn successes(results: &[ProcessingResult]) -> Vec<&ProcessedImage> {
    results
        .iter()
        .filter_map(|r| match r {
            ProcessingResult::Success(image) => Some(image.as_ref()),
            ProcessingResult::Failure(_) => None,
        })
        .collect()
}

async fn run(config: Config) -> lustre_core::BatchSummary {
    Lustre::new(config)
        .process_directory(&StopSignal::new(), |_| {})
        .await
        .unwrap()
}

#[tokio::test]
async fn upscale_doubles_dimensions() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    DynamicImage::new_rgb8(100, 100)
        .save(input.path().join("square.png"))
        .unwrap();

    let summary = run(Config {
        upscale_factor: 2.0,
        ..config_for(input.path(), output.path())
    })
    .await;

    let images = successes(&summary.results);
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].applied_operations, ["upscale"]);
    let written = image::open(&images[0].output_path).unwrap();
    assert_eq!(written.dimensions(), (200, 200));
}

#[tokio::test]
async fn corrupt_file_fails_alone() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    for name in ["a.png", "b.png", "c.png"] {
        DynamicImage::new_rgb8(16, 16).save(input.path().join(name)).unwrap();
    }
    std::fs::write(input.path().join("broken.png"), b"\x89PNG\r\n\x1a\ntruncated").unwrap();

    let summary = run(config_for(input.path(), output.path())).await;

    assert_eq!(summary.stats.submitted, 4);
    assert_eq!(summary.stats.succeeded, 3);
    assert_eq!(summary.stats.failed, 1);
    let failed: Vec<_> = summary.failures().collect();
    assert!(failed[0].source_path().ends_with("broken.png"));
}

#[tokio::test]
async fn centered_watermark_stays_inside_text_box() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let source = RgbImage::from_pixel(200, 100, Rgb([40, 40, 40]));
    DynamicImage::ImageRgb8(source.clone())
        .save(input.path().join("plain.png"))
        .unwrap();

    let config = Config {
        watermark_text: "Sample".into(),
        watermark_position: WatermarkPosition::Center,
        preserve_metadata: false,
        ..config_for(input.path(), output.path())
    };
    let font_size = config.watermark_font_size;
    let bounds = text_bounds(200, 100, "Sample", WatermarkPosition::Center, font_size).unwrap();
    let summary = run(config).await;

    let images = successes(&summary.results);
    let written = image::open(&images[0].output_path).unwrap().to_rgb8();
    let mut changed = 0;
    for (x, y, pixel) in written.enumerate_pixels() {
        if pixel != source.get_pixel(x, y) {
            changed += 1;
            assert!(bounds.contains(x, y), "pixel ({x}, {y}) changed outside {bounds:?}");
        }
    }
    assert!(changed > 0);
}

#[tokio::test]
async fn lower_quality_gives_smaller_file() {
    let mut sizes = Vec::new();
    for quality in [10, 85] {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        DynamicImage::ImageRgb8(noisy(128, 128))
            .save(input.path().join("noise.png"))
            .unwrap();

        let summary = run(Config {
            format_conversion: Some(OutputFormat::Jpeg),
            compression_quality: quality,
            ..config_for(input.path(), output.path())
        })
        .await;
        let images = successes(&summary.results);
        assert_eq!(images[0].format, "jpeg");
        sizes.push(std::fs::metadata(&images[0].output_path).unwrap().len());
    }
    assert!(sizes[0] < sizes[1], "quality 10 = {} bytes, 85 = {} bytes", sizes[0], sizes[1]);
}

#[tokio::test]
async fn lower_quality_shrinks_source_format_output() {
    let mut sizes = Vec::new();
    for quality in [10, 85] {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        DynamicImage::ImageRgb8(noisy(128, 128))
            .save(input.path().join("noise.png"))
            .unwrap();

        let summary = run(Config {
            compression_quality: quality,
            ..config_for(input.path(), output.path())
        })
        .await;
        let images = successes(&summary.results);
        assert_eq!(images[0].format, "png");
        sizes.push(std::fs::metadata(&images[0].output_path).unwrap().len());
    }
    assert!(sizes[0] < sizes[1], "quality 10 = {} bytes, 85 = {} bytes", sizes[0], sizes[1]);
}

#[tokio::test]
async fn identity_settings_keep_pixels() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let source = noisy(40, 30);
    DynamicImage::ImageRgb8(source.clone())
        .save(input.path().join("noise.png"))
        .unwrap();

    let summary = run(config_for(input.path(), output.path())).await;

    let images = successes(&summary.results);
    assert!(images[0].applied_operations.is_empty());
    let written = image::open(&images[0].output_path).unwrap().to_rgb8();
    assert_eq!(written, source);
}

#[tokio::test]
async fn empty_directory_processes_nothing() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    let summary = run(config_for(input.path(), output.path())).await;
    assert!(summary.results.is_empty());
    assert_eq!(summary.stats.submitted, 0);
}

#[tokio::test]
async fn missing_directory_aborts_run() {
    let output = tempfile::tempdir().unwrap();
    let lustre = Lustre::new(config_for(Path::new("/nonexistent/lustre/input"), output.path()));

    let err = lustre
        .process_directory(&StopSignal::new(), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::DirectoryNotFound(_)));
}

#[test]
fn plan_order_ignores_config_key_order() {
    let a: serde_json::Value = serde_json::from_str(
        r#"{"sepia_filter": true, "sharpen": true, "rotation_angle": 90, "contrast_factor": 1.5}"#,
    )
    .unwrap();
    let b: serde_json::Value = serde_json::from_str(
        r#"{"contrast_factor": 1.5, "rotation_angle": 90, "sharpen": true, "sepia_filter": true}"#,
    )
    .unwrap();

    let plan = |overrides: &serde_json::Value| -> Vec<&'static str> {
        let config = Config::merge(&Config::default(), overrides).unwrap();
        Lustre::new(config).plan().iter().map(|op| op.name).collect()
    };

    assert_eq!(plan(&a), ["upscale", "contrast", "sharpen", "rotate", "sepia"]);
    assert_eq!(plan(&a), plan(&b));
}

#[test]
fn merge_with_empty_object_is_identity() {
    let base = Config::default();
    assert_eq!(Config::merge(&base, &serde_json::json!({})).unwrap(), base);
}
