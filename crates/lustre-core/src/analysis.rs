//! Single-image analysis report for `lustre analyze`.
//!
//! Covers basic statistics, color (saturation and brightness in the HSV
//! sense), edges (Canny edge density) and a blur metric (variance of the
//! Laplacian; lower means blurrier).

use image::{GrayImage, RgbaImage};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::PipelineResult;
use crate::handle::Metadata;
use crate::pipeline::{Hasher, ImageSource, SourceImage};

/// Canny hysteresis thresholds.
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 100.0;

/// Mean and standard deviation of one quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
}

/// Statistics for one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStats {
    pub channel: &'static str,
    pub mean: f64,
    pub std: f64,
    pub min: u8,
    pub max: u8,
}

/// The full report, serialized as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct ImageAnalysis {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub bits_per_channel: u8,
    pub format: String,
    pub file_size: u64,
    pub content_hash: String,
    pub perceptual_hash: String,
    pub channel_stats: Vec<ChannelStats>,
    /// 256 bins of luminance
    pub luminance_histogram: Vec<u64>,
    pub saturation: Summary,
    pub brightness: Summary,
    /// Fraction of pixels on a Canny edge
    pub edge_density: f64,
    /// Variance of the 4-neighbour Laplacian
    pub laplacian_variance: f64,
    pub metadata: Metadata,
}

/// Running sum / sum of squares.
#[derive(Default)]
struct Accumulator {
    n: u64,
    sum: f64,
    sum_sq: f64,
    min: u8,
    max: u8,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            min: u8::MAX,
            ..Default::default()
        }
    }

    fn push(&mut self, v: u8) {
        let f = f64::from(v);
        self.n += 1;
        self.sum += f;
        self.sum_sq += f * f;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    fn summary(&self) -> Summary {
        if self.n == 0 {
            return Summary::default();
        }
        let n = self.n as f64;
        let mean = self.sum / n;
        let var = (self.sum_sq / n - mean * mean).max(0.0);
        Summary {
            mean,
            std: var.sqrt(),
        }
    }

    fn channel(&self, channel: &'static str) -> ChannelStats {
        let Summary { mean, std } = self.summary();
        ChannelStats {
            channel,
            mean,
            std,
            min: if self.n == 0 { 0 } else { self.min },
            max: self.max,
        }
    }
}

/// Load `path` and analyze it.
pub async fn analyze_file(source: &ImageSource, path: &Path) -> PipelineResult<ImageAnalysis> {
    let image = source.load(path).await?;
    tokio::task::spawn_blocking(move || analyze(&image, &Hasher::new()))
        .await
        .map_err(|e| crate::error::PipelineError::operation("analyze", e.to_string()))
}

/// Analyze an already loaded image.
pub fn analyze(source: &SourceImage, hasher: &Hasher) -> ImageAnalysis {
    let image = source.handle.image();
    let rgba = image.to_rgba8();
    let gray = image.to_luma8();
    let pixel_format = source.handle.pixel_format();

    let (channel_stats, saturation, brightness) = color_stats(&rgba, source.handle.has_alpha());

    let mut luminance_histogram = vec![0u64; 256];
    for p in gray.pixels() {
        luminance_histogram[p.0[0] as usize] += 1;
    }

    ImageAnalysis {
        path: source.path.clone(),
        width: image.width(),
        height: image.height(),
        channels: pixel_format.channels,
        bits_per_channel: pixel_format.bits_per_channel,
        format: format!("{:?}", source.format).to_lowercase(),
        file_size: source.file_size,
        content_hash: source.content_hash.clone(),
        perceptual_hash: hasher.perceptual_hash(image),
        channel_stats,
        luminance_histogram,
        saturation,
        brightness,
        edge_density: edge_density(&gray),
        laplacian_variance: laplacian_variance(&gray),
        metadata: source.handle.metadata().clone(),
    }
}

fn color_stats(rgba: &RgbaImage, has_alpha: bool) -> (Vec<ChannelStats>, Summary, Summary) {
    let mut channels: [Accumulator; 4] = std::array::from_fn(|_| Accumulator::new());
    let mut saturation = Accumulator::new();
    let mut brightness = Accumulator::new();

    for p in rgba.pixels() {
        let [r, g, b, a] = p.0;
        for (acc, v) in channels.iter_mut().zip([r, g, b, a]) {
            acc.push(v);
        }
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let s = if max == 0 {
            0
        } else {
            ((u32::from(max - min) * 255) / u32::from(max)) as u8
        };
        saturation.push(s);
        brightness.push(max);
    }

    let names = ["red", "green", "blue", "alpha"];
    let count = if has_alpha { 4 } else { 3 };
    let stats = channels
        .iter()
        .zip(names)
        .take(count)
        .map(|(acc, name)| acc.channel(name))
        .collect();
    (stats, saturation.summary(), brightness.summary())
}

fn edge_density(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }
    let edges = imageproc::edges::canny(gray, CANNY_LOW, CANNY_HIGH);
    let on = edges.pixels().filter(|p| p.0[0] > 0).count();
    on as f64 / (u64::from(w) * u64::from(h)) as f64
}

fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }
    let at = |x: u32, y: u32| f64::from(gray.get_pixel(x, y).0[0]);

    let mut n = 0.0;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let v = at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
            n += 1.0;
            sum += v;
            sum_sq += v * v;
        }
    }
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ImageHandle;
    use image::{DynamicImage, ImageFormat, Luma, Rgb, RgbImage};

    fn source(image: DynamicImage) -> SourceImage {
        SourceImage {
            path: PathBuf::from("a.png"),
            handle: ImageHandle::new(image),
            format: ImageFormat::Png,
            content_hash: "h".into(),
            file_size: 1,
        }
    }

    #[test]
    fn test_flat_image_stats() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([200, 100, 0])));
        let report = analyze(&source(image), &Hasher::new());

        assert_eq!(report.channel_stats.len(), 3);
        assert_eq!(report.channel_stats[0].channel, "red");
        assert!((report.channel_stats[0].mean - 200.0).abs() < 1e-9);
        assert_eq!(report.channel_stats[0].std, 0.0);
        assert_eq!(report.channel_stats[2].max, 0);
        assert_eq!(report.luminance_histogram.iter().sum::<u64>(), 100);
        assert!((report.saturation.mean - 255.0).abs() < 1e-9);
        assert!((report.brightness.mean - 200.0).abs() < 1e-9);
        assert_eq!(report.edge_density, 0.0);
        assert_eq!(report.laplacian_variance, 0.0);
        assert_eq!(report.format, "png");
    }

    #[test]
    fn test_sharp_image_scores_higher_than_flat() {
        let checker = GrayImage::from_fn(32, 32, |x, y| {
            Luma([if (x / 4 + y / 4) % 2 == 0 { 0 } else { 255 }])
        });
        let flat = GrayImage::from_pixel(32, 32, Luma([128]));

        assert!(laplacian_variance(&checker) > laplacian_variance(&flat));
        assert!(edge_density(&checker) > 0.0);
        assert_eq!(edge_density(&flat), 0.0);
    }

    #[test]
    fn test_report_serializes() {
        let report = analyze(&source(DynamicImage::new_rgba8(4, 4)), &Hasher::new());
        assert_eq!(report.channel_stats.len(), 4);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["luminance_histogram"].as_array().unwrap().len(), 256);
        assert!(json["saturation"]["mean"].is_number());
    }
}
