//! Tone and color adjustments.
//!
//! All of these work on 8-bit RGB(A). Alpha is carried through untouched and
//! the result has an alpha channel only if the input did.

use image::{DynamicImage, GrayImage, Luma, RgbaImage};

use crate::error::{PipelineError, PipelineResult};
use crate::handle::ImageHandle;

use super::{wrong_params, OperationParams};

/// ITU-R 601 luma.
pub(crate) fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Apply `f` to every RGB triple, keeping alpha and the input's channel layout.
fn map_rgb(handle: &ImageHandle, f: impl Fn([u8; 3]) -> [u8; 3]) -> ImageHandle {
    let has_alpha = handle.has_alpha();
    let mut buf: RgbaImage = handle.image().to_rgba8();
    for px in buf.pixels_mut() {
        let [r, g, b] = f([px[0], px[1], px[2]]);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    }
    let image = DynamicImage::ImageRgba8(buf);
    if has_alpha {
        handle.with_image(image)
    } else {
        handle.with_image(DynamicImage::ImageRgb8(image.to_rgb8()))
    }
}

fn check_factor(operation: &str, factor: f32) -> PipelineResult<()> {
    if factor.is_finite() && factor >= 0.0 {
        Ok(())
    } else {
        Err(PipelineError::operation(operation, format!("invalid factor {factor}")))
    }
}

/// Interpolate between the mean-luminance gray and the image: `mean + f * (v - mean)`.
pub fn contrast(handle: &ImageHandle, params: &OperationParams) -> PipelineResult<ImageHandle> {
    let OperationParams::Contrast { factor } = *params else {
        return Err(wrong_params("contrast", params));
    };
    check_factor("contrast", factor)?;

    let rgb = handle.image().to_rgb8();
    let count = (rgb.width() as f64 * rgb.height() as f64).max(1.0);
    let total: f64 = rgb.pixels().map(|p| luma(p[0], p[1], p[2]) as f64).sum();
    let mean = (total / count).round() as f32;

    Ok(map_rgb(handle, |px| {
        px.map(|v| clamp_u8(mean + factor * (v as f32 - mean)))
    }))
}

/// Interpolate each pixel between its own gray value and itself.
pub fn saturation(handle: &ImageHandle, params: &OperationParams) -> PipelineResult<ImageHandle> {
    let OperationParams::Color { factor } = *params else {
        return Err(wrong_params("color", params));
    };
    check_factor("color", factor)?;

    Ok(map_rgb(handle, |[r, g, b]| {
        let gray = luma(r, g, b).round();
        [r, g, b].map(|v| clamp_u8(gray + factor * (v as f32 - gray)))
    }))
}

pub fn sepia(handle: &ImageHandle, params: &OperationParams) -> PipelineResult<ImageHandle> {
    if !matches!(params, OperationParams::Sepia) {
        return Err(wrong_params("sepia", params));
    }

    Ok(map_rgb(handle, |[r, g, b]| {
        let (r, g, b) = (r as f32, g as f32, b as f32);
        [
            clamp_u8(0.393 * r + 0.769 * g + 0.189 * b),
            clamp_u8(0.349 * r + 0.686 * g + 0.168 * b),
            clamp_u8(0.272 * r + 0.534 * g + 0.131 * b),
        ]
    }))
}

/// Equalize the luma histogram and shift each channel by the luma change,
/// which leaves chroma in place.
pub fn equalize_histogram(
    handle: &ImageHandle,
    params: &OperationParams,
) -> PipelineResult<ImageHandle> {
    if !matches!(params, OperationParams::HistogramEqualization) {
        return Err(wrong_params("histogram_equalization", params));
    }

    let rgb = handle.image().to_rgb8();
    let luma_plane = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        Luma([clamp_u8(luma(p[0], p[1], p[2]))])
    });
    let equalized = imageproc::contrast::equalize_histogram(&luma_plane);

    let has_alpha = handle.has_alpha();
    let mut buf = handle.image().to_rgba8();
    for (x, y, px) in buf.enumerate_pixels_mut() {
        let delta = equalized.get_pixel(x, y)[0] as f32 - luma_plane.get_pixel(x, y)[0] as f32;
        for c in 0..3 {
            px[c] = clamp_u8(px[c] as f32 + delta);
        }
    }

    let image = DynamicImage::ImageRgba8(buf);
    Ok(if has_alpha {
        handle.with_image(image)
    } else {
        handle.with_image(DynamicImage::ImageRgb8(image.to_rgb8()))
    })
}
