//! Neighborhood filters: sharpen, median denoise, vignette.

use image::{DynamicImage, GenericImage, GenericImageView};

use crate::error::{PipelineError, PipelineResult};
use crate::handle::ImageHandle;

use super::{wrong_params, OperationParams};

/// Standard deviation (in pixels) of the vignette falloff.
pub const VIGNETTE_SIGMA: f32 = 200.0;

/// Center weight 32, neighbors -2; normalized by the kernel sum (16).
const SHARPEN_KERNEL: [f32; 9] = [-2.0, -2.0, -2.0, -2.0, 32.0, -2.0, -2.0, -2.0, -2.0];

/// 3x3 sharpen. Border pixels keep their source values.
pub fn sharpen(handle: &ImageHandle, params: &OperationParams) -> PipelineResult<ImageHandle> {
    if !matches!(params, OperationParams::Sharpen) {
        return Err(wrong_params("sharpen", params));
    }

    let src = handle.image();
    let (w, h) = src.dimensions();
    if w < 3 || h < 3 {
        return Ok(handle.clone());
    }

    let mut out = src.filter3x3(&SHARPEN_KERNEL);
    for x in 0..w {
        out.put_pixel(x, 0, src.get_pixel(x, 0));
        out.put_pixel(x, h - 1, src.get_pixel(x, h - 1));
    }
    for y in 1..h - 1 {
        out.put_pixel(0, y, src.get_pixel(0, y));
        out.put_pixel(w - 1, y, src.get_pixel(w - 1, y));
    }
    Ok(handle.with_image(out))
}

/// Median filter over a `(2r+1)`-square window.
pub fn noise_reduction(
    handle: &ImageHandle,
    params: &OperationParams,
) -> PipelineResult<ImageHandle> {
    let OperationParams::NoiseReduction { radius } = *params else {
        return Err(wrong_params("noise_reduction", params));
    };

    let image = handle.image();
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::operation("noise_reduction", "image is empty"));
    }

    let filtered = if image.color().has_alpha() {
        DynamicImage::ImageRgba8(imageproc::filter::median_filter(
            &image.to_rgba8(),
            radius,
            radius,
        ))
    } else {
        DynamicImage::ImageRgb8(imageproc::filter::median_filter(
            &image.to_rgb8(),
            radius,
            radius,
        ))
    };
    Ok(handle.with_image(filtered))
}

/// Gaussian vignette: each pixel is scaled by
/// `exp(-dx²/2σ²) * exp(-dy²/2σ²)`, which is 1 at the center.
pub fn vignette(handle: &ImageHandle, params: &OperationParams) -> PipelineResult<ImageHandle> {
    let OperationParams::Vignette { sigma } = *params else {
        return Err(wrong_params("vignette", params));
    };
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(PipelineError::operation(
            "vignette",
            format!("invalid sigma {sigma}"),
        ));
    }

    let has_alpha = handle.has_alpha();
    let mut buf = handle.image().to_rgba8();
    let (w, h) = buf.dimensions();
    let (cx, cy) = ((w as f32 - 1.0) / 2.0, (h as f32 - 1.0) / 2.0);
    let denom = 2.0 * sigma * sigma;

    let col_weights: Vec<f32> = (0..w)
        .map(|x| (-(x as f32 - cx).powi(2) / denom).exp())
        .collect();
    let row_weights: Vec<f32> = (0..h)
        .map(|y| (-(y as f32 - cy).powi(2) / denom).exp())
        .collect();

    for (x, y, px) in buf.enumerate_pixels_mut() {
        let weight = col_weights[x as usize] * row_weights[y as usize];
        for c in 0..3 {
            px[c] = (px[c] as f32 * weight).round().clamp(0.0, 255.0) as u8;
        }
    }

    let image = DynamicImage::ImageRgba8(buf);
    Ok(if has_alpha {
        handle.with_image(image)
    } else {
        handle.with_image(DynamicImage::ImageRgb8(image.to_rgb8()))
    })
}
