//! Geometric transforms: scale, crop, resize, rotate, flip, format conversion.

use image::imageops::FilterType;
use image::{DynamicImage, Rgb, Rgba};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use crate::error::{PipelineError, PipelineResult};
use crate::handle::ImageHandle;

use super::{wrong_params, OperationParams};
use crate::config::{FlipMode, OutputFormat};

/// Scale both dimensions by `factor` with a Lanczos filter.
pub fn upscale(handle: &ImageHandle, params: &OperationParams) -> PipelineResult<ImageHandle> {
    let OperationParams::Upscale {
        factor,
        max_dimension,
    } = *params
    else {
        return Err(wrong_params("upscale", params));
    };
    if !factor.is_finite() || factor <= 0.0 {
        return Err(PipelineError::operation(
            "upscale",
            format!("invalid factor {factor}"),
        ));
    }

    let width = (handle.width() as f64 * factor as f64).floor();
    let height = (handle.height() as f64 * factor as f64).floor();
    if width < 1.0 || height < 1.0 {
        return Err(PipelineError::operation(
            "upscale",
            format!(
                "factor {factor} collapses {}x{} to nothing",
                handle.width(),
                handle.height()
            ),
        ));
    }
    let (width, height) = check_target("upscale", width, height, max_dimension)?;

    let scaled = handle
        .image()
        .resize_exact(width, height, FilterType::Lanczos3);
    Ok(handle.with_image(scaled))
}

/// Reject a target size whose edges exceed `max_dimension` before any buffer
/// is allocated for it.
fn check_target(
    operation: &'static str,
    width: f64,
    height: f64,
    max_dimension: u32,
) -> PipelineResult<(u32, u32)> {
    let limit = max_dimension as f64;
    if width > limit || height > limit {
        return Err(PipelineError::operation(
            operation,
            format!("target {width}x{height} exceeds the {max_dimension}px dimension limit"),
        ));
    }
    Ok((width as u32, height as u32))
}

/// Crop to `[left, top, right, bottom)`; a zero `right`/`bottom` is the image
/// edge and coordinates past the edge are clamped.
pub fn crop(handle: &ImageHandle, params: &OperationParams) -> PipelineResult<ImageHandle> {
    let OperationParams::Crop {
        left,
        top,
        right,
        bottom,
    } = *params
    else {
        return Err(wrong_params("crop", params));
    };

    let (w, h) = (handle.width(), handle.height());
    let right = if right == 0 { w } else { right.min(w) };
    let bottom = if bottom == 0 { h } else { bottom.min(h) };
    if left >= right || top >= bottom {
        return Err(PipelineError::operation(
            "crop",
            format!("empty crop box ({left}, {top}, {right}, {bottom}) for {w}x{h} image"),
        ));
    }

    let cropped = handle
        .image()
        .crop_imm(left, top, right - left, bottom - top);
    Ok(handle.with_image(cropped))
}

/// Resize to `width` x `height`; a zero dimension keeps the aspect ratio.
pub fn resize(handle: &ImageHandle, params: &OperationParams) -> PipelineResult<ImageHandle> {
    let OperationParams::Resize {
        width,
        height,
        max_dimension,
    } = *params
    else {
        return Err(wrong_params("resize", params));
    };

    let (w, h) = (handle.width() as f64, handle.height() as f64);
    let (width, height) = match (width, height) {
        (0, 0) => return Err(PipelineError::operation("resize", "no target size")),
        (0, height) => ((w * height as f64 / h).round().max(1.0), height as f64),
        (width, 0) => (width as f64, (h * width as f64 / w).round().max(1.0)),
        (width, height) => (width as f64, height as f64),
    };
    let (width, height) = check_target("resize", width, height, max_dimension)?;

    let resized = handle
        .image()
        .resize_exact(width, height, FilterType::Lanczos3);
    Ok(handle.with_image(resized))
}

/// Rotate counter-clockwise about the center. The canvas keeps its size;
/// uncovered corners are black (transparent when the image has alpha).
pub fn rotate(handle: &ImageHandle, params: &OperationParams) -> PipelineResult<ImageHandle> {
    let OperationParams::Rotate { angle } = *params else {
        return Err(wrong_params("rotate", params));
    };
    if !angle.is_finite() {
        return Err(PipelineError::operation("rotate", "angle is not a number"));
    }

    let normalized = angle.rem_euclid(360.0);
    let image = handle.image();
    let rotated = if normalized == 0.0 {
        image.clone()
    } else if normalized == 180.0 {
        image.rotate180()
    } else {
        // imageproc rotates clockwise for a positive angle.
        let theta = -normalized.to_radians();
        if image.color().has_alpha() {
            DynamicImage::ImageRgba8(rotate_about_center(
                &image.to_rgba8(),
                theta,
                Interpolation::Bilinear,
                Rgba([0, 0, 0, 0]),
            ))
        } else {
            DynamicImage::ImageRgb8(rotate_about_center(
                &image.to_rgb8(),
                theta,
                Interpolation::Bilinear,
                Rgb([0, 0, 0]),
            ))
        }
    };
    Ok(handle.with_image(rotated))
}

pub fn flip(handle: &ImageHandle, params: &OperationParams) -> PipelineResult<ImageHandle> {
    let OperationParams::Flip { mode } = *params else {
        return Err(wrong_params("flip", params));
    };
    let flipped = match mode {
        FlipMode::Horizontal => handle.image().fliph(),
        FlipMode::Vertical => handle.image().flipv(),
        FlipMode::None => return Ok(handle.clone()),
    };
    Ok(handle.with_image(flipped))
}

/// Commit the image to `format`: drops alpha for formats that cannot store it
/// and narrows 16-bit rasters to 8 bits for formats that only encode 8 bits.
/// The encoding itself happens in the sink.
pub fn convert_format(
    handle: &ImageHandle,
    params: &OperationParams,
) -> PipelineResult<ImageHandle> {
    let OperationParams::ConvertFormat { format } = *params else {
        return Err(wrong_params("format_conversion", params));
    };

    let image = handle.image();
    let wide = handle.pixel_format().bits_per_channel > 8;
    let converted = if !format.supports_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else if wide && !matches!(format, OutputFormat::Png | OutputFormat::Tiff) {
        if image.color().has_alpha() {
            DynamicImage::ImageRgba8(image.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(image.to_rgb8())
        }
    } else {
        return Ok(handle.clone());
    };
    Ok(handle.with_image(converted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage, RgbaImage};

    const LIMIT: u32 = 20000;

    fn gradient(w: u32, h: u32) -> ImageHandle {
        let img = RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 255 / w.max(1)) as u8, (y * 255 / h.max(1)) as u8, 128])
        });
        ImageHandle::new(DynamicImage::ImageRgb8(img))
    }

    fn scale(factor: f32) -> OperationParams {
        OperationParams::Upscale {
            factor,
            max_dimension: LIMIT,
        }
    }

    fn size(width: u32, height: u32) -> OperationParams {
        OperationParams::Resize {
            width,
            height,
            max_dimension: LIMIT,
        }
    }

    #[test]
    fn test_upscale_doubles_dimensions() {
        let out = upscale(&gradient(100, 100), &scale(2.0)).unwrap();
        assert_eq!((out.width(), out.height()), (200, 200));

        let out = upscale(&gradient(100, 50), &scale(0.5)).unwrap();
        assert_eq!((out.width(), out.height()), (50, 25));
    }

    #[test]
    fn test_upscale_rejects_collapse() {
        let err = upscale(&gradient(10, 10), &scale(0.01)).unwrap_err();
        assert!(err.to_string().contains("upscale"));
    }

    #[test]
    fn test_upscale_past_dimension_limit_fails() {
        let params = OperationParams::Upscale {
            factor: 16.0,
            max_dimension: 100,
        };
        let err = upscale(&gradient(10, 10), &params).unwrap_err();
        assert!(err.to_string().contains("dimension limit"));

        let params = OperationParams::Upscale {
            factor: 10.0,
            max_dimension: 100,
        };
        let out = upscale(&gradient(10, 5), &params).unwrap();
        assert_eq!((out.width(), out.height()), (100, 50));
    }

    #[test]
    fn test_resize_past_dimension_limit_fails() {
        let err = resize(&gradient(20, 20), &size(100_000, 100_000)).unwrap_err();
        assert!(err.to_string().contains("dimension limit"));

        // A derived edge counts too.
        let params = OperationParams::Resize {
            width: 0,
            height: 50,
            max_dimension: 60,
        };
        assert!(resize(&gradient(200, 10), &params).is_err());
    }

    #[test]
    fn test_crop_box_and_edges() {
        let src = gradient(100, 80);
        let out = crop(
            &src,
            &OperationParams::Crop {
                left: 10,
                top: 20,
                right: 60,
                bottom: 50,
            },
        )
        .unwrap();
        assert_eq!((out.width(), out.height()), (50, 30));
        assert_eq!(out.image().get_pixel(0, 0), src.image().get_pixel(10, 20));

        let out = crop(
            &src,
            &OperationParams::Crop {
                left: 90,
                top: 0,
                right: 0,
                bottom: 500,
            },
        )
        .unwrap();
        assert_eq!((out.width(), out.height()), (10, 80));
    }

    #[test]
    fn test_crop_empty_box_fails() {
        let result = crop(
            &gradient(20, 20),
            &OperationParams::Crop {
                left: 15,
                top: 0,
                right: 10,
                bottom: 20,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_resize_keeps_aspect_with_zero() {
        let src = gradient(200, 100);
        let out = resize(&src, &size(100, 0)).unwrap();
        assert_eq!((out.width(), out.height()), (100, 50));

        let out = resize(&src, &size(0, 25)).unwrap();
        assert_eq!((out.width(), out.height()), (50, 25));

        let out = resize(&src, &size(30, 40)).unwrap();
        assert_eq!((out.width(), out.height()), (30, 40));
    }

    #[test]
    fn test_rotate_keeps_size_and_fills_corners() {
        let white = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
        let src = ImageHandle::new(DynamicImage::ImageRgb8(white));
        let out = rotate(&src, &OperationParams::Rotate { angle: 45.0 }).unwrap();
        assert_eq!((out.width(), out.height()), (40, 40));
        assert_eq!(out.image().get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(out.image().get_pixel(20, 20), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_rotate_is_counter_clockwise() {
        // A bright block right of center ends up above center after +90.
        let mut img = RgbImage::new(41, 41);
        for y in 18..23 {
            for x in 32..37 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let src = ImageHandle::new(DynamicImage::ImageRgb8(img));

        let out = rotate(&src, &OperationParams::Rotate { angle: 90.0 }).unwrap();
        let rgb = out.image().to_rgb8();
        let (bx, by, _) = rgb
            .enumerate_pixels()
            .max_by_key(|(_, _, p)| p[0])
            .unwrap();
        assert!(by < 12, "bright block at y={by}");
        assert!((17..24).contains(&bx), "bright block at x={bx}");
        assert_eq!(rgb.get_pixel(34, 20)[0], 0);
    }

    #[test]
    fn test_flip() {
        let src = gradient(10, 10);
        let horizontal = OperationParams::Flip {
            mode: FlipMode::Horizontal,
        };
        let out = flip(&src, &horizontal).unwrap();
        assert_eq!(out.image().get_pixel(0, 3), src.image().get_pixel(9, 3));

        let vertical = OperationParams::Flip {
            mode: FlipMode::Vertical,
        };
        let out = flip(&src, &vertical).unwrap();
        assert_eq!(out.image().get_pixel(3, 0), src.image().get_pixel(3, 9));
    }

    #[test]
    fn test_convert_format_drops_alpha_for_jpeg() {
        let src = ImageHandle::new(DynamicImage::ImageRgba8(RgbaImage::new(8, 8)));
        let to = |format| OperationParams::ConvertFormat { format };
        let out = convert_format(&src, &to(OutputFormat::Jpeg)).unwrap();
        assert!(!out.has_alpha());

        let out = convert_format(&src, &to(OutputFormat::Png)).unwrap();
        assert!(out.has_alpha());
    }

    #[test]
    fn test_wrong_params_rejected() {
        assert!(flip(&gradient(4, 4), &OperationParams::Sepia).is_err());
    }
}
