//! Text watermark drawn with an embedded 8x8 bitmap font.
//!
//! Glyphs are scaled by an integer factor derived from the font size and
//! shrunk until the text fits inside the image margins. Only glyph pixels are
//! touched: each is blended toward white at the configured opacity.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::DynamicImage;

use crate::config::WatermarkPosition;
use crate::error::{PipelineError, PipelineResult};
use crate::handle::ImageHandle;
use crate::types::BoundingBox;

use super::{wrong_params, OperationParams};

const GLYPH_SIZE: u32 = 8;
const MARGIN: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    x: i64,
    y: i64,
    scale: u32,
    width: u32,
    height: u32,
}

fn layout(
    img_width: u32,
    img_height: u32,
    chars: usize,
    position: WatermarkPosition,
    font_size: u32,
) -> Option<Layout> {
    if chars == 0 {
        return None;
    }

    let fits = |scale: u32| {
        let w = chars as i64 * (GLYPH_SIZE * scale) as i64;
        let h = (GLYPH_SIZE * scale) as i64;
        w + 2 * MARGIN <= img_width as i64 && h + 2 * MARGIN <= img_height as i64
    };
    let mut scale = (font_size / GLYPH_SIZE).max(1);
    while scale > 1 && !fits(scale) {
        scale -= 1;
    }

    let width = chars as u32 * GLYPH_SIZE * scale;
    let height = GLYPH_SIZE * scale;
    let (x, y) = match position {
        WatermarkPosition::Center => (
            (img_width as i64 - width as i64) / 2,
            (img_height as i64 - height as i64) / 2,
        ),
        WatermarkPosition::BottomRight => (
            img_width as i64 - width as i64 - MARGIN,
            img_height as i64 - height as i64 - MARGIN,
        ),
        WatermarkPosition::TopLeft => (MARGIN, MARGIN),
    };

    Some(Layout {
        x,
        y,
        scale,
        width,
        height,
    })
}

/// The box the watermark text occupies in an image of the given size,
/// clipped to the image. `None` for empty text or a box entirely outside.
pub fn text_bounds(
    img_width: u32,
    img_height: u32,
    text: &str,
    position: WatermarkPosition,
    font_size: u32,
) -> Option<BoundingBox> {
    let l = layout(img_width, img_height, text.chars().count(), position, font_size)?;
    let x0 = l.x.max(0);
    let y0 = l.y.max(0);
    let x1 = (l.x + l.width as i64).min(img_width as i64);
    let y1 = (l.y + l.height as i64).min(img_height as i64);
    (x1 > x0 && y1 > y0).then(|| {
        BoundingBox::new(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32)
    })
}

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

pub fn apply(handle: &ImageHandle, params: &OperationParams) -> PipelineResult<ImageHandle> {
    let OperationParams::Watermark {
        text,
        position,
        font_size,
        opacity,
    } = params
    else {
        return Err(wrong_params("watermark", params));
    };

    let (w, h) = (handle.width(), handle.height());
    let Some(l) = layout(w, h, text.chars().count(), *position, *font_size) else {
        return Err(PipelineError::operation("watermark", "empty watermark text"));
    };

    let alpha = *opacity as f32 / 255.0;
    let has_alpha = handle.has_alpha();
    let mut buf = handle.image().to_rgba8();

    for (i, ch) in text.chars().enumerate() {
        let rows = glyph(ch);
        let gx = l.x + (i as u32 * GLYPH_SIZE * l.scale) as i64;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) == 0 {
                    continue;
                }
                for dy in 0..l.scale {
                    for dx in 0..l.scale {
                        let px = gx + (col * l.scale + dx) as i64;
                        let py = l.y + (row as u32 * l.scale + dy) as i64;
                        if px < 0 || py < 0 || px >= w as i64 || py >= h as i64 {
                            continue;
                        }
                        let p = buf.get_pixel_mut(px as u32, py as u32);
                        for c in 0..3 {
                            p[c] = (p[c] as f32 * (1.0 - alpha) + 255.0 * alpha).round() as u8;
                        }
                        p[3] = (p[3] as f32 * (1.0 - alpha) + 255.0 * alpha).round() as u8;
                    }
                }
            }
        }
    }

    let image = DynamicImage::ImageRgba8(buf);
    Ok(if has_alpha {
        handle.with_image(image)
    } else {
        handle.with_image(DynamicImage::ImageRgb8(image.to_rgb8()))
    })
}
