//! Outline detected faces.

use image::{DynamicImage, Rgb, Rgba};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::handle::ImageHandle;
use crate::types::BoundingBox;

const OUTLINE_WIDTH: u32 = 3;

fn inset(b: &BoundingBox, i: u32) -> Option<Rect> {
    let w = b.width.checked_sub(2 * i)?;
    let h = b.height.checked_sub(2 * i)?;
    (w > 0 && h > 0).then(|| Rect::at((b.x + i) as i32, (b.y + i) as i32).of_size(w, h))
}

/// Draw a red outline, three pixels wide and growing inward, around each box.
/// Boxes partly outside the image are clipped by the drawing routine.
pub fn draw_boxes(handle: &ImageHandle, boxes: &[BoundingBox]) -> ImageHandle {
    if boxes.is_empty() {
        return handle.clone();
    }

    let rects: Vec<Rect> = boxes
        .iter()
        .flat_map(|b| (0..OUTLINE_WIDTH).filter_map(move |i| inset(b, i)))
        .collect();

    let image = handle.image();
    let drawn = if image.color().has_alpha() {
        let mut buf = image.to_rgba8();
        for rect in &rects {
            draw_hollow_rect_mut(&mut buf, *rect, Rgba([255, 0, 0, 255]));
        }
        DynamicImage::ImageRgba8(buf)
    } else {
        let mut buf = image.to_rgb8();
        for rect in &rects {
            draw_hollow_rect_mut(&mut buf, *rect, Rgb([255, 0, 0]));
        }
        DynamicImage::ImageRgb8(buf)
    };
    handle.with_image(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_draw_boxes_outlines_in_red() {
        let src = ImageHandle::new(DynamicImage::ImageRgb8(RgbImage::new(50, 50)));
        let out = draw_boxes(&src, &[BoundingBox::new(10, 10, 20, 20)]);
        let rgb = out.image().to_rgb8();

        assert_eq!(*rgb.get_pixel(10, 10), Rgb([255, 0, 0]));
        assert_eq!(*rgb.get_pixel(12, 20), Rgb([255, 0, 0]));
        assert_eq!(*rgb.get_pixel(13, 20), Rgb([0, 0, 0]));
        assert_eq!(*rgb.get_pixel(20, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_degenerate_boxes_are_ignored() {
        let src = ImageHandle::new(DynamicImage::ImageRgb8(RgbImage::new(10, 10)));
        let out = draw_boxes(&src, &[BoundingBox::new(2, 2, 0, 5), BoundingBox::new(1, 1, 1, 1)]);
        assert_eq!(*out.image().to_rgb8().get_pixel(1, 1), Rgb([255, 0, 0]));
        assert_eq!(*out.image().to_rgb8().get_pixel(2, 3), Rgb([0, 0, 0]));
    }
}
