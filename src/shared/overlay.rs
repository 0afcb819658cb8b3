// This is free and unencumbered software released into the public domain.

use crate::shared::{
    Size,
    font::{self, ADVANCE, GLYPH_HEIGHT},
};
use image::{Rgba, RgbaImage};

/// Overlay buffers are padded to this block size (width x height).
pub const OVERLAY_BLOCK: (u32, u32) = (32, 16);

/// Size of the overlay covering a preview rectangle of `preview` pixels.
pub fn overlay_size(preview: Size) -> Size {
    preview.align_up(OVERLAY_BLOCK.0, OVERLAY_BLOCK.1)
}

/// Renders `text` centered on a black background of opacity `alpha`.
///
/// Text is scaled by the largest whole factor that keeps it within 80% of the
/// width and 60% of the height of the overlay.
pub fn build_overlay(size: Size, text: &str, alpha: u8, color: [u8; 3]) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(size.width, size.height, Rgba([0, 0, 0, alpha]));

    let text_width = font::text_width(text);
    if text_width == 0 || size.is_empty() {
        return image;
    }

    let scale = (size.width * 4 / 5 / text_width)
        .min(size.height * 3 / 5 / GLYPH_HEIGHT)
        .max(1);
    let origin_x = (size.width as i64 - (text_width * scale) as i64) / 2;
    let origin_y = (size.height as i64 - (GLYPH_HEIGHT * scale) as i64) / 2;
    let ink = Rgba([color[0], color[1], color[2], 255]);

    for (i, c) in text.chars().enumerate() {
        let glyph_x = origin_x + (i as u32 * ADVANCE * scale) as i64;
        for gy in 0..GLYPH_HEIGHT {
            for gx in 0..font::GLYPH_WIDTH {
                if !font::is_set(c, gx, gy) {
                    continue;
                }
                let x0 = glyph_x + (gx * scale) as i64;
                let y0 = origin_y + (gy * scale) as i64;
                fill_block(&mut image, x0, y0, scale, ink);
            }
        }
    }

    image
}

fn fill_block(image: &mut RgbaImage, x0: i64, y0: i64, scale: u32, ink: Rgba<u8>) {
    for y in y0..y0 + scale as i64 {
        for x in x0..x0 + scale as i64 {
            if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
                image.put_pixel(x as u32, y as u32, ink);
            }
        }
    }
}
