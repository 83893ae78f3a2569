use std::io::Cursor;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use storyframe_contracts::payload::{ImageBytes, MediaType};

/// Antique-white card background.
const BACKGROUND: Rgb<u8> = Rgb([0xFA, 0xEB, 0xD7]);
const MARKER: Rgb<u8> = Rgb([0x00, 0x00, 0x00]);

/// Purely local placeholder generator: flat background plus a simple
/// centered diamond marker, PNG-encoded in memory. No I/O, no network,
/// deterministic for given dimensions.
pub fn generate(width: u32, height: u32) -> Result<ImageBytes> {
    let width = if width == 0 { 768 } else { width };
    let height = if height == 0 { 1024 } else { height };

    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
    draw_diamond(&mut canvas);

    let mut buffer = Cursor::new(Vec::new());
    canvas
        .write_to(&mut buffer, ImageFormat::Png)
        .context("failed to encode placeholder image")?;

    Ok(ImageBytes {
        bytes: buffer.into_inner(),
        media_type: MediaType::Png,
        source_url: None,
    })
}

fn draw_diamond(canvas: &mut RgbImage) {
    let width = canvas.width();
    let height = canvas.height();
    let cx = width as i64 / 2;
    let cy = height as i64 / 2;
    let radius = (width.min(height) as i64 / 6).max(1);

    for y in 0..height {
        for x in 0..width {
            let distance = (x as i64 - cx).abs() + (y as i64 - cy).abs();
            if distance <= radius {
                canvas.put_pixel(x, y, MARKER);
            }
        }
    }
}
