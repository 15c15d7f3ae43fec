use anyhow::{Context, Result};
use eframe::egui::{Color32, ColorImage};
use image::DynamicImage;

/// Decodes a photo and, when `max_dim` is given, shrinks it so the longest
/// edge fits. Smaller images are never upscaled.
pub fn decode_color_image(bytes: &[u8], max_dim: Option<usize>) -> Result<ColorImage> {
    let decoded = image::load_from_memory(bytes).context("Could not decode image bytes")?;
    let fitted = match max_dim {
        Some(max_dim) => fit_within(decoded, max_dim),
        None => decoded,
    };
    let rgba = fitted.to_rgba8();
    Ok(render_rgba(
        rgba.width() as usize,
        rgba.height() as usize,
        rgba.as_raw(),
    ))
}

fn fit_within(decoded: DynamicImage, max_dim: usize) -> DynamicImage {
    let bound = u32::try_from(max_dim).unwrap_or(u32::MAX).max(1);
    if decoded.width() <= bound && decoded.height() <= bound {
        return decoded;
    }
    decoded.thumbnail(bound, bound)
}

pub fn render_rgba(width_px: usize, height_px: usize, frame_pixels: &[u8]) -> ColorImage {
    let pixel_count = width_px.saturating_mul(height_px);
    let mut pixels = Vec::with_capacity(pixel_count);

    for chunk in frame_pixels.chunks_exact(4).take(pixel_count) {
        pixels.push(Color32::from_rgba_unmultiplied(
            chunk[0], chunk[1], chunk[2], chunk[3],
        ));
    }

    if pixels.len() < pixel_count {
        pixels.resize(pixel_count, Color32::BLACK);
    }

    ColorImage {
        size: [width_px, height_px],
        pixels,
    }
}
