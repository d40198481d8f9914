use async_trait::async_trait;
use image::{imageops, DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use crate::services::engine::{EngineError, ImageEngine, OutputFormat, ProcessingResult};

const WATERMARK: &str = "FALLBACK";
const WATERMARK_ORIGIN: (u32, u32) = (20, 20);
const WATERMARK_SCALE: u32 = 2;
const WATERMARK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const WATERMARK_ALPHA: u16 = 200;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// Local degraded engine: color inversion plus a visible watermark.
///
/// Ignores the prompt. Output is always PNG.
#[derive(Debug, Default)]
pub struct LocalFallbackEngine;

impl LocalFallbackEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn render(image: &[u8]) -> Result<Vec<u8>, EngineError> {
        let decoded = image::load_from_memory(image)
            .map_err(|e| EngineError::Unavailable(format!("fallback could not decode image: {e}")))?;

        let mut rgb = decoded.to_rgb8();
        imageops::invert(&mut rgb);
        stamp(&mut rgb, WATERMARK);

        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(rgb)
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| EngineError::Unavailable(format!("fallback could not encode PNG: {e}")))?;
        Ok(out.into_inner())
    }
}

#[async_trait]
impl ImageEngine for LocalFallbackEngine {
    async fn edit(&self, image: &[u8], _prompt: &str) -> Result<ProcessingResult, EngineError> {
        let image = image.to_vec();
        let bytes = tokio::task::spawn_blocking(move || Self::render(&image))
            .await
            .map_err(|e| EngineError::Unavailable(format!("fallback task failed: {e}")))??;
        Ok(ProcessingResult::new(bytes, OutputFormat::Png))
    }
}

/// Draw `text` in the watermark color, clipped to the image bounds.
fn stamp(img: &mut RgbImage, text: &str) {
    let (width, height) = img.dimensions();
    let (origin_x, origin_y) = WATERMARK_ORIGIN;
    let advance = (GLYPH_WIDTH + 1) * WATERMARK_SCALE;

    for (index, ch) in text.chars().enumerate() {
        let glyph_x = origin_x + index as u32 * advance;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..WATERMARK_SCALE {
                    for dx in 0..WATERMARK_SCALE {
                        let x = glyph_x + col * WATERMARK_SCALE + dx;
                        let y = origin_y + row as u32 * WATERMARK_SCALE + dy;
                        if x < width && y < height {
                            blend(img.get_pixel_mut(x, y));
                        }
                    }
                }
            }
        }
    }
}

fn blend(pixel: &mut Rgb<u8>) {
    for (channel, ink) in pixel.0.iter_mut().zip(WATERMARK_COLOR.0) {
        let mixed = (*channel as u16 * (255 - WATERMARK_ALPHA) + ink as u16 * WATERMARK_ALPHA) / 255;
        *channel = mixed as u8;
    }
}

/// 5x7 bitmaps, one row per byte, most significant of the low five bits first.
fn glyph(ch: char) -> [u8; GLYPH_HEIGHT as usize] {
    match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        _ => [0; GLYPH_HEIGHT as usize],
    }
}
