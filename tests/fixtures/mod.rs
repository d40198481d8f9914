//! Sample inputs for orchestrator and API tests
#![allow(dead_code)]

use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use image_relay::models::job::{Job, JobId};

/// A small decodable PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([40, 120, 200]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Ten bytes that are not an image but are fine as base64 payload.
pub const NOT_AN_IMAGE: &[u8] = b"0123456789";

pub fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn job(prompt: &str, filename: Option<&str>, image_base64: String) -> Job {
    Job {
        id: JobId::generate(),
        prompt: prompt.to_string(),
        filename: filename.map(str::to_string),
        image_base64,
    }
}
