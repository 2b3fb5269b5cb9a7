//! Per-frame processing: overlay, resize and JPEG encoding.

pub mod overlay;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use std::io::Cursor;
use thiserror::Error;

use crate::settings::Settings;

pub use overlay::{Crosshair, CrosshairColor, CrosshairStyle};

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Scale both dimensions by `coefficient`. A coefficient of 1 returns the frame untouched.
pub fn resize(frame: RgbImage, coefficient: f64) -> RgbImage {
    if coefficient == 1.0 {
        return frame;
    }

    let (width, height) = frame.dimensions();
    let new_w = ((width as f64 * coefficient).round() as u32).max(1);
    let new_h = ((height as f64 * coefficient).round() as u32).max(1);
    image::imageops::resize(&frame, new_w, new_h, FilterType::Triangle)
}

/// Encode an RGB frame to JPEG at the given quality (1-100).
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Bytes, ProcessingError> {
    let mut jpeg_data = Cursor::new(Vec::with_capacity(64 * 1024));
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_data, quality);
    encoder.encode_image(frame)?;
    Ok(Bytes::from(jpeg_data.into_inner()))
}

/// Full pipeline for one captured frame: crosshair, resize, encode.
pub fn process_frame(mut frame: RgbImage, settings: &Settings) -> Result<Bytes, ProcessingError> {
    settings.crosshair.draw(&mut frame);
    let frame = resize(frame, settings.resize_coef);
    encode_jpeg(&frame, settings.quality)
}
