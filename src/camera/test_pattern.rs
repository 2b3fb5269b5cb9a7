use image::{Rgb, RgbImage};

use super::{CameraError, FrameSource};

/// Synthetic source producing a moving colour gradient, for running without hardware.
pub struct TestPattern {
    width: u32,
    height: u32,
    tick: u32,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            tick: 0,
        }
    }
}

impl FrameSource for TestPattern {
    fn read_frame(&mut self) -> Result<RgbImage, CameraError> {
        let shift = self.tick;
        self.tick = (self.tick + 4) % 256;

        let (w, h) = (self.width, self.height);
        Ok(RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                ((x * 255 / w + shift) % 256) as u8,
                ((y * 255 / h) % 256) as u8,
                shift as u8,
            ])
        }))
    }
}
