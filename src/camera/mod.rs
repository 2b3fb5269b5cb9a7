//! Camera sources.
//!
//! `V4lCamera` grabs frames from a V4L2 device (`/dev/videoN`). It prefers
//! the camera's MJPEG output and falls back to raw YUYV. The stream is opened
//! lazily and dropped on any read error so the next call reopens it; a
//! camera that is unplugged and plugged back in recovers on its own.

mod test_pattern;

use image::{ImageFormat, RgbImage};
use std::collections::BTreeMap;
use std::io;
use thiserror::Error;
use tracing::{debug, info, warn};
use v4l::{
    buffer::Type,
    io::{mmap::Stream as MmapStream, traits::CaptureStream},
    video::Capture,
    Device, Format, FourCC,
};

pub use test_pattern::TestPattern;

const BUFFER_COUNT: u32 = 4;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("failed to open camera {device_id}: {source}")]
    Open { device_id: usize, source: io::Error },

    #[error("camera I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),

    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    #[error("incomplete frame: expected {expected} bytes, got {got}")]
    ShortFrame { expected: usize, got: usize },
}

/// Anything that yields raw RGB frames, one per call.
///
/// An `Err` means "no frame this time"; callers skip and try again later.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<RgbImage, CameraError>;
}

impl FrameSource for Box<dyn FrameSource> {
    fn read_frame(&mut self) -> Result<RgbImage, CameraError> {
        (**self).read_frame()
    }
}

/// An open V4L2 capture stream. `stream` is declared first so it is dropped
/// before the device handle.
struct ActiveStream {
    stream: MmapStream<'static>,
    _device: Device,
    format: Format,
}

/// V4L2 camera addressed by its numeric index
pub struct V4lCamera {
    device_id: usize,
    active: Option<ActiveStream>,
}

impl V4lCamera {
    pub fn new(device_id: usize) -> Self {
        Self {
            device_id,
            active: None,
        }
    }

    fn open(&self) -> Result<ActiveStream, CameraError> {
        let device_id = self.device_id;
        let device = Device::new(device_id).map_err(|source| CameraError::Open { device_id, source })?;

        let caps = device.query_caps()?;
        info!(device_id, card = %caps.card, driver = %caps.driver, "Opening camera");

        let mut fmt = device.format()?;
        if fmt.width == 0 || fmt.height == 0 {
            fmt.width = DEFAULT_WIDTH;
            fmt.height = DEFAULT_HEIGHT;
        }

        let supported: Vec<FourCC> = device
            .enum_formats()
            .map(|descs| descs.into_iter().map(|d| d.fourcc).collect())
            .unwrap_or_default();

        fmt.fourcc = [FourCC::new(b"MJPG"), FourCC::new(b"YUYV")]
            .into_iter()
            .find(|f| supported.is_empty() || supported.contains(f))
            .ok_or_else(|| CameraError::UnsupportedFormat(format!("{:?}", supported)))?;

        let fmt = device.set_format(&fmt)?;
        info!(device_id, format = %fmt, "Camera format set");

        if fmt.fourcc != FourCC::new(b"MJPG") && fmt.fourcc != FourCC::new(b"YUYV") {
            return Err(CameraError::UnsupportedFormat(fmt.fourcc.to_string()));
        }

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)?;

        Ok(ActiveStream {
            stream,
            _device: device,
            format: fmt,
        })
    }

    fn grab(active: &mut ActiveStream) -> Result<RgbImage, CameraError> {
        let format = active.format.clone();
        let (buf, meta) = active.stream.next()?;
        let used = (meta.bytesused as usize).min(buf.len());
        let data = &buf[..used];

        if format.fourcc == FourCC::new(b"MJPG") {
            let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
            Ok(img.to_rgb8())
        } else {
            yuyv_to_rgb(data, format.width, format.height)
        }
    }
}

impl FrameSource for V4lCamera {
    fn read_frame(&mut self) -> Result<RgbImage, CameraError> {
        if self.active.is_none() {
            self.active = Some(self.open()?);
        }

        let Some(active) = self.active.as_mut() else {
            return Err(CameraError::Io(io::Error::from(io::ErrorKind::NotConnected)));
        };

        match Self::grab(active) {
            Ok(frame) => Ok(frame),
            Err(CameraError::Decode(e)) => {
                // A corrupt MJPEG frame does not mean the stream is broken
                debug!(device_id = self.device_id, error = %e, "Dropping undecodable frame");
                Err(CameraError::Decode(e))
            }
            Err(e) => {
                warn!(device_id = self.device_id, error = %e, "Camera read failed, will reopen");
                self.active = None;
                Err(e)
            }
        }
    }
}

/// Convert packed YUYV 4:2:2 to RGB (BT.601, limited range).
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<RgbImage, CameraError> {
    let expected = (width * height * 2) as usize;
    if data.len() < expected {
        return Err(CameraError::ShortFrame {
            expected,
            got: data.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_pixel(y0, u, v));
        rgb.extend_from_slice(&yuv_pixel(y1, u, v));
    }

    RgbImage::from_raw(width, height, rgb).ok_or(CameraError::ShortFrame {
        expected,
        got: data.len(),
    })
}

fn yuv_pixel(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = (y as i32 - 16).max(0);
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    [r.clamp(0, 255) as u8, g.clamp(0, 255) as u8, b.clamp(0, 255) as u8]
}

/// Enumerate video devices as index -> human readable name.
///
/// Queried fresh on every call.
pub fn list_devices() -> Result<BTreeMap<usize, String>, CameraError> {
    let devices = v4l::context::enum_devices()
        .into_iter()
        .map(|node| {
            let name = node
                .name()
                .unwrap_or_else(|| node.path().display().to_string());
            (node.index(), name)
        })
        .collect();
    Ok(devices)
}
