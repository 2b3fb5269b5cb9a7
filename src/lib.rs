//! Single-camera HTTP service: live MJPEG stream, snapshots and a
//! runtime-adjustable crosshair overlay.
//!
//! One background capture loop reads the camera, draws the crosshair,
//! resizes, encodes to JPEG and publishes into a shared [`FrameStore`].
//! HTTP handlers read the latest frame from that store. Capture and overlay
//! settings live in a [`SettingsStore`] that validates updates, applies them
//! live and persists them to an env-style file.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use crosshair_cam::camera::TestPattern;
//! use crosshair_cam::settings::SettingsStore;
//! use crosshair_cam::streaming::{CaptureLoop, CaptureStats, FrameStore};
//!
//! let frames = Arc::new(FrameStore::new());
//! let settings = Arc::new(SettingsStore::load("settings.env"));
//! let stats = Arc::new(CaptureStats::new());
//! CaptureLoop::new(TestPattern::new(640, 480), frames.clone(), settings, stats)
//!     .spawn()
//!     .unwrap();
//! ```

pub mod camera;
pub mod config;
pub mod error;
pub mod processing;
pub mod settings;
pub mod streaming;
pub mod web;

// Re-exports for convenience
pub use config::Config;
pub use settings::{Settings, SettingsStore};
pub use streaming::FrameStore;
pub use web::{router, AppState};
