//! Background capture loop: camera -> overlay -> resize -> JPEG -> frame store.

use serde::Serialize;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::camera::FrameSource;
use crate::processing::process_frame;
use crate::settings::SettingsStore;
use crate::streaming::frame_store::FrameStore;

/// Consecutive failed reads after which the camera is reported as degraded.
pub const DEGRADED_AFTER_FAILURES: u64 = 30;

/// Lock-free counters shared with the HTTP side
#[derive(Debug, Default)]
pub struct CaptureStats {
    frames_captured: AtomicU64,
    capture_failures: AtomicU64,
    consecutive_failures: AtomicU64,
}

/// Point-in-time copy of [`CaptureStats`]
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CaptureSnapshot {
    pub frames_captured: u64,
    pub capture_failures: u64,
    pub consecutive_failures: u64,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_success(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// Returns the new consecutive failure count.
    fn record_failure(&self) -> u64 {
        self.capture_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.consecutive_failures.load(Ordering::Relaxed) >= DEGRADED_AFTER_FAILURES
    }
}

/// What a single loop iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new frame was published with this sequence number
    Published(u64),
    /// The camera produced no frame; the store was left alone
    NoFrame,
    /// A frame was read but could not be encoded
    EncodeFailed,
}

pub struct CaptureLoop<S> {
    source: S,
    frames: Arc<FrameStore>,
    settings: Arc<SettingsStore>,
    stats: Arc<CaptureStats>,
}

impl<S: FrameSource> CaptureLoop<S> {
    pub fn new(
        source: S,
        frames: Arc<FrameStore>,
        settings: Arc<SettingsStore>,
        stats: Arc<CaptureStats>,
    ) -> Self {
        Self {
            source,
            frames,
            settings,
            stats,
        }
    }

    /// One iteration, without the trailing sleep.
    pub fn tick(&mut self) -> TickOutcome {
        let frame = match self.source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                let consecutive = self.stats.record_failure();
                if consecutive == DEGRADED_AFTER_FAILURES {
                    warn!(consecutive, error = %e, "Camera keeps failing, reporting degraded");
                } else {
                    debug!(consecutive, error = %e, "No frame from camera, skipping");
                }
                return TickOutcome::NoFrame;
            }
        };

        // Fresh snapshot every tick so updates apply on the next frame
        let settings = self.settings.get();

        match process_frame(frame, &settings) {
            Ok(jpeg) => {
                let was_degraded = self.stats.is_degraded();
                self.stats.record_success();
                if was_degraded {
                    info!("Camera recovered");
                }
                TickOutcome::Published(self.frames.publish(jpeg))
            }
            Err(e) => {
                error!(error = %e, "Failed to encode frame");
                TickOutcome::EncodeFailed
            }
        }
    }

    /// Run forever: tick, then sleep for the configured frame interval.
    pub fn run(mut self) {
        info!("Capture loop started");
        loop {
            self.tick();
            thread::sleep(self.settings.get().frame_interval());
        }
    }
}

impl<S: FrameSource + 'static> CaptureLoop<S> {
    /// Start the loop on its own named OS thread; camera reads block.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraError, TestPattern};
    use crate::settings::{Settings, SettingsUpdate};
    use image::RgbImage;
    use std::collections::VecDeque;
    use tempfile::{tempdir, TempDir};

    /// Source that replays a script of successes and failures
    struct Scripted {
        script: VecDeque<bool>,
        inner: TestPattern,
    }

    impl Scripted {
        fn new(script: &[bool]) -> Self {
            Self {
                script: script.iter().copied().collect(),
                inner: TestPattern::new(32, 24),
            }
        }
    }

    impl FrameSource for Scripted {
        fn read_frame(&mut self) -> Result<RgbImage, CameraError> {
            match self.script.pop_front() {
                Some(true) => self.inner.read_frame(),
                _ => Err(CameraError::Io(std::io::Error::from(std::io::ErrorKind::WouldBlock))),
            }
        }
    }

    struct Fixture {
        capture: CaptureLoop<Scripted>,
        frames: Arc<FrameStore>,
        stats: Arc<CaptureStats>,
        settings: Arc<SettingsStore>,
        _dir: TempDir,
    }

    fn fixture(script: &[bool]) -> Fixture {
        let dir = tempdir().unwrap();
        let frames = Arc::new(FrameStore::new());
        let stats = Arc::new(CaptureStats::new());
        let settings = Arc::new(SettingsStore::new(
            Settings::default(),
            dir.path().join("settings.env"),
        ));
        let capture = CaptureLoop::new(Scripted::new(script), frames.clone(), settings.clone(), stats.clone());
        Fixture {
            capture,
            frames,
            stats,
            settings,
            _dir: dir,
        }
    }

    #[test]
    fn test_failed_read_leaves_store_empty() {
        let Fixture { mut capture, frames, stats, .. } = fixture(&[false, false]);

        assert_eq!(capture.tick(), TickOutcome::NoFrame);
        assert_eq!(capture.tick(), TickOutcome::NoFrame);
        assert!(frames.read().is_none());
        assert_eq!(stats.snapshot().capture_failures, 2);
        assert_eq!(stats.snapshot().consecutive_failures, 2);
    }

    #[test]
    fn test_store_holds_latest_successful_frame() {
        let Fixture { mut capture, frames, stats, .. } = fixture(&[true, false, true, true, false]);

        let outcomes: Vec<_> = (0..5).map(|_| capture.tick()).collect();
        assert_eq!(
            outcomes,
            vec![
                TickOutcome::Published(1),
                TickOutcome::NoFrame,
                TickOutcome::Published(2),
                TickOutcome::Published(3),
                TickOutcome::NoFrame,
            ]
        );

        let latest = frames.read().unwrap();
        assert_eq!(latest.sequence, 3);
        assert_eq!(&latest.jpeg[..2], &[0xFF, 0xD8]);

        let snap = stats.snapshot();
        assert_eq!(snap.frames_captured, 3);
        assert_eq!(snap.capture_failures, 2);
        assert_eq!(snap.consecutive_failures, 1);
    }

    #[test]
    fn test_settings_apply_on_next_tick() {
        let Fixture { mut capture, frames, settings, _dir, .. } = fixture(&[true, true]);

        capture.tick();
        let first = image::load_from_memory(&frames.read().unwrap().jpeg).unwrap();
        assert_eq!((first.width(), first.height()), (32, 24));

        let update = SettingsUpdate {
            resize_coef: 2.0,
            ..SettingsUpdate::from(&Settings::default())
        };
        settings.set(&update).unwrap();

        capture.tick();
        let second = image::load_from_memory(&frames.read().unwrap().jpeg).unwrap();
        assert_eq!((second.width(), second.height()), (64, 48));
    }

    #[test]
    fn test_degraded_after_repeated_failures_and_recovers() {
        let mut script = vec![false; DEGRADED_AFTER_FAILURES as usize];
        script.push(true);
        let Fixture { mut capture, stats, .. } = fixture(&script);

        for _ in 0..DEGRADED_AFTER_FAILURES {
            capture.tick();
        }
        assert!(stats.is_degraded());

        capture.tick();
        assert!(!stats.is_degraded());
    }

}
