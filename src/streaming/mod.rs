pub mod capture;
pub mod frame_store;
pub mod mjpeg;

pub use capture::{CaptureLoop, CaptureSnapshot, CaptureStats, TickOutcome};
pub use frame_store::{FrameStore, LatestFrame};
pub use mjpeg::{mjpeg_response, ViewerCount};
