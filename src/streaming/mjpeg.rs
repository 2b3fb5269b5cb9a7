//! `multipart/x-mixed-replace` body for the live stream.
//!
//! The stream emits the current frame, sleeps for the configured frame
//! interval and repeats. When the client goes away hyper drops the body, which
//! drops the stream state and its [`ViewerGuard`]; nothing keeps running for a
//! closed connection.

use axum::{
    body::Body,
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA},
        HeaderValue,
    },
    response::Response,
};
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::settings::SettingsStore;
use crate::streaming::frame_store::FrameStore;

pub const BOUNDARY: &str = "frame";
pub const CONTENT_TYPE_VALUE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Number of currently connected stream clients
#[derive(Debug, Default)]
pub struct ViewerCount(AtomicUsize);

impl ViewerCount {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Held by each live stream; decrements the viewer count when the stream is dropped.
pub struct ViewerGuard {
    viewers: Arc<ViewerCount>,
}

impl ViewerGuard {
    pub fn new(viewers: Arc<ViewerCount>) -> Self {
        let now = viewers.0.fetch_add(1, Ordering::Relaxed) + 1;
        info!(viewers = now, "Stream client connected");
        Self { viewers }
    }
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        let now = self.viewers.0.fetch_sub(1, Ordering::Relaxed) - 1;
        info!(viewers = now, "Stream client disconnected");
    }
}

/// One multipart part wrapping a JPEG.
pub fn build_part(jpeg: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(jpeg.len() + 64);
    buf.put_slice(b"--");
    buf.put_slice(BOUNDARY.as_bytes());
    buf.put_slice(b"\r\nContent-Type: image/jpeg\r\n\r\n");
    buf.put_slice(jpeg);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

struct StreamState {
    frames: Arc<FrameStore>,
    settings: Arc<SettingsStore>,
    first: bool,
    _guard: ViewerGuard,
}

/// Endless stream of multipart parts, one per frame interval.
///
/// Nothing is emitted while the frame store is empty.
pub fn frame_stream(
    frames: Arc<FrameStore>,
    settings: Arc<SettingsStore>,
    viewers: Arc<ViewerCount>,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let state = StreamState {
        frames,
        settings,
        first: true,
        _guard: ViewerGuard::new(viewers),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if !state.first {
                tokio::time::sleep(state.settings.get().frame_interval()).await;
            }
            state.first = false;

            if let Some(frame) = state.frames.read() {
                return Some((Ok(build_part(&frame.jpeg)), state));
            }
        }
    })
}

/// Build the streaming response with no-cache headers.
pub fn mjpeg_response(
    frames: Arc<FrameStore>,
    settings: Arc<SettingsStore>,
    viewers: Arc<ViewerCount>,
) -> Response {
    let body = Body::from_stream(frame_stream(frames, settings, viewers));

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_VALUE));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    response
}
