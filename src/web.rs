use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::camera::{self, CameraError};
use crate::error::{AppError, Result};
use crate::settings::{SettingsStore, SettingsUpdate, SettingsView, UpdateOutcome};
use crate::streaming::{mjpeg, CaptureStats, FrameStore, ViewerCount};

/// Enumerates cameras as index -> name
pub type DeviceLister =
    Arc<dyn Fn() -> std::result::Result<BTreeMap<usize, String>, CameraError> + Send + Sync>;

/// Web server state
#[derive(Clone)]
pub struct AppState {
    pub frames: Arc<FrameStore>,
    pub settings: Arc<SettingsStore>,
    pub stats: Arc<CaptureStats>,
    pub viewers: Arc<ViewerCount>,
    pub devices: DeviceLister,
}

impl AppState {
    pub fn new(frames: Arc<FrameStore>, settings: Arc<SettingsStore>, stats: Arc<CaptureStats>) -> Self {
        Self {
            frames,
            settings,
            stats,
            viewers: Arc::new(ViewerCount::default()),
            devices: Arc::new(camera::list_devices),
        }
    }

    /// Replace the camera enumeration backend
    pub fn with_device_lister(mut self, devices: DeviceLister) -> Self {
        self.devices = devices;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/video", get(video_handler))
        .route("/screenshot", get(screenshot_handler))
        .route("/available_cams", get(available_cams_handler))
        .route("/settings", get(get_settings_handler).post(post_settings_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server
pub async fn run_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    info!("Starting web server on http://{}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Crosshair Cam</title>
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body { margin: 0; background: #111; color: #eee; font-family: sans-serif; text-align: center; }
        img { max-width: 100%; margin-top: 10px; }
        a { color: #8cf; }
    </style>
</head>
<body>
    <img src="/video" alt="live stream">
    <p>
        <a href="/screenshot">Snapshot</a> |
        <a href="/settings">Settings</a> |
        <a href="/available_cams">Cameras</a> |
        <a href="/health">Health</a>
    </p>
</body>
</html>"#,
    )
}

async fn video_handler(State(state): State<AppState>) -> Response {
    mjpeg::mjpeg_response(state.frames, state.settings, state.viewers)
}

async fn screenshot_handler(State(state): State<AppState>) -> Response {
    match state.frames.read() {
        Some(frame) => ([(header::CONTENT_TYPE, "image/jpeg")], frame.jpeg).into_response(),
        None => Json(serde_json::json!({ "error": "camera not ready" })).into_response(),
    }
}

async fn available_cams_handler(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<usize, String>>> {
    let lister = state.devices.clone();
    let devices = tokio::task::spawn_blocking(move || lister())
        .await
        .map_err(|e| AppError::Internal(format!("camera enumeration task failed: {}", e)))??;
    Ok(Json(devices))
}

async fn get_settings_handler(State(state): State<AppState>) -> Json<SettingsView> {
    Json(state.settings.get().to_wire())
}

/// Response to an accepted settings update
#[derive(Serialize)]
struct UpdateResponse {
    message: &'static str,
    persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    settings: SettingsView,
}

async fn post_settings_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SettingsUpdate>, JsonRejection>,
) -> Result<Json<UpdateResponse>> {
    let Json(update) = payload?;

    let response = match state.settings.set(&update)? {
        UpdateOutcome::Persisted(settings) => UpdateResponse {
            message: "settings updated",
            persisted: true,
            warning: None,
            settings: settings.to_wire(),
        },
        UpdateOutcome::NotPersisted(settings, e) => {
            warn!(error = %e, "Returning non-durable settings update");
            UpdateResponse {
                message: "settings updated",
                persisted: false,
                warning: Some(format!("settings applied but could not be saved: {}", e)),
                settings: settings.to_wire(),
            }
        }
    };

    Ok(Json(response))
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    frames_captured: u64,
    capture_failures: u64,
    consecutive_failures: u64,
    viewers: usize,
    version: &'static str,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.stats.snapshot();
    let status = if state.stats.is_degraded() {
        "degraded"
    } else if !state.frames.is_ready() {
        "starting"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status,
        frames_captured: snapshot.frames_captured,
        capture_failures: snapshot.capture_failures,
        consecutive_failures: snapshot.consecutive_failures,
        viewers: state.viewers.get(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
