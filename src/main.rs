//! Crosshair camera streaming service

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use crosshair_cam::camera::{FrameSource, TestPattern, V4lCamera};
use crosshair_cam::config::Config;
use crosshair_cam::settings::SettingsStore;
use crosshair_cam::streaming::{CaptureLoop, CaptureStats, FrameStore};
use crosshair_cam::web::{run_server, AppState};

#[derive(Parser, Debug)]
#[command(name = "crosshair-cam")]
#[command(author, version, about = "Camera MJPEG stream with a crosshair overlay", long_about = None)]
struct CliArgs {
    /// Path to configuration file (optional, defaults are used when missing)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Bind address for the HTTP server
    #[arg(long)]
    host: Option<String>,

    /// Port for the HTTP server. Default 8877.
    #[arg(long)]
    port: Option<u16>,

    /// Camera device index (/dev/videoN)
    #[arg(long)]
    device: Option<usize>,

    /// Env-style file the capture/overlay settings are persisted to
    #[arg(long)]
    settings_file: Option<PathBuf>,

    /// Serve a synthetic test pattern instead of a real camera
    #[arg(long)]
    test_pattern: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl CliArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.bind_ip = host.clone();
        }
        if let Some(port) = self.port {
            config.server.web_port = port;
        }
        if let Some(device) = self.device {
            config.camera.device_id = device;
        }
        if let Some(path) = &self.settings_file {
            config.camera.settings_file = path.clone();
        }
        if self.test_pattern {
            config.camera.test_pattern = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Setup logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    info!(config_path = %args.config.display(), "Loading configuration");
    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    args.apply(&mut config);
    let addr = config.bind_addr()?;

    info!(
        device_id = config.camera.device_id,
        test_pattern = config.camera.test_pattern,
        settings_file = %config.camera.settings_file.display(),
        "Configuration loaded"
    );

    let frames = Arc::new(FrameStore::new());
    let settings = Arc::new(SettingsStore::load(&config.camera.settings_file));
    let stats = Arc::new(CaptureStats::new());

    let source: Box<dyn FrameSource> = if config.camera.test_pattern {
        Box::new(TestPattern::new(640, 480))
    } else {
        Box::new(V4lCamera::new(config.camera.device_id))
    };

    let _capture = CaptureLoop::new(source, frames.clone(), settings.clone(), stats.clone())
        .spawn()
        .context("Failed to start capture thread")?;

    let state = AppState::new(frames, settings, stats);
    let server = tokio::spawn(async move {
        if let Err(e) = run_server(addr, state).await {
            error!(error = %e, "Web server failed");
        }
    });

    info!("Service running, press Ctrl+C to stop");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
        _ = server => error!("Web server exited"),
    }

    Ok(())
}
