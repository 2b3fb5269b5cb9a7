//! Live, validated, persisted capture and overlay settings.
//!
//! The live value is swapped as a whole under a write lock, so the capture
//! loop always sees either the previous or the new settings, never a mix.
//! Updates are serialized so the record on disk follows the same order as
//! the live swaps.

mod persist;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize, Serializer};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::processing::{Crosshair, CrosshairColor, CrosshairStyle};

pub use persist::{read_record, write_record, KEYS};

pub const FRAME_RATE_RANGE: (i64, i64) = (1, 60);
pub const RESIZE_COEF_RANGE: (f64, f64) = (0.1, 5.0);
pub const QUALITY_RANGE: (i64, i64) = (10, 100);
pub const THICKNESS_RANGE: (i64, i64) = (1, 10);

/// A rejected settings field, with a human readable reason
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Result of an accepted update
#[derive(Debug)]
pub enum UpdateOutcome {
    /// Live settings changed and the record was written
    Persisted(Settings),
    /// Live settings changed but the record could not be written
    NotPersisted(Settings, io::Error),
}

/// Validated capture and crosshair configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub frame_rate: u32,
    pub resize_coef: f64,
    pub quality: u8,
    pub crosshair: Crosshair,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            resize_coef: 1.0,
            quality: 90,
            crosshair: Crosshair::default(),
        }
    }
}

impl Settings {
    /// Delay between capture iterations: `1 / frame_rate` rounded to hundredths of a second.
    pub fn frame_interval(&self) -> Duration {
        frame_interval(self.frame_rate)
    }

    pub fn to_wire(&self) -> SettingsView {
        SettingsView {
            frame_rate: self.frame_rate,
            resize_coef: self.resize_coef,
            quality: self.quality,
            ch_style: self.crosshair.style,
            color: self.crosshair.color,
            thickness: self.crosshair.thickness,
        }
    }
}

/// `1 / frame_rate` rounded to hundredths, as decimal rounding of the `f64`
/// reciprocal would: ties go to the side the binary value falls on, and to
/// even when the reciprocal is exact.
pub fn frame_interval(frame_rate: u32) -> Duration {
    let fr = u64::from(frame_rate.max(1));
    let mut hundredths = 100 / fr;
    let twice_rem = 2 * (100 % fr);

    let round_up = if twice_rem != fr {
        twice_rem > fr
    } else {
        let reciprocal = 1.0 / fr as f64;
        // Exact residual of the rounded reciprocal
        let residual = reciprocal.mul_add(fr as f64, -1.0);
        if residual == 0.0 {
            hundredths % 2 == 1
        } else {
            residual > 0.0
        }
    };
    if round_up {
        hundredths += 1;
    }

    Duration::from_millis(hundredths * 10)
}

/// Whole coefficients go out as integers (`1`, not `1.0`).
fn serialize_coef<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Flat JSON shape returned by `GET /settings`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingsView {
    pub frame_rate: u32,
    #[serde(serialize_with = "serialize_coef")]
    pub resize_coef: f64,
    pub quality: u8,
    pub ch_style: CrosshairStyle,
    pub color: CrosshairColor,
    pub thickness: u32,
}

/// Unvalidated candidate settings as submitted by a client.
///
/// Fields are loosely typed so out-of-range numbers and unknown names reach
/// validation instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingsUpdate {
    pub frame_rate: i64,
    pub resize_coef: f64,
    pub quality: i64,
    pub ch_style: String,
    pub color: String,
    pub thickness: i64,
}

impl From<&Settings> for SettingsUpdate {
    fn from(s: &Settings) -> Self {
        Self {
            frame_rate: s.frame_rate as i64,
            resize_coef: s.resize_coef,
            quality: s.quality as i64,
            ch_style: s.crosshair.style.to_string(),
            color: s.crosshair.color.to_string(),
            thickness: s.crosshair.thickness as i64,
        }
    }
}

impl SettingsUpdate {
    /// Check every field, stopping at the first violation.
    pub fn validate(&self) -> Result<Settings, ValidationError> {
        let frame_rate = check_int("frame_rate", self.frame_rate, FRAME_RATE_RANGE)?;

        let (lo, hi) = RESIZE_COEF_RANGE;
        if !(lo..=hi).contains(&self.resize_coef) {
            return Err(ValidationError::new(
                "resize_coef",
                format!("resize_coef must be between {} and {}", lo, hi),
            ));
        }

        let quality = check_int("quality", self.quality, QUALITY_RANGE)?;
        let thickness = check_int("thickness", self.thickness, THICKNESS_RANGE)?;

        let style: CrosshairStyle = self.ch_style.parse().map_err(|_| {
            ValidationError::new(
                "ch_style",
                format!(
                    "invalid ch_style '{}', expected one of: {}",
                    self.ch_style,
                    CrosshairStyle::NAMES.join(", ")
                ),
            )
        })?;

        let color: CrosshairColor = self.color.parse().map_err(|_| {
            ValidationError::new(
                "color",
                format!(
                    "invalid color '{}', expected one of: {}",
                    self.color,
                    CrosshairColor::NAMES.join(", ")
                ),
            )
        })?;

        Ok(Settings {
            frame_rate: frame_rate as u32,
            resize_coef: self.resize_coef,
            quality: quality as u8,
            crosshair: Crosshair {
                style,
                color,
                thickness: thickness as u32,
            },
        })
    }
}

fn check_int(field: &'static str, value: i64, (lo, hi): (i64, i64)) -> Result<i64, ValidationError> {
    if (lo..=hi).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::new(
            field,
            format!("{} must be between {} and {}", field, lo, hi),
        ))
    }
}

/// Process-wide settings: live copy plus the backing record on disk
pub struct SettingsStore {
    live: RwLock<Settings>,
    /// Held across swap and write so concurrent updates persist in order
    update_lock: Mutex<()>,
    path: PathBuf,
}

impl SettingsStore {
    /// Create a store with an explicit starting value.
    pub fn new(initial: Settings, path: impl Into<PathBuf>) -> Self {
        Self {
            live: RwLock::new(initial),
            update_lock: Mutex::new(()),
            path: path.into(),
        }
    }

    /// Load settings from the record at `path`, falling back to defaults per field.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match read_record(&path) {
            Ok(Some(record)) => {
                let settings = persist::settings_from_record(&record);
                info!(path = %path.display(), ?settings, "Loaded persisted settings");
                settings
            }
            Ok(None) => {
                info!(path = %path.display(), "No settings file, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read settings file, using defaults");
                Settings::default()
            }
        };

        Self::new(settings, path)
    }

    pub fn get(&self) -> Settings {
        *self.live.read()
    }

    /// Validate and apply `update`, then persist it.
    ///
    /// Nothing changes when validation fails. A write failure still leaves
    /// the new live settings in place.
    pub fn set(&self, update: &SettingsUpdate) -> Result<UpdateOutcome, SettingsError> {
        let settings = update.validate()?;

        let _guard = self.update_lock.lock();
        *self.live.write() = settings;
        info!(?settings, "Settings updated");

        match write_record(&self.path, &settings) {
            Ok(()) => Ok(UpdateOutcome::Persisted(settings)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Settings applied but not persisted");
                Ok(UpdateOutcome::NotPersisted(settings, e))
            }
        }
    }
}
