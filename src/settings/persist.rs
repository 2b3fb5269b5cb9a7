//! Env-style `KEY=VALUE` record backing the live settings.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use super::{Settings, SettingsUpdate};

pub const FRAME_RATE: &str = "FRAME_RATE";
pub const RESIZE_COEF: &str = "RESIZE_COEF";
pub const QUALITY: &str = "QUALITY";
pub const CH_STYLE: &str = "CH_STYLE";
pub const CH_COLOR: &str = "CH_COLOR";
pub const CH_THICKNESS: &str = "CH_THICKNESS";

/// Every key owned by the settings record
pub const KEYS: [&str; 6] = [FRAME_RATE, RESIZE_COEF, QUALITY, CH_STYLE, CH_COLOR, CH_THICKNESS];

/// Read the record at `path`. Returns `Ok(None)` when the file does not exist.
pub fn read_record(path: &Path) -> Result<Option<HashMap<String, String>>, dotenvy::Error> {
    if !path.exists() {
        return Ok(None);
    }

    let mut record = HashMap::new();
    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = item?;
        record.insert(key, value);
    }
    Ok(Some(record))
}

/// Build settings from a record, keeping the default for any missing or invalid key.
pub(super) fn settings_from_record(record: &HashMap<String, String>) -> Settings {
    let defaults = SettingsUpdate::from(&Settings::default());
    let mut update = defaults.clone();

    for key in KEYS {
        let Some(raw) = record.get(key) else {
            debug!(key, "Settings key missing, using default");
            continue;
        };

        let mut candidate = defaults.clone();
        let parsed = match key {
            FRAME_RATE => raw.trim().parse().map(|v| candidate.frame_rate = v).is_ok(),
            RESIZE_COEF => raw.trim().parse().map(|v| candidate.resize_coef = v).is_ok(),
            QUALITY => raw.trim().parse().map(|v| candidate.quality = v).is_ok(),
            CH_THICKNESS => raw.trim().parse().map(|v| candidate.thickness = v).is_ok(),
            CH_STYLE => {
                candidate.ch_style = raw.trim().to_string();
                true
            }
            CH_COLOR => {
                candidate.color = raw.trim().to_string();
                true
            }
            _ => false,
        };

        // Defaults are valid, so validating the candidate checks this key alone
        match (parsed, candidate.validate()) {
            (true, Ok(_)) => match key {
                FRAME_RATE => update.frame_rate = candidate.frame_rate,
                RESIZE_COEF => update.resize_coef = candidate.resize_coef,
                QUALITY => update.quality = candidate.quality,
                CH_THICKNESS => update.thickness = candidate.thickness,
                CH_STYLE => update.ch_style = candidate.ch_style,
                CH_COLOR => update.color = candidate.color,
                _ => {}
            },
            (true, Err(e)) => warn!(key, value = %raw, reason = %e, "Invalid persisted setting, using default"),
            (false, _) => warn!(key, value = %raw, "Unparsable persisted setting, using default"),
        }
    }

    update.validate().unwrap_or_default()
}

fn render_value(key: &str, settings: &Settings) -> String {
    match key {
        FRAME_RATE => settings.frame_rate.to_string(),
        RESIZE_COEF => settings.resize_coef.to_string(),
        QUALITY => settings.quality.to_string(),
        CH_STYLE => settings.crosshair.style.to_string(),
        CH_COLOR => settings.crosshair.color.to_string(),
        CH_THICKNESS => settings.crosshair.thickness.to_string(),
        _ => String::new(),
    }
}

/// Key of an assignment line (`KEY=value` or `export KEY=value`), if any.
fn line_key(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    line.split_once('=').map(|(key, _)| key.trim())
}

/// Rewrite all settings keys in the record at `path`.
///
/// Lines for unrelated keys are kept. The new content is written to a sibling
/// temp file and renamed over the original.
pub fn write_record(path: &Path, settings: &Settings) -> io::Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };

    let mut written = [false; KEYS.len()];
    let mut lines: Vec<String> = Vec::new();

    for line in existing.lines() {
        match line_key(line).and_then(|k| KEYS.iter().position(|owned| *owned == k)) {
            Some(idx) => {
                if !written[idx] {
                    lines.push(format!("{}={}", KEYS[idx], render_value(KEYS[idx], settings)));
                    written[idx] = true;
                }
            }
            None => lines.push(line.to_string()),
        }
    }

    for (idx, key) in KEYS.iter().enumerate() {
        if !written[idx] {
            lines.push(format!("{}={}", key, render_value(key, settings)));
        }
    }

    let mut content = lines.join("\n");
    content.push('\n');

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "settings".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "Settings record written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{Crosshair, CrosshairColor, CrosshairStyle};
    use tempfile::tempdir;

    fn custom() -> Settings {
        Settings {
            frame_rate: 12,
            resize_coef: 0.75,
            quality: 55,
            crosshair: Crosshair {
                style: CrosshairStyle::Dot,
                color: CrosshairColor::Green,
                thickness: 6,
            },
        }
    }

    #[test]
    fn test_write_creates_all_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.env");

        write_record(&path, &custom()).unwrap();
        let record = read_record(&path).unwrap().unwrap();

        assert_eq!(record.len(), KEYS.len());
        assert_eq!(record[FRAME_RATE], "12");
        assert_eq!(record[RESIZE_COEF], "0.75");
        assert_eq!(record[QUALITY], "55");
        assert_eq!(record[CH_STYLE], "dot");
        assert_eq!(record[CH_COLOR], "green");
        assert_eq!(record[CH_THICKNESS], "6");
        assert_eq!(settings_from_record(&record), custom());
    }

    #[test]
    fn test_write_preserves_unrelated_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.env");
        fs::write(&path, "# camera service\nCAM_PORT=9000\nQUALITY=20\nQUALITY=30\n").unwrap();

        write_record(&path, &custom()).unwrap();
        let content = fs::read_to_string(&path).unwrap();

        assert!(content.starts_with("# camera service\nCAM_PORT=9000\nQUALITY=55\n"));
        assert_eq!(content.matches("QUALITY=").count(), 1);
        assert!(content.contains("CH_STYLE=dot"));
    }

    #[test]
    fn test_invalid_entries_fall_back_per_key() {
        let mut record = HashMap::new();
        record.insert(FRAME_RATE.to_string(), "0".to_string());
        record.insert(QUALITY.to_string(), "abc".to_string());
        record.insert(CH_STYLE.to_string(), "circle".to_string());
        record.insert(CH_COLOR.to_string(), "purple".to_string());
        record.insert(CH_THICKNESS.to_string(), "4".to_string());

        let settings = settings_from_record(&record);
        let defaults = Settings::default();

        assert_eq!(settings.frame_rate, defaults.frame_rate);
        assert_eq!(settings.quality, defaults.quality);
        assert_eq!(settings.resize_coef, defaults.resize_coef);
        assert_eq!(settings.crosshair.style, CrosshairStyle::Circle);
        assert_eq!(settings.crosshair.color, defaults.crosshair.color);
        assert_eq!(settings.crosshair.thickness, 4);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        assert!(read_record(&dir.path().join("absent.env")).unwrap().is_none());
    }
}
