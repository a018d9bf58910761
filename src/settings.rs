use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::control::Mode;

/// Returns the path to the settings file: `~/.config/glow-rs/settings.json`
fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("glow-rs");
    path.push("settings.json");
    path
}

/// Persisted application settings.
///
/// Serialized as JSON to the platform config directory.
/// Fields use `#[serde(default)]` so that adding new settings
/// won't break existing config files.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    // Audio input
    pub input_device: Option<String>,
    pub sample_rate: u32,
    /// Frames per buffer; 0 lets the device pick.
    pub buffer_frames: u32,

    // Control channel
    pub osc_port: u16,

    // PWM output
    pub pwm_chip: u32,
    pub pwm_channel: u32,
    pub pwm_period_ns: u32,
    pub max_duty: u32,

    // Control state at startup
    pub startup_mode: Mode,
    pub startup_level: f32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            input_device: None,
            sample_rate: 44_100,
            buffer_frames: 64,

            osc_port: 3334,

            pwm_chip: 0,
            pwm_channel: 0,
            pwm_period_ns: 1_000_000, // 1 kHz
            max_duty: 1024,

            startup_mode: Mode::Manual,
            startup_level: 0.2,
        }
    }
}

impl AppSettings {
    /// Load settings from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        let path = settings_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Failed to parse settings ({}), using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                log::info!("No settings file found ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Save settings to disk as pretty JSON.
    pub fn save(&self) {
        let path = settings_path();
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Failed to create config directory: {}", e);
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    log::warn!("Failed to write settings: {}", e);
                }
            }
            Err(e) => {
                log::warn!("Failed to serialize settings: {}", e);
            }
        }
    }

    /// Whether a settings file exists on disk.
    pub fn exists() -> bool {
        settings_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let json = serde_json::to_string(&AppSettings::default()).unwrap();
        let parsed: AppSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.osc_port, 3334);
        assert_eq!(parsed.buffer_frames, 64);
        assert_eq!(parsed.startup_level, 0.2);
        assert_eq!(parsed.startup_mode, Mode::Manual);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let parsed: AppSettings = serde_json::from_str(r#"{"osc_port": 9000}"#).unwrap();
        assert_eq!(parsed.osc_port, 9000);
        assert_eq!(parsed.max_duty, 1024);
    }
}
