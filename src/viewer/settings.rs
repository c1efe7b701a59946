//! Persistent application settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::geom::ReceiverKind;
use crate::pipeline::ShadowMode;
use crate::sampling::Seed;

/// Application settings that persist between sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Window
    pub window_width: f32,
    pub window_height: f32,
    pub window_x: Option<f32>,
    pub window_y: Option<f32>,
    pub side_panel_width: f32,

    // Rendering
    pub shadow_mode: ShadowMode,
    pub receiver: ReceiverKind,
    pub seed: Seed,
    pub dump_dir: Option<PathBuf>,

    // Files
    pub last_mesh: Option<PathBuf>,
    pub last_save_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_width: 1280.0,
            window_height: 800.0,
            window_x: None,
            window_y: None,
            side_panel_width: 220.0,
            shadow_mode: ShadowMode::default(),
            receiver: ReceiverKind::default(),
            seed: Seed::Entropy,
            dump_dir: None,
            last_mesh: None,
            last_save_dir: None,
        }
    }
}

impl Settings {
    /// Get settings file path
    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("shadowmaps-viewer");
            std::fs::create_dir_all(&p).ok();
            p.push("settings.json");
            p
        })
    }

    /// Load settings from file; missing or malformed files give defaults
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| std::fs::read_to_string(&p).ok())
            .map(|s| Self::from_json(&s))
            .unwrap_or_default()
    }

    fn from_json(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring malformed viewer settings: {}", e);
                Self::default()
            }
        }
    }

    /// Save settings to file
    pub fn save(&self) {
        if let Some(path) = Self::path() {
            match serde_json::to_string_pretty(self) {
                Ok(json) => {
                    if let Err(e) = std::fs::write(&path, json) {
                        log::warn!("Failed to save settings to {}: {}", path.display(), e);
                    }
                }
                Err(e) => log::warn!("Failed to serialize settings: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings = Settings::from_json(r#"{ "shadow_mode": "Rsm", "window_width": 640.0 }"#);
        assert_eq!(settings.shadow_mode, ShadowMode::Rsm);
        assert_eq!(settings.window_width, 640.0);
        assert_eq!(settings.window_height, Settings::default().window_height);
        assert_eq!(settings.seed, Seed::Entropy);
    }

    #[test]
    fn test_malformed_settings_fall_back() {
        let settings = Settings::from_json("{ not json");
        assert_eq!(settings.shadow_mode, ShadowMode::default());
        assert!(settings.last_mesh.is_none());
    }
}
