// Configuration loaded from a RON file

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::animation::Easing;
use crate::camera::CameraMode;
use crate::error::{Error, Result};
use crate::export::ExportFormat;
use crate::input::KeyBindings;

pub const DEFAULT_CONFIG_PATH: &str = "scenecraft.ron";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub bindings: KeyBindings,
    pub animation: AnimationConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "scenecraft".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub mode: CameraMode,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// World units per second
    pub move_speed: f32,
    /// Radians per pixel of mouse travel
    pub look_sensitivity: f32,
    /// Dragging up looks down
    pub invert_y: bool,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    /// Maximum elevation above or below the horizon
    pub pitch_limit_degrees: f32,
    /// Orbit distance used when switching into orbit mode
    pub orbit_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            mode: CameraMode::FirstPerson,
            fov_degrees: 60.0,
            near: 0.1,
            far: 500.0,
            move_speed: 4.0,
            look_sensitivity: 0.003,
            invert_y: false,
            zoom_speed: 0.1,
            pan_speed: 0.002,
            pitch_limit_degrees: 89.0,
            orbit_distance: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Seconds between keyframes appended from the live camera
    pub keyframe_interval: f32,
    pub easing: Easing,
    pub looping: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            keyframe_interval: 2.0,
            easing: Easing::Smooth,
            looping: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: PathBuf,
    pub prefix: String,
    pub format: ExportFormat,
    pub fps: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("export"),
            prefix: "frame".to_string(),
            format: ExportFormat::Png,
            fps: 30,
        }
    }
}

impl Config {
    /// Load the config from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!("Config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::parse(&text).map_err(|source| Error::Ron {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(text: &str) -> std::result::Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::KeyCode;

    #[test]
    fn partial_config_fills_defaults() {
        let config = Config::parse(
            r#"(
                camera: (fov_degrees: 45.0, mode: Orbit),
                export: (format: Gif, fps: 12),
            )"#,
        )
        .unwrap();
        assert_eq!(config.camera.fov_degrees, 45.0);
        assert_eq!(config.camera.mode, CameraMode::Orbit);
        assert_eq!(config.camera.near, CameraConfig::default().near);
        assert_eq!(config.export.format, ExportFormat::Gif);
        assert_eq!(config.export.fps, 12);
        assert_eq!(config.window.width, 1280);
    }

    #[test]
    fn bindings_can_be_overridden() {
        let config = Config::parse("(bindings: (forward: ArrowUp))").unwrap();
        assert_eq!(config.bindings.forward, KeyCode::ArrowUp);
        assert_eq!(config.bindings.back, KeyCode::KeyS);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("scenecraft-no-such-config.ron");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = std::env::temp_dir().join("scenecraft-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.ron");
        std::fs::write(&path, "(camera: (fov_degrees: \"wide\"))").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Ron { .. })));
    }
}
