// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub shaders: ShaderConfig,
    pub camera: CameraConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Plonk".to_string(),
            width: 1024,
            height: 768,
            fullscreen: false,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "fifo".to_string(),
        }
    }
}

/// Pre-compiled SPIR-V shader locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/simple.vert.spv"),
            fragment: PathBuf::from("shaders/simple.frag.spv"),
        }
    }
}

/// Initial camera placement
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub direction: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, -1.0, -12.0],
            direction: [0.0, 0.0, 1.0],
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_level: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_level: "info".to_string(),
            show_fps: true,
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, see [`Config::load_or_default`]
    pub fn load() -> (Self, Option<anyhow::Error>) {
        Self::load_or_default("config.toml")
    }

    /// Load configuration, falling back to defaults when the file is invalid.
    ///
    /// Runs before logging is initialised, so the load error is handed back
    /// for the caller to report instead of being logged here.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load_from_path(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        }
    }

    /// Load configuration from a specific path. A missing file gives defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get present mode as Vulkan enum
    pub fn present_mode(&self) -> ash::vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => ash::vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => ash::vk::PresentModeKHR::MAILBOX,
            "fifo" => ash::vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => ash::vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to FIFO",
                    self.graphics.present_mode
                );
                ash::vk::PresentModeKHR::FIFO
            }
        }
    }

    /// Log level filter, `RUST_LOG` still takes precedence at init time
    pub fn log_level(&self) -> Result<log::LevelFilter> {
        self.debug
            .log_level
            .parse()
            .map_err(|_| anyhow::anyhow!("Unknown log level '{}'", self.debug.log_level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 768);
        assert_eq!(config.present_mode(), ash::vk::PresentModeKHR::FIFO);
        assert_eq!(config.shaders.vertex, PathBuf::from("shaders/simple.vert.spv"));
        assert_eq!(config.shaders.fragment, PathBuf::from("shaders/simple.frag.spv"));
        assert_eq!(config.camera.position, [0.0, -1.0, -12.0]);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [window]
            width = 800

            [graphics]
            present_mode = "Mailbox"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 768);
        assert_eq!(config.window.title, "Plonk");
        assert_eq!(config.present_mode(), ash::vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_unknown_present_mode_falls_back_to_fifo() {
        let config = Config::parse("[graphics]\npresent_mode = \"sideways\"").unwrap();
        assert_eq!(config.present_mode(), ash::vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_log_level() {
        let config = Config::parse("[debug]\nlog_level = \"trace\"").unwrap();
        assert_eq!(config.log_level().unwrap(), log::LevelFilter::Trace);

        let config = Config::parse("[debug]\nlog_level = \"loud\"").unwrap();
        let err = config.log_level().unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::parse("[window\nwidth = ").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load_from_path("does/not/exist/config.toml").unwrap();
        assert!(config.debug.validation_layers);
        assert!(config.debug.show_fps);

        let (_, error) = Config::load_or_default("does/not/exist/config.toml");
        assert!(error.is_none());
    }

    #[test]
    fn test_invalid_file_gives_defaults_and_reports_error() {
        let path = std::env::temp_dir().join(format!("plonk-invalid-{}.toml", std::process::id()));
        std::fs::write(&path, "[window]\nwidth = \"wide\"").unwrap();

        let (config, error) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.window.width, 1024);
        let error = error.expect("invalid file should be reported");
        assert!(format!("{:#}", error).contains("Failed to parse config file"));
    }
}
