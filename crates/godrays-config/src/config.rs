//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the config file inside the config directory.
const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Light-shaft effect parameters.
    pub effect: EffectConfig,
    /// Render target settings.
    pub render: RenderConfig,
    /// Offline output settings for the demo host.
    pub output: OutputConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Construction parameters of the light-shaft effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EffectConfig {
    /// Minimum luminance that survives the bright pass.
    pub threshold: f32,
    /// Scales the length of the march toward the light.
    pub medium_density: f32,
    /// Per-step attenuation factor, usually slightly below 1.0.
    pub medium_decay: f32,
    /// Weight applied to every accumulated sample.
    pub medium_weight: f32,
    /// Final intensity multiplier (>= 0).
    pub exposure: f32,
    /// Number of samples marched per pixel (0..=1000).
    pub sample_count: i32,
    /// Index of the scene light the shafts emanate from.
    pub light_index: u32,
}

/// Pixel format of the color targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColorFormat {
    /// 8-bit normalized RGBA.
    Rgba8Unorm,
    /// 16-bit float RGBA (HDR).
    Rgba16Float,
}

/// Render target configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Source/destination width in pixels.
    pub width: u32,
    /// Source/destination height in pixels.
    pub height: u32,
    /// Format of the source color buffer.
    pub color_format: ColorFormat,
    /// Format of the destination target.
    pub output_format: ColorFormat,
    /// Depth buffer uses reverse-Z (near = 1.0, far = 0.0).
    pub reverse_z: bool,
}

/// Offline rendering output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// PNG file the composited frame is written to.
    pub path: PathBuf,
    /// Number of frames rendered before the readback.
    pub frames: u32,
    /// Sample count applied after the first frame, if any.
    pub sample_count_edit: Option<i32>,
    /// Also write a CPU reference image next to `path`.
    pub write_reference: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Directory for JSON log files; file logging is disabled when unset.
    pub log_dir: Option<PathBuf>,
}

// --- Default implementations ---

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            medium_density: 0.5,
            medium_decay: 0.95,
            medium_weight: 0.4,
            exposure: 1.0,
            sample_count: 64,
            light_index: 0,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            color_format: ColorFormat::Rgba16Float,
            output_format: ColorFormat::Rgba16Float,
            reverse_z: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("godrays.png"),
            frames: 3,
            sample_count_edit: None,
            write_reference: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// Platform config directory for the demo (`<config_dir>/godrays`).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("godrays")
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).map_err(ConfigError::read(&config_path))?;
            let config: Config =
                ron::from_str(&contents).map_err(ConfigError::parse(&config_path))?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::write(config_dir))?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::write(&config_path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("width: 1920"));
        assert!(ron_str.contains("sample_count: 64"));
        assert!(ron_str.contains("Rgba16Float"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.output.sample_count_edit = Some(128);
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_effect_defaults_match_reference_scene() {
        let effect = EffectConfig::default();
        assert_eq!(effect.threshold, 1.0);
        assert_eq!(effect.medium_density, 0.5);
        assert_eq!(effect.medium_decay, 0.95);
        assert_eq!(effect.medium_weight, 0.4);
        assert_eq!(effect.exposure, 1.0);
        assert_eq!(effect.sample_count, 64);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(effect: (exposure: 2.0))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.effect.exposure, 2.0);
        assert_eq!(config.effect.sample_count, 64);
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let ron_str = "(future_setting: true)";
        let result: Result<Config, _> = ron::from_str(ron_str);
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.render.width = 800;
        config.render.height = 600;
        config.effect.light_index = 2;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{{not valid}}").unwrap();

        match Config::load_or_create(dir.path()) {
            Err(err @ ConfigError::Parse { .. }) => {
                assert!(err.to_string().contains(CONFIG_FILE), "{err}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_config_dir_ends_with_app_name() {
        assert!(default_config_dir().ends_with("godrays"));
    }
}
