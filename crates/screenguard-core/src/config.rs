//! Configuration management for ScreenGuard.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. The `[settings]` table mirrors the
//! record the extension storage hands the core at startup.

use crate::error::{ConfigError, ConfigResult};
use crate::types::PiiType;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/screenguard/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Text scanning and overlay geometry
    pub scanning: ScanningConfig,
    /// Image moderation thresholds
    pub images: ImageConfig,
    /// Mutation and viewport scheduling
    pub monitor: MonitorConfig,
    /// Classifier backend selection
    pub classifier: ClassifierConfig,
    /// User preferences from the settings collaborator
    pub settings: UserSettings,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SCREENGUARD_ENABLED`: Override whether scanning is enabled (true/false)
    /// - `SCREENGUARD_USE_AI`: Override whether the model classifier is used (true/false)
    /// - `SCREENGUARD_OLLAMA_URL`: Override the Ollama server URL
    /// - `SCREENGUARD_MODEL`: Override the model name
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        Ok(config)
    }

    /// Apply `SCREENGUARD_*` environment overrides in place.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("SCREENGUARD_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.settings.enabled = enabled;
                tracing::debug!("Override settings.enabled from env: {}", enabled);
            }
        }

        if let Ok(val) = std::env::var("SCREENGUARD_USE_AI") {
            if let Ok(use_ai) = val.parse() {
                self.classifier.use_ai = use_ai;
                tracing::debug!("Override classifier.use_ai from env: {}", use_ai);
            }
        }

        if let Ok(url) = std::env::var("SCREENGUARD_OLLAMA_URL") {
            tracing::debug!("Override classifier.ollama_url from env: {}", url);
            self.classifier.ollama_url = url;
        }

        if let Ok(model) = std::env::var("SCREENGUARD_MODEL") {
            tracing::debug!("Override classifier.model from env: {}", model);
            self.classifier.model = model;
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.images.confidence_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "images.confidence_threshold".to_string(),
                reason: "must be within [0, 1]".to_string(),
            });
        }
        if self.scanning.min_text_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.min_text_length".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.monitor.frame_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.frame_interval_ms".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/screenguard/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "screenguard", "screenguard")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Text scanning and overlay geometry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Minimum trimmed text length (chars) for a unit to be scanned
    pub min_text_length: usize,
    /// Parent tags whose text is never scanned
    pub excluded_tags: Vec<String>,
    /// Rects at or below this size (px) in either dimension are discarded
    pub min_rect_size: f64,
    /// Upper bound for a single classifier call
    pub classify_timeout_ms: u64,
    /// How long a clicked overlay stays revealed
    pub reveal_duration_ms: u64,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            min_text_length: 5,
            excluded_tags: ["script", "style", "noscript", "iframe"]
                .into_iter()
                .map(String::from)
                .collect(),
            min_rect_size: 0.5,
            classify_timeout_ms: 15_000,
            reveal_duration_ms: 3_000,
        }
    }
}

/// Image moderation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Payloads smaller than this are skipped (icons, tracking pixels)
    pub min_image_bytes: usize,
    /// Both box dimensions must exceed this (px) for an image to be scanned
    pub min_visible_size: f64,
    /// Minimum classifier confidence to mask an unsafe image
    pub confidence_threshold: f32,
    /// URL extensions that are never fetched
    pub skip_extensions: Vec<String>,
    /// Timeout for fetching image bytes
    pub fetch_timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            min_image_bytes: 1500,
            min_visible_size: 40.0,
            confidence_threshold: 0.80,
            skip_extensions: vec!["svg".to_string(), "ico".to_string()],
            fetch_timeout_secs: 10,
        }
    }
}

/// Mutation and viewport scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Debounce window for content mutations
    pub rescan_delay_ms: u64,
    /// Minimum spacing between reposition passes (one animation frame)
    pub frame_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rescan_delay_ms: 2000,
            frame_interval_ms: 16,
        }
    }
}

/// Classifier backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Whether the model-backed classifier is used at all
    pub use_ai: bool,
    /// Provider name: `ollama` or `none`
    pub provider: String,
    /// Ollama server URL
    pub ollama_url: String,
    /// Model used for text and image prompts
    pub model: String,
    /// Only download/activate the model after a user gesture
    pub require_user_activation: bool,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            use_ai: true,
            provider: "ollama".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama3.2-vision".to_string(),
            require_user_activation: false,
            temperature: 0.0,
        }
    }
}

/// User preferences read from the settings collaborator.
///
/// Any subset of keys may be absent. Missing filters count as enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Whether scanning is enabled
    pub enabled: bool,
    /// Per-type filter switches
    pub filters: BTreeMap<PiiType, bool>,
    /// Whether images are moderated
    #[serde(alias = "imageModeration")]
    pub image_moderation: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            filters: PiiType::ALL.iter().map(|t| (*t, true)).collect(),
            image_moderation: true,
        }
    }
}

impl UserSettings {
    /// Whether findings of `kind` should be masked.
    #[must_use]
    pub fn is_filter_enabled(&self, kind: PiiType) -> bool {
        self.filters.get(&kind).copied().unwrap_or(true)
    }

    /// Set the filter switch for `kind`.
    pub fn set_filter(&mut self, kind: PiiType, enabled: bool) {
        self.filters.insert(kind, enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scanning.min_text_length, 5);
        assert_eq!(config.scanning.excluded_tags.len(), 4);
        assert_eq!(config.images.min_image_bytes, 1500);
        assert!((config.images.confidence_threshold - 0.80).abs() < f32::EPSILON);
        assert_eq!(config.monitor.rescan_delay_ms, 2000);
        assert!(config.settings.enabled);
        assert!(config.settings.image_moderation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[scanning]"));
        assert!(toml_str.contains("[images]"));
        assert!(toml_str.contains("[settings.filters]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.classifier.model, config.classifier.model);
        assert_eq!(parsed.settings, config.settings);
    }

    #[test]
    fn test_config_load_from_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.monitor.rescan_delay_ms = 750;
        config.settings.set_filter(PiiType::Ssn, false);

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config");
        let loaded = AppConfig::load_from(&config_path).expect("load config");

        assert_eq!(loaded.monitor.rescan_delay_ms, 750);
        assert!(!loaded.settings.is_filter_enabled(PiiType::Ssn));
        assert!(loaded.settings.is_filter_enabled(PiiType::Email));
    }

    #[test]
    fn test_load_from_missing_path() {
        let tmp = TempDir::new().expect("create temp dir");
        let result = AppConfig::load_from(&tmp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[scanning]
min_text_length = 8

[settings]
enabled = false
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.scanning.min_text_length, 8);
        assert!(!config.settings.enabled);
        // These should be defaults
        assert_eq!(config.scanning.excluded_tags.len(), 4);
        assert!(config.settings.image_moderation);
        assert!(config.settings.is_filter_enabled(PiiType::ApiKey));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = AppConfig::default();
        config.images.confidence_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_settings_from_extension_storage_json() {
        // Storage may hold only some keys, in camelCase
        let json = r#"{"filters": {"ssn": false}, "imageModeration": false}"#;
        let settings: UserSettings = serde_json::from_str(json).expect("parse settings");
        assert!(settings.enabled);
        assert!(!settings.image_moderation);
        assert!(!settings.is_filter_enabled(PiiType::Ssn));
        // Types absent from the stored map stay enabled
        assert!(settings.is_filter_enabled(PiiType::Email));
    }

    #[test]
    fn test_settings_empty_object() {
        let settings: UserSettings = serde_json::from_str("{}").expect("parse settings");
        assert_eq!(settings, UserSettings::default());
    }
}
