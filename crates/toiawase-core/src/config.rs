//! Configuration for the toiawase pipeline.
//!
//! A single TOML file at the XDG config path, with defaults for every
//! field and a small set of environment overrides for the knobs that
//! change between runs.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// Loaded from `~/.config/toiawase/config.toml` (or the platform
/// equivalent). A missing file yields the defaults; a missing key inside
/// the file yields that key's default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Pipeline run behavior
    pub run: RunConfig,
    /// OCR collaborator settings
    pub ocr: OcrConfig,
    /// Keyword table overrides
    pub keywords: KeywordConfig,
}

impl AppConfig {
    /// Load the configuration file, or the defaults when it is absent.
    ///
    /// # Errors
    /// Fails when the config directory cannot be resolved, the file
    /// cannot be read, or its contents are not valid TOML.
    pub fn load() -> ConfigResult<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            tracing::debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        tracing::debug!("loading config from {}", path.display());
        let raw = fs::read_to_string(&path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load the configuration and apply environment overrides.
    ///
    /// Recognized variables: `TOIAWASE_HEADLESS`, `TOIAWASE_ATTENDED`,
    /// and `TOIAWASE_NAV_TIMEOUT_SECS`. Unparseable values are ignored.
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        apply_env(&mut config);
        Ok(config)
    }

    /// Write the configuration back to its XDG path, creating the
    /// directory when needed.
    pub fn save(&self) -> ConfigResult<()> {
        let path = Self::config_path()?;
        let dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;
        fs::create_dir_all(dir)?;

        let rendered = toml::to_string_pretty(self)?;
        fs::write(&path, rendered)?;
        tracing::debug!("saved config to {}", path.display());
        Ok(())
    }

    /// Path of the configuration file (`~/.config/toiawase/config.toml`).
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Data directory for run logs and reports (`~/.local/share/toiawase`).
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    fn project_dirs() -> ConfigResult<ProjectDirs> {
        ProjectDirs::from("jp", "toiawase", "toiawase").ok_or(ConfigError::NoConfigDir)
    }
}

fn apply_env(config: &mut AppConfig) {
    if let Some(headless) = env_parse("TOIAWASE_HEADLESS") {
        tracing::debug!("env override browser.headless={}", headless);
        config.browser.headless = headless;
    }
    if let Some(attended) = env_parse("TOIAWASE_ATTENDED") {
        tracing::debug!("env override run.attended={}", attended);
        config.run.attended = attended;
    }
    if let Some(secs) = env_parse("TOIAWASE_NAV_TIMEOUT_SECS") {
        tracing::debug!("env override browser.navigation_timeout_secs={}", secs);
        config.browser.navigation_timeout_secs = secs;
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1366,
            window_height: 900,
            navigation_timeout_secs: 15,
        }
    }
}

/// Pipeline run behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Settle delay after each navigation, in milliseconds
    pub settle_delay_ms: u64,
    /// Total time to poll for async submission evidence, in seconds
    pub evidence_poll_timeout_secs: u64,
    /// Interval between evidence polls, in milliseconds
    pub evidence_poll_interval_ms: u64,
    /// Attended mode: pause on interactive challenges for manual resolution
    pub attended: bool,
    /// Maximum contact link candidates tried per traversal tier
    pub candidate_cap: usize,
    /// Neutral placeholder written by the fallback fill pass
    pub fallback_placeholder: String,
    /// Directory for run reports; defaults to the XDG data dir when unset
    pub report_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1000,
            evidence_poll_timeout_secs: 25,
            evidence_poll_interval_ms: 1000,
            attended: false,
            candidate_cap: 10,
            fallback_placeholder: "-".to_string(),
            report_dir: None,
        }
    }
}

/// OCR collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Whether image CAPTCHA recognition is attempted at all
    pub enabled: bool,
    /// HTTP endpoint of the recognition service
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:8899/recognize".to_string(),
            timeout_secs: 20,
        }
    }
}

/// Keyword table overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Path to a TOML keyword table replacing the built-in one
    pub table_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.browser.headless);
        assert_eq!(config.browser.navigation_timeout_secs, 15);
        assert_eq!(config.run.settle_delay_ms, 1000);
        assert_eq!(config.run.candidate_cap, 10);
        assert!(!config.run.attended);
        assert!(!config.ocr.enabled);
        assert!(config.keywords.table_path.is_none());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = AppConfig::default();
        let rendered = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(rendered.contains("[browser]"));
        assert!(rendered.contains("[run]"));
        assert!(rendered.contains("[ocr]"));

        let parsed: AppConfig = toml::from_str(&rendered).expect("parse serialized config");
        assert_eq!(parsed.browser.window_width, config.browser.window_width);
        assert_eq!(parsed.run.fallback_placeholder, config.run.fallback_placeholder);
    }

    #[test]
    fn test_config_survives_disk_round_trip() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.browser.headless = false;
        config.run.attended = true;
        fs::write(&path, toml::to_string_pretty(&config).expect("serialize config"))
            .expect("write config file");

        let raw = fs::read_to_string(&path).expect("read config file");
        let loaded: AppConfig = toml::from_str(&raw).expect("parse loaded config");
        assert!(!loaded.browser.headless);
        assert!(loaded.run.attended);
    }

    #[test]
    fn test_env_overrides_applied() {
        // apply_env reads the process environment, so this test owns the
        // TOIAWASE_NAV_TIMEOUT_SECS variable
        std::env::set_var("TOIAWASE_NAV_TIMEOUT_SECS", "30");
        let mut config = AppConfig::default();
        apply_env(&mut config);
        std::env::remove_var("TOIAWASE_NAV_TIMEOUT_SECS");

        assert_eq!(config.browser.navigation_timeout_secs, 30);
    }

    #[test]
    fn test_env_override_ignores_garbage() {
        std::env::set_var("TOIAWASE_HEADLESS", "sideways");
        let mut config = AppConfig::default();
        apply_env(&mut config);
        std::env::remove_var("TOIAWASE_HEADLESS");

        assert!(config.browser.headless);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let raw = r#"
[browser]
headless = false

[run]
attended = true
candidate_cap = 3
"#;

        let config: AppConfig = toml::from_str(raw).expect("parse partial config");
        assert!(!config.browser.headless);
        assert!(config.run.attended);
        assert_eq!(config.run.candidate_cap, 3);
        assert_eq!(config.run.settle_delay_ms, 1000);
        assert_eq!(config.browser.navigation_timeout_secs, 15);
    }
}
