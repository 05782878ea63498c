//! TOML configuration for every citywatch process.
//!
//! Layered: the file named by `CITYWATCH_CONFIG`, then `./citywatch.toml`,
//! then compiled-in defaults. Credentials are never read from the file; see
//! [`Credentials`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::detect::classifier::{DEFAULT_HIGH_THRESHOLD, DEFAULT_MEDIUM_THRESHOLD};
use crate::detect::Thresholds;
use crate::notify::twilio::non_empty_env;
use crate::notify::TwilioCredentials;

const DEFAULT_CONFIG_FILE: &str = "citywatch.toml";

/// Upper bound for any cooldown, in seconds (one week).
pub const MAX_COOLDOWN_SECS: u64 = 7 * 24 * 60 * 60;
/// Upper bound for any lookback window, in minutes (one week).
pub const MAX_WINDOW_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid threat thresholds: need 0 <= medium ({medium}) < high ({high})")]
    Thresholds { medium: f64, high: f64 },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{field} = {value} is out of range, expected {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub threat: ThreatConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
    #[serde(default)]
    pub insights: InsightsConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration: an explicit path must load; otherwise try
    /// `CITYWATCH_CONFIG`, then `./citywatch.toml`, then defaults.
    /// `CITYWATCH_DB` overrides the database path in every case.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::load_or_default(),
        };
        if let Some(db) = non_empty_env("CITYWATCH_DB") {
            config.store.db_path = db;
        }
        Ok(config)
    }

    fn load_or_default() -> Self {
        // 1. Environment variable override.
        if let Some(env_path) = non_empty_env("CITYWATCH_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "CITYWATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        // 2. Working directory.
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        // 3. Defaults.
        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.threat;
        if !(t.medium_threshold >= 0.0 && t.medium_threshold < t.high_threshold) {
            return Err(ConfigError::Thresholds {
                medium: t.medium_threshold,
                high: t.high_threshold,
            });
        }
        let non_zero = [
            (t.poll_interval_secs, "threat.poll_interval_secs"),
            (t.sample_window as u64, "threat.sample_window"),
            (self.sentiment.poll_interval_secs, "sentiment.poll_interval_secs"),
            (self.sentiment.batch_size as u64, "sentiment.batch_size"),
            (self.insights.interval_secs, "insights.interval_secs"),
            (self.camera.interval_secs, "camera.interval_secs"),
            (self.simulation.crowd_interval_secs, "simulation.crowd_interval_secs"),
            (self.simulation.social_interval_secs, "simulation.social_interval_secs"),
        ];
        for (value, name) in non_zero {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }

        let cooldowns = [
            (t.cooldown_secs, "threat.cooldown_secs"),
            (self.camera.cooldown_secs, "camera.cooldown_secs"),
        ];
        for (value, field) in cooldowns {
            if value > MAX_COOLDOWN_SECS {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: i64::try_from(value).unwrap_or(i64::MAX),
                    min: 0,
                    max: MAX_COOLDOWN_SECS as i64,
                });
            }
        }

        let windows = [
            (self.camera.active_alert_minutes, "camera.active_alert_minutes"),
            (self.insights.window_minutes, "insights.window_minutes"),
        ];
        for (value, field) in windows {
            if !(1..=MAX_WINDOW_MINUTES).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    min: 1,
                    max: MAX_WINDOW_MINUTES,
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database shared by all agents.
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "data/citywatch.db".to_string(),
        }
    }
}

/// Threat-detection loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatConfig {
    pub poll_interval_secs: u64,
    /// How many recent samples each tick reads.
    pub sample_window: usize,
    /// Minimum gap between two alerts for one location.
    pub cooldown_secs: u64,
    pub medium_threshold: f64,
    pub high_threshold: f64,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            sample_window: 20,
            cooldown_secs: 120,
            medium_threshold: DEFAULT_MEDIUM_THRESHOLD,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
        }
    }
}

impl ThreatConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            medium: self.medium_threshold,
            high: self.high_threshold,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Alert cooldown, capped at [`MAX_COOLDOWN_SECS`].
    pub fn cooldown(&self) -> TimeDelta {
        bounded_seconds(self.cooldown_secs)
    }
}

fn bounded_seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs.min(MAX_COOLDOWN_SECS))
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or_else(TimeDelta::zero)
}

fn bounded_minutes(minutes: i64) -> TimeDelta {
    TimeDelta::try_minutes(minutes.clamp(0, MAX_WINDOW_MINUTES)).unwrap_or_else(TimeDelta::zero)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    pub poll_interval_secs: u64,
    pub batch_size: usize,
    /// Pause between model calls inside one batch.
    pub request_delay_ms: u64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            batch_size: 5,
            request_delay_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    pub interval_secs: u64,
    pub crowd_limit: usize,
    pub sentiment_limit: usize,
    pub alert_limit: usize,
    /// Records older than this are left out of the prompt.
    pub window_minutes: i64,
}

impl InsightsConfig {
    pub fn window(&self) -> TimeDelta {
        bounded_minutes(self.window_minutes)
    }
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            interval_secs: 120,
            crowd_limit: 50,
            sentiment_limit: 50,
            alert_limit: 10,
            window_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub interval_secs: u64,
    /// Minimum gap between two generated images.
    pub cooldown_secs: u64,
    /// A HIGH alert younger than this drives the scene.
    pub active_alert_minutes: i64,
    /// Directory generated images are written to.
    pub media_dir: PathBuf,
    /// URL prefix under which `media_dir` is served.
    pub public_base_url: String,
}

impl CameraConfig {
    /// Minimum gap between two generated images.
    pub fn cooldown(&self) -> TimeDelta {
        bounded_seconds(self.cooldown_secs)
    }

    /// How long a HIGH alert keeps driving the scene.
    pub fn active_alert_window(&self) -> TimeDelta {
        bounded_minutes(self.active_alert_minutes)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            cooldown_secs: 60,
            active_alert_minutes: 5,
            media_dir: PathBuf::from("data/media"),
            public_base_url: "/media".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub crowd_interval_secs: u64,
    pub social_interval_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            crowd_interval_secs: 5,
            social_interval_secs: 7,
        }
    }
}

/// Generative Language API endpoint and models.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            text_model: "gemini-2.0-flash".to_string(),
            image_model: "imagen-3.0-generate-002".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twilio.com".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Secrets and phone numbers, taken from the environment only.
///
/// Every field is optional; a missing value disables the feature that needs
/// it.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub gemini_api_key: Option<String>,
    pub twilio: Option<TwilioCredentials>,
    pub sms_from: Option<String>,
    pub sms_to: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: non_empty_env("GEMINI_API_KEY"),
            twilio: TwilioCredentials::from_env(),
            sms_from: non_empty_env("TWILIO_PHONE_NUMBER"),
            sms_to: non_empty_env("RECIPIENT_PHONE_NUMBER"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.threat.cooldown_secs, 120);
        assert_eq!(cfg.threat.sample_window, 20);
        assert_eq!(cfg.threat.thresholds(), Thresholds::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let cfg = Config::from_toml(
            r#"
            [threat]
            cooldown_secs = 60
            high_threshold = 0.9

            [camera]
            media_dir = "/var/lib/citywatch/media"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.threat.cooldown_secs, 60);
        assert_eq!(cfg.threat.high_threshold, 0.9);
        assert_eq!(cfg.threat.medium_threshold, 0.6);
        assert_eq!(cfg.camera.media_dir, PathBuf::from("/var/lib/citywatch/media"));
        assert_eq!(cfg.sentiment.batch_size, 5);
        assert_eq!(cfg.llm.text_model, "gemini-2.0-flash");
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let cfg = Config::from_toml(include_str!("../citywatch.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(cfg.store.db_path, defaults.store.db_path);
        assert_eq!(cfg.threat.thresholds(), defaults.threat.thresholds());
        assert_eq!(cfg.camera.media_dir, defaults.camera.media_dir);
        assert_eq!(cfg.llm.image_model, defaults.llm.image_model);
        assert_eq!(cfg.api.bind, defaults.api.bind);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let err = Config::from_toml("[threat]\nmedium_threshold = 0.9\nhigh_threshold = 0.8\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Thresholds { .. }));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = Config::from_toml("[sentiment]\npoll_interval_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Zero("sentiment.poll_interval_secs")));
    }

    #[test]
    fn test_oversized_cooldown_rejected() {
        let err = Config::from_toml("[threat]\ncooldown_secs = 10000000000000000\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange { field: "threat.cooldown_secs", .. }
        ));

        let err = Config::from_toml("[camera]\ncooldown_secs = 99999999999\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange { field: "camera.cooldown_secs", .. }
        ));

        let ok = Config::from_toml(&format!("[threat]\ncooldown_secs = {}\n", MAX_COOLDOWN_SECS)).unwrap();
        assert_eq!(ok.threat.cooldown(), TimeDelta::try_seconds(MAX_COOLDOWN_SECS as i64).unwrap());
    }

    #[test]
    fn test_non_positive_windows_rejected() {
        let err = Config::from_toml("[camera]\nactive_alert_minutes = -5\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange { field: "camera.active_alert_minutes", value: -5, .. }
        ));

        let err = Config::from_toml("[insights]\nwindow_minutes = -1\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange { field: "insights.window_minutes", .. }
        ));

        let err = Config::from_toml("[insights]\nwindow_minutes = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn test_durations_are_bounded_without_validation() {
        let threat = ThreatConfig {
            cooldown_secs: u64::MAX,
            ..ThreatConfig::default()
        };
        assert_eq!(threat.cooldown(), TimeDelta::try_seconds(MAX_COOLDOWN_SECS as i64).unwrap());

        let camera = CameraConfig {
            active_alert_minutes: -5,
            ..CameraConfig::default()
        };
        assert_eq!(camera.active_alert_window(), TimeDelta::zero());
        assert_eq!(InsightsConfig::default().window(), TimeDelta::try_minutes(60).unwrap());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citywatch.toml");
        std::fs::write(&path, "[store]\ndb_path = \"/tmp/x.db\"\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.store.db_path, "/tmp/x.db");

        let missing = dir.path().join("nope.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Read { .. })));
    }
}
