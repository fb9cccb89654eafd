//! Monitor Configuration - every analysis threshold as an operator-tunable TOML value
//!
//! Each struct implements `Default` with the values from `defaults.rs`, so a
//! missing file or section behaves exactly like the built-in constants.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "FERMENT_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "monitor.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a monitor deployment.
///
/// Load with `MonitorConfig::load()` which searches:
/// 1. `$FERMENT_CONFIG`
/// 2. `./monitor.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Trigger windows, thresholds and alert gating
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Attenuation thresholds per yeast profile
    #[serde(default)]
    pub profiles: ProfileConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl MonitorConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded monitor config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded monitor config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `FERMENT_SERVER_ADDR`
    /// and `FERMENT_DATA_DIR` on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.is_empty() {
                self.telegram.bot_token = Some(token);
            }
        }
        if let Ok(chat) = std::env::var("TELEGRAM_CHAT_ID") {
            if !chat.is_empty() {
                self.telegram.chat_id = Some(chat);
            }
        }
        if let Ok(secret) = std::env::var("TELEGRAM_WEBHOOK_SECRET") {
            if !secret.is_empty() {
                self.telegram.webhook_secret = Some(secret);
            }
        }
        if let Ok(addr) = std::env::var("FERMENT_SERVER_ADDR") {
            if !addr.is_empty() {
                self.server.addr = addr;
            }
        }
        if let Ok(dir) = std::env::var("FERMENT_DATA_DIR") {
            if !dir.is_empty() {
                self.storage.data_dir = PathBuf::from(dir);
            }
        }
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate every section, collecting all problems before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.analysis;
        let mut errors: Vec<String> = Vec::new();

        Self::check_window(
            a.gravity_stability_hours,
            a.gravity_stability_min_span_hours,
            "analysis.gravity_stability",
            &mut errors,
        );
        Self::check_window(
            a.temp_descent_hours,
            a.temp_descent_min_span_hours,
            "analysis.temp_descent",
            &mut errors,
        );
        Self::check_window(
            a.forecast_window_hours,
            a.forecast_min_span_hours,
            "analysis.forecast",
            &mut errors,
        );

        if !(a.gravity_stability_points > 0.0) {
            errors.push(format!(
                "analysis.gravity_stability_points must be > 0, got {}",
                a.gravity_stability_points
            ));
        }
        if !(a.temp_descent_threshold_c > 0.0) {
            errors.push(format!(
                "analysis.temp_descent_threshold_c must be > 0, got {}",
                a.temp_descent_threshold_c
            ));
        }
        if a.forecast_min_readings < 3 {
            errors.push(format!(
                "analysis.forecast_min_readings must be >= 3, got {}",
                a.forecast_min_readings
            ));
        }
        if let Some(h) = a.forecast_alert_horizon_hours {
            if !(h > 0.0) {
                errors.push(format!("analysis.forecast_alert_horizon_hours must be > 0, got {h}"));
            }
        }
        if !(a.cooldown_hours > 0.0) {
            errors.push(format!("analysis.cooldown_hours must be > 0, got {}", a.cooldown_hours));
        }
        if a.notify_timeout_secs == 0 {
            errors.push("analysis.notify_timeout_secs must be > 0".to_string());
        }

        Self::check_fraction(
            self.profiles.default_attenuation_threshold,
            "profiles.default_attenuation_threshold",
            &mut errors,
        );
        for (name, threshold) in &self.profiles.thresholds {
            Self::check_fraction(*threshold, &format!("profiles.thresholds.{name}"), &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_window(window: f64, min_span: f64, name: &str, errors: &mut Vec<String>) {
        if !(window > 0.0) {
            errors.push(format!("{name}: window must be > 0 hours, got {window}"));
        }
        if !(min_span >= 0.0) || min_span > window {
            errors.push(format!(
                "{name}: min span ({min_span}h) must be within 0..={window}h"
            ));
        }
    }

    fn check_fraction(value: f64, name: &str, errors: &mut Vec<String>) {
        if !(value > 0.0 && value <= 1.0) {
            errors.push(format!("{name} must be in (0, 1], got {value}"));
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),
    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

/// Convert fractional hours to a chrono duration (millisecond resolution).
///
/// Saturates at `Duration::MAX` instead of panicking on huge inputs.
pub fn hours(h: f64) -> Duration {
    Duration::try_milliseconds((h * 3_600_000.0).round() as i64).unwrap_or(Duration::MAX)
}

// ============================================================================
// Server / Storage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// Allowed cross-origin dashboard origins; empty means same-origin only
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_server_addr() -> String { defaults::SERVER_ADDR.to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the sled database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf { PathBuf::from(defaults::DATA_DIR) }

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(defaults::DB_DIR_NAME)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Trigger, forecast and alert-gating parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Trailing window for the gravity stability check (hours)
    #[serde(default = "default_gravity_stability_hours")]
    pub gravity_stability_hours: f64,

    /// Minimum time the stability readings must cover (hours)
    #[serde(default = "default_gravity_stability_min_span_hours")]
    pub gravity_stability_min_span_hours: f64,

    /// Stable when max - min gravity is below this many points (0.001 SG each)
    #[serde(default = "default_gravity_stability_points")]
    pub gravity_stability_points: f64,

    /// Trailing window for the temperature descent check (hours)
    #[serde(default = "default_temp_descent_hours")]
    pub temp_descent_hours: f64,

    /// Minimum time the descent readings must cover (hours)
    #[serde(default = "default_temp_descent_min_span_hours")]
    pub temp_descent_min_span_hours: f64,

    /// Descending when first - last temperature exceeds this (°C)
    #[serde(default = "default_temp_descent_threshold_c")]
    pub temp_descent_threshold_c: f64,

    /// Trailing window for the gravity trend fit (hours)
    #[serde(default = "default_forecast_window_hours")]
    pub forecast_window_hours: f64,

    #[serde(default = "default_forecast_min_readings")]
    pub forecast_min_readings: usize,

    #[serde(default = "default_forecast_min_span_hours")]
    pub forecast_min_span_hours: f64,

    /// Only alert on forecasts reaching the target within this many hours.
    /// Unset: alert whenever a projection exists.
    #[serde(default)]
    pub forecast_alert_horizon_hours: Option<f64>,

    /// Dedup window against alert history when arming state is unknown (hours)
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: f64,

    /// Upper bound for one notifier call (seconds)
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,

    /// Move an active batch to `resting` once the attenuation alert is delivered
    #[serde(default = "default_auto_resting")]
    pub auto_resting: bool,
}

fn default_gravity_stability_hours() -> f64 { defaults::GRAVITY_STABILITY_HOURS }
fn default_gravity_stability_min_span_hours() -> f64 { defaults::GRAVITY_STABILITY_MIN_SPAN_HOURS }
fn default_gravity_stability_points() -> f64 { defaults::GRAVITY_STABILITY_POINTS }
fn default_temp_descent_hours() -> f64 { defaults::TEMP_DESCENT_HOURS }
fn default_temp_descent_min_span_hours() -> f64 { defaults::TEMP_DESCENT_MIN_SPAN_HOURS }
fn default_temp_descent_threshold_c() -> f64 { defaults::TEMP_DESCENT_THRESHOLD_C }
fn default_forecast_window_hours() -> f64 { defaults::FORECAST_WINDOW_HOURS }
fn default_forecast_min_readings() -> usize { defaults::FORECAST_MIN_READINGS }
fn default_forecast_min_span_hours() -> f64 { defaults::FORECAST_MIN_SPAN_HOURS }
fn default_cooldown_hours() -> f64 { defaults::ALERT_COOLDOWN_HOURS }
fn default_notify_timeout_secs() -> u64 { defaults::NOTIFY_TIMEOUT_SECS }
fn default_auto_resting() -> bool { true }

impl AnalysisConfig {
    /// The longest trailing window any evaluator needs.
    pub fn lookback(&self) -> Duration {
        hours(
            self.gravity_stability_hours
                .max(self.temp_descent_hours)
                .max(self.forecast_window_hours),
        )
    }

    pub fn cooldown(&self) -> Duration {
        hours(self.cooldown_hours)
    }

    pub fn notify_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.notify_timeout_secs)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            gravity_stability_hours: default_gravity_stability_hours(),
            gravity_stability_min_span_hours: default_gravity_stability_min_span_hours(),
            gravity_stability_points: default_gravity_stability_points(),
            temp_descent_hours: default_temp_descent_hours(),
            temp_descent_min_span_hours: default_temp_descent_min_span_hours(),
            temp_descent_threshold_c: default_temp_descent_threshold_c(),
            forecast_window_hours: default_forecast_window_hours(),
            forecast_min_readings: default_forecast_min_readings(),
            forecast_min_span_hours: default_forecast_min_span_hours(),
            forecast_alert_horizon_hours: None,
            cooldown_hours: default_cooldown_hours(),
            notify_timeout_secs: default_notify_timeout_secs(),
            auto_resting: default_auto_resting(),
        }
    }
}

// ============================================================================
// Yeast Profiles
// ============================================================================

/// Attenuation threshold table keyed by lowercase profile name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Used when a stored batch names a profile no longer in the table
    #[serde(default = "default_attenuation_threshold")]
    pub default_attenuation_threshold: f64,

    #[serde(default = "default_profile_thresholds")]
    pub thresholds: BTreeMap<String, f64>,
}

fn default_attenuation_threshold() -> f64 { defaults::DEFAULT_ATTENUATION_THRESHOLD }

fn default_profile_thresholds() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("ale".to_string(), 0.80),
        ("lager".to_string(), 0.75),
        ("saison".to_string(), 0.85),
    ])
}

impl ProfileConfig {
    pub fn is_known(&self, profile: &str) -> bool {
        self.thresholds.contains_key(&profile.trim().to_ascii_lowercase())
    }

    /// Threshold for a profile, falling back to the default for unknown names.
    pub fn threshold_for(&self, profile: &str) -> f64 {
        match self.thresholds.get(&profile.trim().to_ascii_lowercase()) {
            Some(t) => *t,
            None => {
                warn!(profile = %profile, "Unknown yeast profile, using default attenuation threshold");
                self.default_attenuation_threshold
            }
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            default_attenuation_threshold: default_attenuation_threshold(),
            thresholds: default_profile_thresholds(),
        }
    }
}

// ============================================================================
// Telegram
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default)]
    pub chat_id: Option<String>,

    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Expected `X-Telegram-Bot-Api-Secret-Token` on bot webhook calls
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

fn default_telegram_api_base() -> String { defaults::TELEGRAM_API_BASE.to_string() }

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        self.bot_token.as_deref().is_some_and(|t| !t.is_empty())
            && self.chat_id.as_deref().is_some_and(|c| !c.is_empty())
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: default_telegram_api_base(),
            webhook_secret: None,
        }
    }
}
