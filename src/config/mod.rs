//! Monitor Configuration Module
//!
//! Per-deployment configuration loaded from TOML, covering every analysis
//! threshold, the storage location and the notification channel.
//!
//! ## Loading Order
//!
//! 1. `FERMENT_CONFIG` environment variable (path to TOML file)
//! 2. `monitor.toml` in the current working directory
//! 3. Built-in defaults (see `defaults.rs`)
//!
//! Environment overrides (`TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`,
//! `FERMENT_SERVER_ADDR`, `FERMENT_DATA_DIR`) are applied afterwards by
//! `MonitorConfig::apply_env_overrides`.

mod monitor_config;
pub mod defaults;
pub mod validation;

pub use monitor_config::*;
