//! Hydrometer samples and stored readings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::batch::BatchId;
use crate::config::defaults::{
    BATTERY_MAX_PERCENT, GRAVITY_MAX_SG, GRAVITY_MIN_SG, TEMPERATURE_MAX_C, TEMPERATURE_MIN_C,
};
use crate::error::EngineError;

/// One raw sample as reported by the sensor, before it is bound to a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Caller-supplied sample time
    pub timestamp: DateTime<Utc>,
    /// Specific gravity
    pub gravity: f64,
    /// Temperature (°C)
    pub temperature: f64,
    /// Battery charge (%)
    pub battery: f64,
}

impl SensorSample {
    /// Reject physically impossible values before anything is stored.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.gravity.is_finite() || !(GRAVITY_MIN_SG..=GRAVITY_MAX_SG).contains(&self.gravity) {
            return Err(EngineError::InvalidReading(format!(
                "gravity {} outside {GRAVITY_MIN_SG:.3}..={GRAVITY_MAX_SG:.3}",
                self.gravity
            )));
        }
        if !self.temperature.is_finite()
            || !(TEMPERATURE_MIN_C..=TEMPERATURE_MAX_C).contains(&self.temperature)
        {
            return Err(EngineError::InvalidReading(format!(
                "temperature {}°C outside {TEMPERATURE_MIN_C}..={TEMPERATURE_MAX_C}°C",
                self.temperature
            )));
        }
        if !self.battery.is_finite() || !(0.0..=BATTERY_MAX_PERCENT).contains(&self.battery) {
            return Err(EngineError::InvalidReading(format!(
                "battery {}% outside 0..={BATTERY_MAX_PERCENT}%",
                self.battery
            )));
        }
        Ok(())
    }
}

/// A stored reading. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub batch_id: BatchId,
    pub timestamp: DateTime<Utc>,
    pub gravity: f64,
    pub temperature: f64,
    pub battery: f64,
    /// Apparent attenuation (0..=1) computed at ingestion
    pub attenuation: f64,
}

impl Reading {
    pub fn from_sample(batch_id: BatchId, sample: &SensorSample, attenuation: f64) -> Self {
        Self {
            batch_id,
            timestamp: sample.timestamp,
            gravity: sample.gravity,
            temperature: sample.temperature,
            battery: sample.battery,
            attenuation,
        }
    }
}

/// Payload pushed by the device poller to the ingest endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReading {
    pub timestamp: DateTime<Utc>,
    pub gravity: f64,
    pub temperature: f64,
    pub battery: f64,
    #[serde(default)]
    pub device_id: Option<String>,
}

impl DeviceReading {
    pub fn sample(&self) -> SensorSample {
        SensorSample {
            timestamp: self.timestamp,
            gravity: self.gravity,
            temperature: self.temperature,
            battery: self.battery,
        }
    }
}
