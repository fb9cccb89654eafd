//! Trigger evidence and the alert audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::batch::BatchId;

/// The conditions the engine can notify about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    AttenuationReached,
    GravityStable,
    TemperatureDescending,
    ForecastReady,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 4] = [
        TriggerKind::AttenuationReached,
        TriggerKind::GravityStable,
        TriggerKind::TemperatureDescending,
        TriggerKind::ForecastReady,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKind::AttenuationReached => "attenuation_reached",
            TriggerKind::GravityStable => "gravity_stable",
            TriggerKind::TemperatureDescending => "temperature_descending",
            TriggerKind::ForecastReady => "forecast_ready",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric evidence behind a triggered condition.
///
/// Ephemeral during evaluation; persisted only as part of an [`AlertRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerResult {
    AttenuationReached {
        /// Current attenuation (0..=1)
        attenuation: f64,
        /// Attenuation of the reading before (0..=1)
        previous_attenuation: f64,
        /// Profile threshold (0..=1)
        threshold: f64,
    },
    GravityStable {
        /// max - min gravity over the window, in points (0.001 SG)
        range_points: f64,
        threshold_points: f64,
        window_hours: f64,
        /// Time covered by the readings actually present
        span_hours: f64,
    },
    TemperatureDescending {
        first_temperature: f64,
        last_temperature: f64,
        /// first - last (°C)
        descent: f64,
        threshold: f64,
        window_hours: f64,
    },
    ForecastReady {
        hours_to_target: f64,
        /// Fitted gravity change per hour (negative while fermenting)
        slope_per_hour: f64,
        /// Fitted gravity at the latest reading
        fitted_gravity: f64,
        target_gravity: f64,
        eta: DateTime<Utc>,
    },
}

impl TriggerResult {
    pub fn kind(&self) -> TriggerKind {
        match self {
            TriggerResult::AttenuationReached { .. } => TriggerKind::AttenuationReached,
            TriggerResult::GravityStable { .. } => TriggerKind::GravityStable,
            TriggerResult::TemperatureDescending { .. } => TriggerKind::TemperatureDescending,
            TriggerResult::ForecastReady { .. } => TriggerKind::ForecastReady,
        }
    }
}

/// Identifier of a persisted alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub u64);

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An alert approved by the engine and about to be handed to the notifier.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAlert {
    pub batch_id: BatchId,
    pub message: String,
    pub evidence: TriggerResult,
    /// Name of the channel that confirmed delivery
    pub channel: String,
}

impl PendingAlert {
    pub fn kind(&self) -> TriggerKind {
        self.evidence.kind()
    }
}

/// Evidence that a (batch, kind) pair produced a delivered notification.
///
/// Never deleted; only `acknowledged` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: AlertId,
    pub batch_id: BatchId,
    pub kind: TriggerKind,
    pub message: String,
    pub evidence: TriggerResult,
    pub channel: String,
    /// Delivery time on the sensor timeline (timestamp of the reading that
    /// produced the alert); cooldown windows are measured against this.
    pub sent_at: DateTime<Utc>,
    /// Wall-clock time the record was written
    pub recorded_at: DateTime<Utc>,
    pub acknowledged: bool,
}

impl AlertRecord {
    pub fn from_pending(id: AlertId, pending: PendingAlert, sent_at: DateTime<Utc>) -> Self {
        Self {
            id,
            batch_id: pending.batch_id,
            kind: pending.kind(),
            message: pending.message,
            evidence: pending.evidence,
            channel: pending.channel,
            sent_at,
            recorded_at: Utc::now(),
            acknowledged: false,
        }
    }
}
