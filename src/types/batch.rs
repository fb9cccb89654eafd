//! Fermentation batch identity, profile and lifecycle status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one fermentation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub u64);

impl BatchId {
    /// Big-endian key bytes, used as the storage prefix for everything the batch owns.
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Primary fermentation in progress
    Active,
    /// Diacetyl rest underway
    Resting,
    /// Finished; readings are still stored but never alerted on
    Done,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::Resting => "resting",
            BatchStatus::Done => "done",
        }
    }

    /// Whether readings for a batch in this status go through alert evaluation.
    pub fn evaluates_alerts(self) -> bool {
        !matches!(self, BatchStatus::Done)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered fermentation run.
///
/// `og` and `fg_target` never change once the batch exists: every stored
/// reading carries an attenuation derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub name: String,
    /// Yeast/style profile, selects the attenuation threshold (e.g. "ale")
    pub yeast_profile: String,
    /// Original gravity (SG)
    pub og: f64,
    /// Target final gravity (SG)
    pub fg_target: f64,
    /// Diacetyl rest temperature (°C)
    pub temp_target: f64,
    pub status: BatchStatus,
    pub started_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Registration request for a new batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBatch {
    pub name: String,
    pub yeast_profile: String,
    pub og: f64,
    pub fg_target: f64,
    pub temp_target: f64,
    /// Defaults to the registration time
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl NewBatch {
    /// Profile name as stored: trimmed and lowercase.
    pub fn normalized_profile(&self) -> String {
        self.yeast_profile.trim().to_ascii_lowercase()
    }
}
