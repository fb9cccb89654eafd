//! Alert Decision Engine
//!
//! Turns one incoming reading plus the stored history into a set of
//! delivered, deduplicated notifications.
//!
//! ## Cycle (`process_reading`)
//!
//! ```text
//! batch lookup → validate → attenuation → [per-batch lock]
//!   → append → assess (triggers + forecast) → arming table
//!   → alert history check → notify (concurrently) → record confirmed
//! ```
//!
//! ## Modules
//!
//! - `arming`: per-(batch, kind) Quiet / Firing / Alerted state
//! - `locks`: sharded per-batch mutex table
//! - `messages`: HTML message bodies

pub mod arming;
pub mod locks;
pub mod messages;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::analysis::{self, AnalysisReport};
use crate::config::{hours, AnalysisConfig, ProfileConfig};
use crate::config::defaults::GRAVITY_MIN_SG;
use crate::error::EngineError;
use crate::notify::{Notifier, NotifyError};
use crate::storage::{AlertHistory, BatchRepository, ReadingStore};
use crate::types::{
    AlertId, AlertRecord, Batch, BatchId, BatchStatus, NewBatch, PendingAlert, Reading,
    SensorSample, TriggerKind,
};

use self::arming::{Candidate, Episode};
use self::locks::BatchLocks;

pub struct AlertEngine {
    batches: Arc<dyn BatchRepository>,
    readings: Arc<dyn ReadingStore>,
    alerts: Arc<dyn AlertHistory>,
    notifier: Arc<dyn Notifier>,
    analysis: AnalysisConfig,
    profiles: ProfileConfig,
    locks: BatchLocks,
}

impl AlertEngine {
    pub fn new(
        batches: Arc<dyn BatchRepository>,
        readings: Arc<dyn ReadingStore>,
        alerts: Arc<dyn AlertHistory>,
        notifier: Arc<dyn Notifier>,
        analysis: AnalysisConfig,
        profiles: ProfileConfig,
    ) -> Self {
        Self {
            batches,
            readings,
            alerts,
            notifier,
            analysis,
            profiles,
            locks: BatchLocks::new(),
        }
    }

    /// Engine backed by one store implementing all three storage traits.
    pub fn with_store<S>(
        store: Arc<S>,
        notifier: Arc<dyn Notifier>,
        analysis: AnalysisConfig,
        profiles: ProfileConfig,
    ) -> Self
    where
        S: BatchRepository + ReadingStore + AlertHistory + 'static,
    {
        Self::new(store.clone(), store.clone(), store, notifier, analysis, profiles)
    }

    pub fn analysis_config(&self) -> &AnalysisConfig {
        &self.analysis
    }

    pub fn profiles(&self) -> &ProfileConfig {
        &self.profiles
    }

    pub fn channel_name(&self) -> &str {
        self.notifier.channel_name()
    }

    // ========================================================================
    // Batches
    // ========================================================================

    /// Register a fermentation run. New batches start `active`.
    pub fn register_batch(&self, new: NewBatch) -> Result<Batch, EngineError> {
        if !new.og.is_finite() || new.og <= GRAVITY_MIN_SG {
            return Err(EngineError::InvalidProfile(format!(
                "OG must be above {GRAVITY_MIN_SG:.3}, got {}",
                new.og
            )));
        }
        if !new.fg_target.is_finite() || new.fg_target < GRAVITY_MIN_SG || new.fg_target >= new.og {
            return Err(EngineError::InvalidProfile(format!(
                "target FG must be within {GRAVITY_MIN_SG:.3}..{:.3}, got {}",
                new.og, new.fg_target
            )));
        }
        if !new.temp_target.is_finite() {
            return Err(EngineError::InvalidProfile(
                "rest temperature must be a finite number".to_string(),
            ));
        }
        if new.name.trim().is_empty() {
            return Err(EngineError::InvalidProfile("batch name must not be empty".to_string()));
        }
        if !self.profiles.is_known(&new.yeast_profile) {
            let known: Vec<&str> = self.profiles.thresholds.keys().map(String::as_str).collect();
            return Err(EngineError::InvalidProfile(format!(
                "unknown yeast profile '{}' (known: {})",
                new.yeast_profile,
                known.join(", ")
            )));
        }

        let batch = self.batches.create(&new, Utc::now())?;
        info!(
            batch_id = %batch.id,
            name = %batch.name,
            profile = %batch.yeast_profile,
            og = batch.og,
            fg_target = batch.fg_target,
            "🍺 Batch registered"
        );
        Ok(batch)
    }

    pub fn get_batch(&self, batch_id: BatchId) -> Result<Batch, EngineError> {
        self.batches
            .get(batch_id)?
            .ok_or(EngineError::BatchNotFound(batch_id))
    }

    pub fn list_batches(&self) -> Result<Vec<Batch>, EngineError> {
        Ok(self.batches.list()?)
    }

    /// The batch device readings without an explicit batch go to: the most
    /// recently started one that is not done.
    pub fn current_batch(&self) -> Result<Option<Batch>, EngineError> {
        Ok(self
            .batches
            .list()?
            .into_iter()
            .find(|b| b.status != BatchStatus::Done))
    }

    /// External status change. Re-arms every trigger of the batch; a batch
    /// moved to `done` also gives up its lock slot.
    pub async fn update_status(
        &self,
        batch_id: BatchId,
        status: BatchStatus,
    ) -> Result<Batch, EngineError> {
        self.get_batch(batch_id)?;
        let slot = self.locks.slot(batch_id);
        let batch = {
            let mut arms = slot.lock().await;
            let batch = self
                .batches
                .set_status(batch_id, status)?
                .ok_or(EngineError::BatchNotFound(batch_id))?;
            arms.reset();
            batch
        };
        drop(slot);

        if status == BatchStatus::Done && self.locks.release(batch_id) {
            debug!(batch_id = %batch_id, "Lock slot released");
        }
        info!(batch_id = %batch_id, status = %status, "Batch status updated, triggers re-armed");
        Ok(batch)
    }

    // ========================================================================
    // Readings
    // ========================================================================

    /// Readings of the trailing `window_hours` before the newest one.
    ///
    /// A window reaching past the representable range returns everything.
    pub fn recent_readings(
        &self,
        batch_id: BatchId,
        window_hours: f64,
    ) -> Result<Vec<Reading>, EngineError> {
        self.get_batch(batch_id)?;
        let Some(latest) = self.readings.latest(batch_id)? else {
            return Ok(Vec::new());
        };
        let from = window_start(latest.timestamp, hours(window_hours));
        Ok(self.readings.window(batch_id, from, latest.timestamp)?)
    }

    /// Batch plus its complete reading history.
    pub fn history(&self, batch_id: BatchId) -> Result<(Batch, Vec<Reading>), EngineError> {
        let batch = self.get_batch(batch_id)?;
        let readings = self.readings.all(batch_id)?;
        Ok((batch, readings))
    }

    // ========================================================================
    // Alerts
    // ========================================================================

    pub fn alerts(&self, batch_id: BatchId) -> Result<Vec<AlertRecord>, EngineError> {
        self.get_batch(batch_id)?;
        Ok(self.alerts.list(batch_id)?)
    }

    /// Mark an alert as read. Has no effect on deduplication.
    pub fn acknowledge_alert(
        &self,
        batch_id: BatchId,
        alert_id: AlertId,
    ) -> Result<Option<AlertRecord>, EngineError> {
        self.get_batch(batch_id)?;
        Ok(self.alerts.acknowledge(batch_id, alert_id)?)
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    /// Read-only evaluation at the newest stored reading. Sends nothing and
    /// leaves arming state untouched.
    pub fn analyze(&self, batch_id: BatchId) -> Result<AnalysisReport, EngineError> {
        let batch = self.get_batch(batch_id)?;
        let threshold = self.profiles.threshold_for(&batch.yeast_profile);

        let Some(latest) = self.readings.latest(batch_id)? else {
            return Ok(AnalysisReport {
                batch,
                attenuation_threshold: threshold,
                latest: None,
                readings_in_window: 0,
                evaluations: Default::default(),
                forecast: None,
                generated_at: Utc::now(),
            });
        };

        let window = self.lookback_window(batch_id, latest.timestamp)?;
        let previous = window.iter().rev().nth(1).map(|r| r.attenuation);
        let assessment = analysis::assess(&batch, &latest, previous, &window, threshold, &self.analysis);

        Ok(AnalysisReport {
            batch,
            attenuation_threshold: threshold,
            latest: Some(latest),
            readings_in_window: window.len(),
            evaluations: assessment.evaluations,
            forecast: Some(assessment.forecast),
            generated_at: Utc::now(),
        })
    }

    fn lookback_window(
        &self,
        batch_id: BatchId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reading>, EngineError> {
        Ok(self
            .readings
            .window(batch_id, window_start(now, self.analysis.lookback()), now)?)
    }

    // ========================================================================
    // Ingestion cycle
    // ========================================================================

    /// Store one reading and dispatch every alert it newly justifies.
    ///
    /// Returns the alerts whose delivery was confirmed (possibly none).
    /// Delivery failures are logged and retried on a later reading; they
    /// never fail the call.
    ///
    /// # Errors
    ///
    /// - `BatchNotFound`: unknown batch, nothing is written
    /// - `InvalidReading`: out-of-range sample, nothing is written
    /// - `Storage`: the store failed
    pub async fn process_reading(
        &self,
        batch_id: BatchId,
        sample: SensorSample,
    ) -> Result<Vec<AlertRecord>, EngineError> {
        let batch = self.get_batch(batch_id)?;

        if let Err(e) = sample.validate() {
            warn!(batch_id = %batch_id, error = %e, "Rejected reading");
            return Err(e);
        }
        let reading = Reading::from_sample(
            batch_id,
            &sample,
            analysis::attenuation(batch.og, sample.gravity)?,
        );

        let slot = self.locks.slot(batch_id);
        let mut arms = slot.lock().await;

        let previous = self.readings.latest(batch_id)?;
        self.readings.append(&reading)?;

        if let Some(prev) = previous.as_ref().filter(|p| p.timestamp > reading.timestamp) {
            debug!(
                batch_id = %batch_id,
                reading_at = %reading.timestamp,
                latest_at = %prev.timestamp,
                "Late reading stored without evaluation"
            );
            return Ok(Vec::new());
        }

        // status may have changed while waiting for the lock
        let batch = self.batches.get(batch_id)?.unwrap_or(batch);
        if !batch.status.evaluates_alerts() {
            debug!(batch_id = %batch_id, status = %batch.status, "Reading stored, alerts disabled");
            drop(arms);
            drop(slot);
            self.locks.release(batch_id);
            return Ok(Vec::new());
        }

        let now = reading.timestamp;
        let window = self.lookback_window(batch_id, now)?;
        let threshold = self.profiles.threshold_for(&batch.yeast_profile);
        let assessment = analysis::assess(
            &batch,
            &reading,
            previous.map(|p| p.attenuation),
            &window,
            threshold,
            &self.analysis,
        );

        let mut approved: Vec<Candidate> = Vec::new();
        for (kind, evaluation) in &assessment.evaluations {
            let Some(candidate) = arms.observe(*kind, evaluation, now) else {
                continue;
            };
            let since = match candidate.episode {
                Episode::Fresh => None,
                Episode::Since(at) => Some(at),
                Episode::Unknown => Some(window_start(now, self.analysis.cooldown())),
            };
            let seen = match since {
                Some(since) => self.alerts.exists(batch_id, *kind, since)?,
                None => false,
            };
            if seen {
                debug!(batch_id = %batch_id, kind = %kind, "Already alerted this episode, suppressing");
                arms.confirm(*kind, now);
                continue;
            }
            approved.push(candidate);
        }

        if approved.is_empty() {
            return Ok(Vec::new());
        }

        let deliveries = approved.into_iter().map(|candidate| {
            let message = messages::render(&batch, &reading, &candidate.evidence);
            async move {
                let outcome = match tokio::time::timeout(
                    self.analysis.notify_timeout(),
                    self.notifier.send(batch_id, &message),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(NotifyError::Timeout),
                };
                (candidate, message, outcome)
            }
        });
        let results = join_all(deliveries).await;

        let mut dispatched = Vec::new();
        for (candidate, message, outcome) in results {
            let kind = candidate.kind;
            if let Err(e) = outcome {
                warn!(batch_id = %batch_id, kind = %kind, error = %e, "Alert delivery failed, will retry");
                continue;
            }

            // delivered: never resend this episode, even if recording fails
            arms.confirm(kind, now);
            let pending = PendingAlert {
                batch_id,
                message,
                evidence: candidate.evidence,
                channel: self.notifier.channel_name().to_string(),
            };
            match self.alerts.record(pending, now) {
                Ok(record) => {
                    info!(batch_id = %batch_id, kind = %kind, alert_id = %record.id, "🔔 Alert sent");
                    dispatched.push(record);
                }
                Err(e) => {
                    error!(batch_id = %batch_id, kind = %kind, error = %e, "Alert delivered but not recorded");
                }
            }
        }

        if self.analysis.auto_resting
            && batch.status == BatchStatus::Active
            && dispatched.iter().any(|r| r.kind == TriggerKind::AttenuationReached)
        {
            match self.batches.set_status(batch_id, BatchStatus::Resting) {
                Ok(_) => info!(batch_id = %batch_id, "Batch moved to resting"),
                Err(e) => error!(batch_id = %batch_id, error = %e, "Failed to move batch to resting"),
            }
        }

        Ok(dispatched)
    }
}

/// `end - span`, clamped to the earliest representable instant.
fn window_start(end: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    end.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use crate::storage::InMemoryStore;

    fn engine() -> AlertEngine {
        AlertEngine::with_store(
            Arc::new(InMemoryStore::new()),
            Arc::new(LogNotifier),
            AnalysisConfig::default(),
            ProfileConfig::default(),
        )
    }

    fn new_batch() -> NewBatch {
        NewBatch {
            name: "Helles".into(),
            yeast_profile: "Lager".into(),
            og: 1.048,
            fg_target: 1.010,
            temp_target: 18.0,
            started_at: None,
        }
    }

    #[test]
    fn register_validates_profile() {
        let engine = engine();
        assert!(engine.register_batch(new_batch()).is_ok());

        let bad = [
            NewBatch { og: 1.000, ..new_batch() },
            NewBatch { fg_target: 1.050, ..new_batch() },
            NewBatch { fg_target: 0.990, ..new_batch() },
            NewBatch { yeast_profile: "wine".into(), ..new_batch() },
            NewBatch { temp_target: f64::NAN, ..new_batch() },
        ];
        for new in bad {
            assert!(matches!(
                engine.register_batch(new),
                Err(EngineError::InvalidProfile(_))
            ));
        }
    }

    #[test]
    fn analyze_without_readings_is_empty() {
        let engine = engine();
        let batch = engine.register_batch(new_batch()).unwrap();
        let report = engine.analyze(batch.id).unwrap();
        assert!(report.latest.is_none());
        assert!(report.evaluations.is_empty());
        assert_eq!(report.attenuation_threshold, 0.75);
    }

    #[tokio::test]
    async fn huge_reading_window_returns_everything() {
        let engine = engine();
        let batch = engine.register_batch(new_batch()).unwrap();
        let sample = SensorSample {
            timestamp: Utc::now(),
            gravity: 1.030,
            temperature: 12.0,
            battery: 80.0,
        };
        engine.process_reading(batch.id, sample).await.unwrap();

        for window in [1e12, f64::INFINITY] {
            assert_eq!(engine.recent_readings(batch.id, window).unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn done_batch_releases_its_lock_slot() {
        let engine = engine();
        let batch = engine.register_batch(new_batch()).unwrap();

        engine.update_status(batch.id, BatchStatus::Resting).await.unwrap();
        assert_eq!(engine.locks.len(), 1);
        engine.update_status(batch.id, BatchStatus::Done).await.unwrap();
        assert!(engine.locks.is_empty());

        // readings for a done batch are stored without keeping a slot
        let sample = SensorSample {
            timestamp: Utc::now(),
            gravity: 1.012,
            temperature: 12.0,
            battery: 80.0,
        };
        assert!(engine.process_reading(batch.id, sample).await.unwrap().is_empty());
        assert!(engine.locks.is_empty());
    }

    #[tokio::test]
    async fn current_batch_skips_done() {
        let engine = engine();
        assert!(engine.current_batch().unwrap().is_none());

        let batch = engine.register_batch(new_batch()).unwrap();
        assert_eq!(engine.current_batch().unwrap().unwrap().id, batch.id);

        engine.update_status(batch.id, BatchStatus::Done).await.unwrap();
        assert!(engine.current_batch().unwrap().is_none());
    }
}
