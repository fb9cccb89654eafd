//! Fermentation analysis
//!
//! Pure, store-free numeric routines: attenuation, the three trigger
//! evaluators and the gravity forecast. [`assess`] runs all of them over one
//! lookback window so the engine and the on-demand report share a single
//! code path.
//!
//! - `attenuation`: apparent attenuation from OG and current gravity
//! - `triggers`: attenuation crossing, gravity stability, temperature descent
//! - `forecast`: least-squares time-to-target projection

pub mod attenuation;
pub mod forecast;
pub mod triggers;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::{hours, AnalysisConfig};
use crate::types::{Batch, Reading, TriggerKind, TriggerResult};

pub use attenuation::attenuation;
pub use forecast::{fit_line, forecast, Forecast, ForecastOutcome, LinearFit};
pub use triggers::{evaluate_attenuation, evaluate_gravity_stability, evaluate_temperature_descent};

/// Outcome of one trigger evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "evidence", rename_all = "snake_case")]
pub enum Evaluation {
    /// The condition started (or is true) on this reading
    Triggered(TriggerResult),
    /// Still past an edge-triggered threshold crossed earlier
    Holding,
    /// Condition is false; re-arms a previously alerted trigger
    Clear,
    /// Too little data to say either way
    NotEnoughData,
}

impl Evaluation {
    pub fn is_triggered(&self) -> bool {
        matches!(self, Evaluation::Triggered(_))
    }
}

/// Every evaluation for one reading, plus the forecast behind `ForecastReady`.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub evaluations: BTreeMap<TriggerKind, Evaluation>,
    pub forecast: ForecastOutcome,
}

/// Read-only analysis of a batch at its latest reading.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub batch: Batch,
    pub attenuation_threshold: f64,
    /// Newest stored reading, if any
    pub latest: Option<Reading>,
    pub readings_in_window: usize,
    /// Empty until the batch has readings
    pub evaluations: BTreeMap<TriggerKind, Evaluation>,
    pub forecast: Option<ForecastOutcome>,
    pub generated_at: DateTime<Utc>,
}

/// Hours between two instants (negative if `to` is earlier).
pub fn span_hours(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}

/// Readings within `[now - window_hours, now]`, sorted by timestamp.
pub fn trailing(readings: &[Reading], now: DateTime<Utc>, window_hours: f64) -> Vec<&Reading> {
    let since = now
        .checked_sub_signed(hours(window_hours))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut window: Vec<&Reading> = readings
        .iter()
        .filter(|r| r.timestamp >= since && r.timestamp <= now)
        .collect();
    window.sort_by_key(|r| r.timestamp);
    window
}

/// Turn a forecast into the `ForecastReady` evaluation.
///
/// With a horizon set, only projections inside it trigger.
pub fn forecast_evaluation(outcome: &ForecastOutcome, horizon_hours: Option<f64>) -> Evaluation {
    match outcome {
        ForecastOutcome::Projected(f) => {
            if horizon_hours.is_some_and(|h| f.hours_to_target > h) {
                return Evaluation::Clear;
            }
            Evaluation::Triggered(TriggerResult::ForecastReady {
                hours_to_target: f.hours_to_target,
                slope_per_hour: f.slope_per_hour,
                fitted_gravity: f.fitted_gravity,
                target_gravity: f.target_gravity,
                eta: f.eta,
            })
        }
        ForecastOutcome::TargetReached => Evaluation::Clear,
        ForecastOutcome::NotEnoughData => Evaluation::NotEnoughData,
    }
}

/// Evaluate every trigger and the forecast at `current`.
///
/// `window` is the lookback slice of stored readings (it may include
/// `current`); each evaluator narrows it to its own trailing window.
pub fn assess(
    batch: &Batch,
    current: &Reading,
    previous_attenuation: Option<f64>,
    window: &[Reading],
    attenuation_threshold: f64,
    cfg: &AnalysisConfig,
) -> Assessment {
    let now = current.timestamp;
    let mut evaluations = BTreeMap::new();

    evaluations.insert(
        TriggerKind::AttenuationReached,
        evaluate_attenuation(current.attenuation, previous_attenuation, attenuation_threshold),
    );
    evaluations.insert(
        TriggerKind::GravityStable,
        evaluate_gravity_stability(window, now, cfg),
    );
    evaluations.insert(
        TriggerKind::TemperatureDescending,
        evaluate_temperature_descent(window, now, cfg),
    );

    let forecast_window: Vec<Reading> = trailing(window, now, cfg.forecast_window_hours)
        .into_iter()
        .cloned()
        .collect();
    let outcome = forecast(
        &forecast_window,
        batch.fg_target,
        cfg.forecast_min_readings,
        cfg.forecast_min_span_hours,
    );
    evaluations.insert(
        TriggerKind::ForecastReady,
        forecast_evaluation(&outcome, cfg.forecast_alert_horizon_hours),
    );

    Assessment {
        evaluations,
        forecast: outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BatchId, BatchStatus};
    use chrono::{Duration, TimeZone};

    fn batch() -> Batch {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        Batch {
            id: BatchId(1),
            name: "Pilsner".into(),
            yeast_profile: "lager".into(),
            og: 1.050,
            fg_target: 1.010,
            temp_target: 18.0,
            status: BatchStatus::Active,
            started_at: t0,
            created_at: t0,
        }
    }

    fn readings(batch: &Batch, gravities: &[f64]) -> Vec<Reading> {
        gravities
            .iter()
            .enumerate()
            .map(|(i, g)| Reading {
                batch_id: batch.id,
                timestamp: batch.started_at + Duration::hours(i as i64 * 2),
                gravity: *g,
                temperature: 12.0,
                battery: 90.0,
                attenuation: attenuation(batch.og, *g).unwrap(),
            })
            .collect()
    }

    #[test]
    fn assess_covers_every_kind() {
        let b = batch();
        let rs = readings(&b, &[1.030, 1.028, 1.026, 1.024, 1.022]);
        let current = rs.last().unwrap();
        let assessment = assess(&b, current, Some(rs[3].attenuation), &rs, 0.75, &AnalysisConfig::default());

        for kind in TriggerKind::ALL {
            assert!(assessment.evaluations.contains_key(&kind), "missing {kind}");
        }
        assert!(matches!(assessment.forecast, ForecastOutcome::Projected(_)));
        assert!(assessment.evaluations[&TriggerKind::ForecastReady].is_triggered());
    }

    #[test]
    fn forecast_beyond_horizon_is_clear() {
        let b = batch();
        let rs = readings(&b, &[1.030, 1.028, 1.026, 1.024, 1.022]);
        let current = rs.last().unwrap();
        let cfg = AnalysisConfig {
            forecast_alert_horizon_hours: Some(2.0),
            ..AnalysisConfig::default()
        };
        let assessment = assess(&b, current, None, &rs, 0.75, &cfg);
        assert_eq!(assessment.evaluations[&TriggerKind::ForecastReady], Evaluation::Clear);
    }

    #[test]
    fn trailing_window_is_inclusive_and_sorted() {
        let b = batch();
        let mut rs = readings(&b, &[1.030, 1.028, 1.026]);
        rs.reverse();
        let now = b.started_at + Duration::hours(4);
        let window = trailing(&rs, now, 2.0);
        assert_eq!(window.len(), 2);
        assert!(window[0].timestamp < window[1].timestamp);
    }
}
