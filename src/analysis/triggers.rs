//! Trigger evaluators
//!
//! Stateless functions over a window of readings. Each one answers with an
//! [`Evaluation`]; sparse data is `NotEnoughData`, never an error and never
//! a guess. Windows may arrive unsorted and are ordered by timestamp first.

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;

use super::{span_hours, trailing, Evaluation};
use crate::config::defaults::SG_PER_POINT;
use crate::config::AnalysisConfig;
use crate::types::{Reading, TriggerResult};

/// Edge-triggered attenuation check.
///
/// Fires only on the reading that crosses the threshold upward. Staying
/// above it afterwards is `Holding`, which keeps an undelivered alert
/// eligible for retry without re-firing a delivered one.
pub fn evaluate_attenuation(current: f64, previous: Option<f64>, threshold: f64) -> Evaluation {
    let Some(previous) = previous else {
        return Evaluation::NotEnoughData;
    };
    if current < threshold {
        Evaluation::Clear
    } else if previous < threshold {
        Evaluation::Triggered(TriggerResult::AttenuationReached {
            attenuation: current,
            previous_attenuation: previous,
            threshold,
        })
    } else {
        Evaluation::Holding
    }
}

/// Gravity range over the trailing stability window, in points.
pub fn evaluate_gravity_stability(
    readings: &[Reading],
    now: DateTime<Utc>,
    cfg: &AnalysisConfig,
) -> Evaluation {
    let window = trailing(readings, now, cfg.gravity_stability_hours);
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return Evaluation::NotEnoughData;
    };
    let span = span_hours(first.timestamp, last.timestamp);
    if window.len() < 2 || span < cfg.gravity_stability_min_span_hours {
        return Evaluation::NotEnoughData;
    }

    let gravities: Vec<f64> = window.iter().map(|r| r.gravity).collect();
    let range = Statistics::max(&gravities) - Statistics::min(&gravities);

    if range < cfg.gravity_stability_points * SG_PER_POINT {
        Evaluation::Triggered(TriggerResult::GravityStable {
            range_points: range / SG_PER_POINT,
            threshold_points: cfg.gravity_stability_points,
            window_hours: cfg.gravity_stability_hours,
            span_hours: span,
        })
    } else {
        Evaluation::Clear
    }
}

/// First-minus-last temperature over the trailing descent window.
pub fn evaluate_temperature_descent(
    readings: &[Reading],
    now: DateTime<Utc>,
    cfg: &AnalysisConfig,
) -> Evaluation {
    let window = trailing(readings, now, cfg.temp_descent_hours);
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return Evaluation::NotEnoughData;
    };
    if window.len() < 2
        || span_hours(first.timestamp, last.timestamp) < cfg.temp_descent_min_span_hours
    {
        return Evaluation::NotEnoughData;
    }

    let descent = first.temperature - last.temperature;
    if descent > cfg.temp_descent_threshold_c {
        Evaluation::Triggered(TriggerResult::TemperatureDescending {
            first_temperature: first.temperature,
            last_temperature: last.temperature,
            descent,
            threshold: cfg.temp_descent_threshold_c,
            window_hours: cfg.temp_descent_hours,
        })
    } else {
        Evaluation::Clear
    }
}
