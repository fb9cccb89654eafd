//! Time-to-target forecast from a least-squares gravity trend
//!
//! A single-feature linear fit of gravity against elapsed hours. Real
//! fermentations follow a sigmoid, so the projection is early-warning
//! direction only: it overestimates the remaining time during the fast
//! phase and underestimates it near the tail.

use chrono::{DateTime, Utc};
use serde::Serialize;
use statrs::statistics::Statistics;

use super::span_hours;
use crate::config::hours;
use crate::types::Reading;

/// Slopes flatter than this (SG per hour) count as not falling. Guards
/// against rounding noise in fits over flat data.
const MIN_FALL_PER_HOUR: f64 = 1e-7;

/// Least-squares line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

/// Fit a line through `(x, y)` points.
///
/// `None` with fewer than two points or when every `x` is the same.
pub fn fit_line(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }
    let xs: Vec<f64> = points.iter().map(|(x, _)| *x).collect();
    let ys: Vec<f64> = points.iter().map(|(_, y)| *y).collect();

    let var_x = Statistics::variance(&xs);
    if !var_x.is_finite() || var_x <= f64::EPSILON {
        return None;
    }
    let slope = Statistics::covariance(&xs, &ys) / var_x;
    let intercept = Statistics::mean(&ys) - slope * Statistics::mean(&xs);
    if !slope.is_finite() || !intercept.is_finite() {
        return None;
    }
    Some(LinearFit { slope, intercept })
}

/// A usable projection toward the target gravity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    /// SG per hour, always negative here
    pub slope_per_hour: f64,
    pub intercept: f64,
    pub hours_to_target: f64,
    /// Fitted gravity at the newest reading
    pub fitted_gravity: f64,
    pub target_gravity: f64,
    pub eta: DateTime<Utc>,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ForecastOutcome {
    Projected(Forecast),
    /// Current gravity is already at or below the target
    TargetReached,
    /// Too few readings, too short a span, or gravity not falling
    NotEnoughData,
}

/// Project hours until gravity reaches `target_gravity`.
///
/// `readings` is the trailing forecast window; order does not matter.
pub fn forecast(
    readings: &[Reading],
    target_gravity: f64,
    min_readings: usize,
    min_span_hours: f64,
) -> ForecastOutcome {
    if readings.len() < min_readings.max(2) {
        return ForecastOutcome::NotEnoughData;
    }

    let mut sorted: Vec<&Reading> = readings.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let (first, last) = match (sorted.first(), sorted.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return ForecastOutcome::NotEnoughData,
    };
    if span_hours(first.timestamp, last.timestamp) < min_span_hours {
        return ForecastOutcome::NotEnoughData;
    }

    let points: Vec<(f64, f64)> = sorted
        .iter()
        .map(|r| (span_hours(first.timestamp, r.timestamp), r.gravity))
        .collect();
    let Some(fit) = fit_line(&points) else {
        return ForecastOutcome::NotEnoughData;
    };
    if fit.slope > -MIN_FALL_PER_HOUR {
        return ForecastOutcome::NotEnoughData;
    }

    let hours_to_target = (last.gravity - target_gravity) / fit.slope.abs();
    if !hours_to_target.is_finite() || hours_to_target <= 0.0 {
        return ForecastOutcome::TargetReached;
    }

    let last_x = span_hours(first.timestamp, last.timestamp);
    ForecastOutcome::Projected(Forecast {
        slope_per_hour: fit.slope,
        intercept: fit.intercept,
        hours_to_target,
        fitted_gravity: fit.intercept + fit.slope * last_x,
        target_gravity,
        eta: last.timestamp + hours(hours_to_target),
        samples: sorted.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BatchId;
    use chrono::{Duration, TimeZone};

    fn series(gravities: &[f64], step_hours: i64) -> Vec<Reading> {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        gravities
            .iter()
            .enumerate()
            .map(|(i, g)| Reading {
                batch_id: BatchId(1),
                timestamp: t0 + Duration::hours(i as i64 * step_hours),
                gravity: *g,
                temperature: 19.0,
                battery: 90.0,
                attenuation: 0.0,
            })
            .collect()
    }

    #[test]
    fn fit_line_recovers_exact_slope() {
        let fit = fit_line(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fit_line_needs_spread_in_x() {
        assert!(fit_line(&[(1.0, 1.0)]).is_none());
        assert!(fit_line(&[(1.0, 1.0), (1.0, 2.0)]).is_none());
    }

    #[test]
    fn linear_decline_projects_seventy_hours() {
        // -0.0005 SG/h for 12 h, ending at 1.045
        let gravities: Vec<f64> = (0..=12).map(|i| 1.051 - 0.0005 * f64::from(i)).collect();
        let readings = series(&gravities, 1);

        match forecast(&readings, 1.010, 3, 6.0) {
            ForecastOutcome::Projected(f) => {
                assert!((f.hours_to_target - 70.0).abs() < 0.01, "{}", f.hours_to_target);
                assert!((f.slope_per_hour + 0.0005).abs() < 1e-9);
                assert!((f.fitted_gravity - 1.045).abs() < 1e-9);
                assert_eq!(f.samples, 13);
            }
            other => panic!("expected projection, got {other:?}"),
        }
    }

    #[test]
    fn flat_or_rising_gravity_is_not_enough_data() {
        let flat = series(&[1.020, 1.020, 1.020, 1.020], 3);
        assert_eq!(forecast(&flat, 1.010, 3, 6.0), ForecastOutcome::NotEnoughData);

        let rising = series(&[1.020, 1.021, 1.022, 1.023], 3);
        assert_eq!(forecast(&rising, 1.010, 3, 6.0), ForecastOutcome::NotEnoughData);
    }

    #[test]
    fn sparse_or_short_windows_are_not_enough_data() {
        let two = series(&[1.040, 1.030], 6);
        assert_eq!(forecast(&two, 1.010, 3, 6.0), ForecastOutcome::NotEnoughData);

        let short = series(&[1.040, 1.039, 1.038, 1.037], 1);
        assert_eq!(forecast(&short, 1.010, 3, 6.0), ForecastOutcome::NotEnoughData);
    }

    #[test]
    fn below_target_is_reached() {
        let readings = series(&[1.014, 1.012, 1.010, 1.008], 3);
        assert_eq!(forecast(&readings, 1.010, 3, 6.0), ForecastOutcome::TargetReached);
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let mut readings = series(&[1.040, 1.037, 1.034, 1.031], 3);
        readings.reverse();
        assert!(matches!(
            forecast(&readings, 1.010, 3, 6.0),
            ForecastOutcome::Projected(_)
        ));
    }
}
