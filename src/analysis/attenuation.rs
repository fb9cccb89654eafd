//! Apparent attenuation from original and current gravity

use crate::config::defaults::GRAVITY_MIN_SG;
use crate::error::EngineError;

/// Fraction of the original extract already fermented, clamped to `[0, 1]`.
///
/// Early readings can sit slightly above OG and late ones below the
/// theoretical floor; clamping keeps that noise out of alert evidence.
pub fn attenuation(og: f64, current_gravity: f64) -> Result<f64, EngineError> {
    if !og.is_finite() || og <= GRAVITY_MIN_SG {
        return Err(EngineError::InvalidProfile(format!(
            "original gravity must be above {GRAVITY_MIN_SG:.3}, got {og}"
        )));
    }
    if !current_gravity.is_finite() {
        return Err(EngineError::InvalidReading(format!(
            "gravity must be finite, got {current_gravity}"
        )));
    }
    Ok(((og - current_gravity) / (og - 1.0)).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typical_ale() {
        let a = attenuation(1.050, 1.010).unwrap();
        assert!((a - 0.8).abs() < 1e-9);
    }

    #[test]
    fn always_within_unit_interval() {
        for og in [1.001, 1.030, 1.060, 1.120] {
            for g in [0.990, 1.000, 1.005, 1.040, 1.100, 1.150] {
                let a = attenuation(og, g).unwrap();
                assert!((0.0..=1.0).contains(&a), "og={og} g={g} a={a}");
            }
        }
    }

    #[test]
    fn og_at_or_below_water_is_rejected() {
        assert!(matches!(attenuation(1.000, 1.000), Err(EngineError::InvalidProfile(_))));
        assert!(matches!(attenuation(0.998, 1.000), Err(EngineError::InvalidProfile(_))));
        assert!(attenuation(f64::NAN, 1.000).is_err());
    }
}
