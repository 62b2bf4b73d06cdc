//! Coherence scoring
//!
//! A deterministic, pure combination of breath-rate proximity to a healthy
//! baseline and HRV normalization against an expected physiological range.
//! Input validation happens at the engine boundary; the score itself never
//! fails on well-typed input.

use crate::error::EngineError;

/// Resting breath rate treated as optimal (breaths per minute)
pub const BASELINE_BREATH_RATE: f64 = 16.0;
/// Deviation (bpm) at which the breath sub-score reaches zero
pub const BREATH_RATE_TOLERANCE: f64 = 10.0;
/// HRV (ms) at or above which the HRV sub-score saturates
pub const HRV_CEILING: f64 = 100.0;

const BREATH_WEIGHT: f64 = 0.5;
const HRV_WEIGHT: f64 = 0.5;

/// Compute the coherence score in `[0, 100]`, rounded to 2 decimals.
///
/// The breath sub-score decreases linearly with distance from
/// [`BASELINE_BREATH_RATE`] and floors at zero; the HRV sub-score increases
/// linearly and saturates at [`HRV_CEILING`].
pub fn coherence_score(breath_rate: f64, hrv: f64) -> f64 {
    let breath_sub = (1.0 - (breath_rate - BASELINE_BREATH_RATE).abs() / BREATH_RATE_TOLERANCE)
        .max(0.0);
    let hrv_sub = (hrv / HRV_CEILING).min(1.0);
    let score = (BREATH_WEIGHT * breath_sub + HRV_WEIGHT * hrv_sub) * 100.0;
    (score * 100.0).round() / 100.0
}

/// Boundary validation for check-in vitals. Invalid numeric input never
/// reaches the pure scorer or the trend detector.
pub fn validate_vitals(breath_rate: f64, hrv: f64) -> Result<(), EngineError> {
    if !breath_rate.is_finite() || breath_rate <= 0.0 {
        return Err(EngineError::ValidationError(format!(
            "breath_rate must be positive, got {breath_rate}"
        )));
    }
    if !hrv.is_finite() || hrv < 0.0 {
        return Err(EngineError::ValidationError(format!(
            "hrv must be non-negative, got {hrv}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reference_scenarios() {
        // Ground-truth values for the four reference inputs
        assert_eq!(coherence_score(20.0, 50.0), 55.0);
        assert_eq!(coherence_score(22.0, 47.0), 43.5);
        assert_eq!(coherence_score(24.0, 38.0), 29.0);
        assert_eq!(coherence_score(28.0, 38.0), 19.0);
    }

    #[test]
    fn test_monotonic_in_breath_rate_above_baseline() {
        // Same HRV, higher breath rate above baseline: strictly lower score
        // until the breath sub-score floors at zero
        assert!(coherence_score(28.0, 38.0) < coherence_score(24.0, 38.0));
        assert!(coherence_score(24.0, 38.0) < coherence_score(20.0, 38.0));
        // Floored region: no further decrease
        assert_eq!(coherence_score(30.0, 38.0), coherence_score(40.0, 38.0));
    }

    #[test]
    fn test_monotonic_in_hrv() {
        assert!(coherence_score(20.0, 60.0) > coherence_score(20.0, 50.0));
        // Saturates at the ceiling
        assert_eq!(coherence_score(20.0, 100.0), coherence_score(20.0, 140.0));
    }

    #[test]
    fn test_bounds() {
        assert_eq!(coherence_score(16.0, 100.0), 100.0);
        assert_eq!(coherence_score(60.0, 0.0), 0.0);
        for (br, hrv) in [(1.0, 0.0), (16.0, 55.5), (90.0, 500.0)] {
            let s = coherence_score(br, hrv);
            assert!((0.0..=100.0).contains(&s), "score {s} out of range");
        }
    }

    #[test]
    fn test_vitals_validation() {
        assert!(validate_vitals(16.0, 0.0).is_ok());
        assert!(validate_vitals(0.0, 50.0).is_err());
        assert!(validate_vitals(-4.0, 50.0).is_err());
        assert!(validate_vitals(16.0, -1.0).is_err());
        assert!(validate_vitals(f64::NAN, 50.0).is_err());
    }
}
