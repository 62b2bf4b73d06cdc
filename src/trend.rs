//! Breath-rate trend detection
//!
//! A pure function over a history snapshot. `Rising` requires a strict
//! increase across every consecutive pair in the retained window, not just
//! the last two entries; anything else with two or more entries is `Stable`.

use crate::types::{CheckIn, Trend};

/// Classify the breath-rate trend of a chronological history snapshot
pub fn detect(history: &[CheckIn]) -> Trend {
    let rates: Vec<f64> = history.iter().map(|c| c.breath_rate).collect();
    detect_rates(&rates)
}

fn detect_rates(rates: &[f64]) -> Trend {
    if rates.len() < 2 {
        return Trend::None;
    }
    let rising = rates.windows(2).all(|pair| pair[0] < pair[1]);
    if rising {
        Trend::Rising
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn history(rates: &[f64]) -> Vec<CheckIn> {
        rates
            .iter()
            .map(|&breath_rate| CheckIn {
                user_id: "u1".to_string(),
                text: String::new(),
                breath_rate,
                hrv: 50.0,
                timestamp: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_short_history_has_no_trend() {
        assert_eq!(detect(&history(&[])), Trend::None);
        assert_eq!(detect(&history(&[20.0])), Trend::None);
    }

    #[test]
    fn test_strictly_increasing_is_rising() {
        assert_eq!(detect(&history(&[20.0, 22.0, 24.0])), Trend::Rising);
        assert_eq!(detect(&history(&[20.0, 22.0])), Trend::Rising);
    }

    #[test]
    fn test_non_monotonic_is_stable() {
        assert_eq!(detect(&history(&[20.0, 22.0, 20.0])), Trend::Stable);
        assert_eq!(detect(&history(&[24.0, 22.0, 20.0])), Trend::Stable);
        // A plateau breaks strictness
        assert_eq!(detect(&history(&[20.0, 20.0, 24.0])), Trend::Stable);
    }

    #[test]
    fn test_detection_does_not_consume_history() {
        let h = history(&[20.0, 22.0, 24.0]);
        let _ = detect(&h);
        assert_eq!(h.len(), 3);
    }
}
