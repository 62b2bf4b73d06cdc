//! Fitbit payload adapter
//!
//! Parses Fitbit daily HRV and breathing-rate API payloads into live metric
//! samples. Malformed entries are skipped and logged without failing the
//! batch. The HTTP client, OAuth/PKCE flow, and token refresh live outside
//! the core; this adapter only understands the payload shapes.

use crate::error::EngineError;
use crate::types::LiveMetricSample;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Fitbit payload adapter
pub struct FitbitAdapter;

/// One HRV reading: timestamp plus deep-sleep RMSSD (ms)
#[derive(Debug, Clone, PartialEq)]
pub struct HrvReading {
    pub timestamp: DateTime<Utc>,
    pub rmssd_ms: f64,
}

/// One breathing-rate reading: timestamp plus breaths per minute
#[derive(Debug, Clone, PartialEq)]
pub struct BreathReading {
    pub timestamp: DateTime<Utc>,
    pub breaths_per_minute: f64,
}

impl FitbitAdapter {
    /// Parse a Fitbit daily HRV payload (`GET /1/user/-/hrv/date/...`).
    ///
    /// Entries missing a timestamp or the `value.deep` RMSSD are discarded
    /// with a warning; an unreadable document is a structural error.
    pub fn parse_hrv_payload(raw_json: &str) -> Result<Vec<HrvReading>, EngineError> {
        let payload: HrvPayload = serde_json::from_str(raw_json)?;
        let mut readings = Vec::new();

        for entry in payload.hrv.unwrap_or_default() {
            let Some(timestamp) = entry.timestamp() else {
                log::warn!("discarding HRV entry without a usable timestamp");
                continue;
            };
            match entry.value.as_ref().and_then(|v| v.deep) {
                Some(rmssd_ms) => readings.push(HrvReading {
                    timestamp,
                    rmssd_ms,
                }),
                None => log::warn!("discarding HRV entry with missing deep RMSSD"),
            }
        }

        log::info!("validated {} Fitbit HRV entries", readings.len());
        Ok(readings)
    }

    /// Parse a Fitbit breathing-rate payload (`GET /1/user/-/br/date/...`)
    pub fn parse_breathing_payload(raw_json: &str) -> Result<Vec<BreathReading>, EngineError> {
        let payload: BreathingPayload = serde_json::from_str(raw_json)?;
        let mut readings = Vec::new();

        for entry in payload.br.unwrap_or_default() {
            let Some(timestamp) = entry.timestamp() else {
                log::warn!("discarding breathing-rate entry without a usable timestamp");
                continue;
            };
            match entry.value.as_ref().and_then(|v| v.breathing_rate) {
                Some(breaths_per_minute) => readings.push(BreathReading {
                    timestamp,
                    breaths_per_minute,
                }),
                None => log::warn!("discarding breathing-rate entry with missing rate"),
            }
        }

        Ok(readings)
    }

    /// Merge HRV and breathing-rate readings by calendar date into live
    /// metric samples. Days with only one of the two metrics are dropped -
    /// a sample needs both vitals to be scoreable.
    pub fn merge_samples(
        hrv: &[HrvReading],
        breath: &[BreathReading],
    ) -> Vec<LiveMetricSample> {
        let breath_by_date: HashMap<NaiveDate, f64> = breath
            .iter()
            .map(|r| (r.timestamp.date_naive(), r.breaths_per_minute))
            .collect();

        let mut samples: Vec<LiveMetricSample> = hrv
            .iter()
            .filter_map(|r| {
                breath_by_date
                    .get(&r.timestamp.date_naive())
                    .map(|&breath_rate| LiveMetricSample {
                        breath_rate,
                        hrv: r.rmssd_ms,
                        timestamp: r.timestamp,
                    })
            })
            .collect();
        samples.sort_by_key(|s| s.timestamp);
        samples
    }
}

// Fitbit API response structures

#[derive(Debug, Deserialize)]
struct HrvPayload {
    hrv: Option<Vec<HrvEntry>>,
}

#[derive(Debug, Deserialize)]
struct HrvEntry {
    timestamp: Option<String>,
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    value: Option<HrvValue>,
}

#[derive(Debug, Deserialize)]
struct HrvValue {
    deep: Option<f64>,
    #[serde(rename = "dailyRmssd")]
    #[allow(dead_code)]
    daily_rmssd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BreathingPayload {
    br: Option<Vec<BreathingEntry>>,
}

#[derive(Debug, Deserialize)]
struct BreathingEntry {
    timestamp: Option<String>,
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    value: Option<BreathingValue>,
}

#[derive(Debug, Deserialize)]
struct BreathingValue {
    #[serde(rename = "breathingRate")]
    breathing_rate: Option<f64>,
}

impl HrvEntry {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        entry_timestamp(self.timestamp.as_deref(), self.date_time.as_deref())
    }
}

impl BreathingEntry {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        entry_timestamp(self.timestamp.as_deref(), self.date_time.as_deref())
    }
}

/// Fitbit uses `timestamp` (RFC 3339) in intraday responses and `dateTime`
/// (a bare date) in daily summaries; accept either.
fn entry_timestamp(timestamp: Option<&str>, date_time: Option<&str>) -> Option<DateTime<Utc>> {
    if let Some(ts) = timestamp {
        if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let date = date_time?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(
        date.and_time(NaiveTime::default())
            .and_utc(),
    )
}
