//! Core types for the coherence engine
//!
//! This module defines the data structures that flow through the ingestion
//! pipeline (canonical events) and the check-in path (check-ins, trends,
//! outcomes). Canonical events are immutable once built by the normalizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed set of biometric signal kinds.
///
/// Every stored event carries one of these; raw labels that do not resolve
/// against the field-mapping table become [`Signal::MarkedEvent`] with the
/// original label preserved in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Ecg,
    RPeak,
    StElev,
    StDepr,
    MarkedEvent,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Ecg => "ecg",
            Signal::RPeak => "r_peak",
            Signal::StElev => "st_elev",
            Signal::StDepr => "st_depr",
            Signal::MarkedEvent => "marked_event",
        }
    }
}

/// Measurement unit for event values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "mV")]
    Millivolt,
    #[serde(rename = "bpm")]
    Bpm,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Millivolt => "mV",
            Unit::Bpm => "bpm",
        }
    }

    /// Parse a unit string as it appears in uploads
    pub fn from_label(label: &str) -> Option<Unit> {
        match label {
            "mV" => Some(Unit::Millivolt),
            "bpm" => Some(Unit::Bpm),
            _ => None,
        }
    }
}

/// Allowed `(signal, unit)` combinations, as pure data.
///
/// A missing unit is always acceptable; a present unit must appear in the
/// signal's row here.
pub const UNIT_RULES: &[(Signal, &[Unit])] = &[
    (Signal::Ecg, &[Unit::Millivolt]),
    (Signal::RPeak, &[Unit::Bpm]),
    (Signal::StElev, &[Unit::Millivolt]),
    (Signal::StDepr, &[Unit::Millivolt]),
    (Signal::MarkedEvent, &[]),
];

/// Check whether a unit is valid for a signal kind
pub fn unit_allowed(signal: Signal, unit: Option<Unit>) -> bool {
    let Some(unit) = unit else { return true };
    UNIT_RULES
        .iter()
        .find(|(s, _)| *s == signal)
        .map(|(_, units)| units.contains(&unit))
        .unwrap_or(false)
}

/// Scalar metadata value attached to canonical events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    // Integer before Number so untagged deserialization keeps integers exact
    Integer(i64),
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON value to a scalar metadata value, if it is one
    pub fn from_json(value: &serde_json::Value) -> Option<MetricValue> {
        match value {
            serde_json::Value::Null => Some(MetricValue::Null),
            serde_json::Value::Bool(b) => Some(MetricValue::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(MetricValue::Integer(i))
                } else {
                    n.as_f64().map(MetricValue::Number)
                }
            }
            serde_json::Value::String(s) => Some(MetricValue::String(s.clone())),
            _ => None,
        }
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::String(v.to_string())
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

/// A normalized biometric event.
///
/// Timestamps are always UTC; `signal` is always a member of the closed
/// enumeration. Events are immutable once normalized - nothing in the crate
/// mutates one after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Unique event identifier (provenance only, not part of the dedup key)
    pub event_id: String,
    /// Event instant, normalized to UTC before storage
    pub timestamp: DateTime<Utc>,
    /// Signal kind
    pub signal: Signal,
    /// Optional numeric reading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Optional unit, consistent with `signal` per [`UNIT_RULES`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
    /// Open metadata; holds `original_label` when the mapping was ambiguous
    #[serde(default)]
    pub metadata: HashMap<String, MetricValue>,
}

impl CanonicalEvent {
    /// Deduplication key: two events with the same key are the same event
    pub fn dedup_key(&self) -> (DateTime<Utc>, Signal, Option<u64>) {
        (self.timestamp, self.signal, self.value.map(f64::to_bits))
    }
}

/// A user breath check-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub user_id: String,
    pub text: String,
    /// Breaths per minute, positive
    pub breath_rate: f64,
    /// Heart-rate variability (ms), non-negative
    pub hrv: f64,
    pub timestamp: DateTime<Utc>,
}

/// Breath-rate trend over a user's retained history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Fewer than two check-ins retained
    None,
    /// Not strictly increasing across the window
    Stable,
    /// Strictly increasing across every consecutive pair
    Rising,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::None => "none",
            Trend::Stable => "stable",
            Trend::Rising => "rising",
        }
    }
}

/// Result of a check-in: the score plus the post-insert trend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInOutcome {
    pub coherence_score: f64,
    pub trend: Trend,
}

/// Outcome classification for a batch upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    /// Every record ingested
    Success,
    /// Some records dropped, at least one ingested
    Partial,
    /// Every record dropped (the batch itself was readable)
    Error,
}

/// Batch-level ingestion summary surfaced to the boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    pub status: IngestStatus,
    pub rows_ingested: usize,
    pub rows_dropped: usize,
}

impl IngestSummary {
    pub fn new(rows_ingested: usize, rows_dropped: usize) -> Self {
        let status = if rows_dropped == 0 {
            IngestStatus::Success
        } else if rows_ingested > 0 {
            IngestStatus::Partial
        } else {
            IngestStatus::Error
        };
        Self {
            status,
            rows_ingested,
            rows_dropped,
        }
    }
}

/// A live metric sample from a wearable provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveMetricSample {
    pub breath_rate: f64,
    pub hrv: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_signal_serde_names() {
        assert_eq!(serde_json::to_string(&Signal::RPeak).unwrap(), "\"r_peak\"");
        assert_eq!(
            serde_json::from_str::<Signal>("\"st_elev\"").unwrap(),
            Signal::StElev
        );
    }

    #[test]
    fn test_unit_serde_names() {
        assert_eq!(serde_json::to_string(&Unit::Millivolt).unwrap(), "\"mV\"");
        assert_eq!(serde_json::from_str::<Unit>("\"bpm\"").unwrap(), Unit::Bpm);
    }

    #[test]
    fn test_unit_rules() {
        assert!(unit_allowed(Signal::Ecg, Some(Unit::Millivolt)));
        assert!(unit_allowed(Signal::RPeak, Some(Unit::Bpm)));
        assert!(!unit_allowed(Signal::RPeak, Some(Unit::Millivolt)));
        assert!(!unit_allowed(Signal::MarkedEvent, Some(Unit::Bpm)));
        // A missing unit is valid for every signal
        for (signal, _) in UNIT_RULES {
            assert!(unit_allowed(*signal, None));
        }
    }

    #[test]
    fn test_metric_value_from_json() {
        let v = MetricValue::from_json(&serde_json::json!(3)).unwrap();
        assert_eq!(v, MetricValue::Integer(3));
        let v = MetricValue::from_json(&serde_json::json!("lead II")).unwrap();
        assert_eq!(v.as_str(), Some("lead II"));
        assert!(MetricValue::from_json(&serde_json::json!([1, 2])).is_none());
    }

    #[test]
    fn test_ingest_summary_status() {
        assert_eq!(IngestSummary::new(9, 0).status, IngestStatus::Success);
        assert_eq!(IngestSummary::new(2, 2).status, IngestStatus::Partial);
        assert_eq!(IngestSummary::new(0, 4).status, IngestStatus::Error);
        // Empty batch is a success, not an error
        assert_eq!(IngestSummary::new(0, 0).status, IngestStatus::Success);
    }
}
