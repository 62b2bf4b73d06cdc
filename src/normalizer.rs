//! Event normalization
//!
//! This module converts mapped raw records into immutable canonical events:
//! timestamps resolve to UTC under a reference timezone, values and units are
//! validated against the allowed-combination table, and each rejection is an
//! explicit per-record value aggregated into batch counts. A bad record never
//! raises past the batch boundary.

use crate::error::EngineError;
use crate::mapper::MappedRecord;
use crate::types::{unit_allowed, CanonicalEvent, MetricValue, Signal, Unit};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;

/// Why a single record was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingTimestamp,
    BadTimestamp,
    MissingSignal,
    NonNumericValue,
    UnknownUnit,
    UnitMismatch,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingTimestamp => "missing_timestamp",
            RejectReason::BadTimestamp => "bad_timestamp",
            RejectReason::MissingSignal => "missing_signal",
            RejectReason::NonNumericValue => "non_numeric_value",
            RejectReason::UnknownUnit => "unknown_unit",
            RejectReason::UnitMismatch => "unit_mismatch",
        }
    }
}

/// Result of one normalization pass over a batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub events: Vec<CanonicalEvent>,
    pub rows_ingested: usize,
    pub rows_dropped: usize,
}

/// Resolve an optional IANA timezone override to a reference timezone.
/// An unknown name is a structural failure that aborts the ingestion call.
pub fn resolve_timezone(tz_override: Option<&str>) -> Result<Tz, EngineError> {
    match tz_override {
        None => Ok(chrono_tz::UTC),
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| EngineError::InvalidTimezone(name.to_string())),
    }
}

/// Normalize one mapped record into a canonical event, or reject it.
///
/// The signal label resolution result is passed in by the caller so the
/// mapper table stays the single source of truth.
pub fn normalize_record(
    record: MappedRecord,
    signal: Signal,
    original_label: Option<String>,
    reference_tz: Tz,
) -> Result<CanonicalEvent, RejectReason> {
    let raw_timestamp = record.timestamp.ok_or(RejectReason::MissingTimestamp)?;
    let timestamp = parse_timestamp(&raw_timestamp, reference_tz).ok_or(RejectReason::BadTimestamp)?;

    let value = match record.value {
        None => None,
        Some(v) => Some(numeric_value(&v).ok_or(RejectReason::NonNumericValue)?),
    };

    let unit = match record.unit {
        None => None,
        Some(serde_json::Value::String(u)) => {
            Some(Unit::from_label(&u).ok_or(RejectReason::UnknownUnit)?)
        }
        Some(_) => return Err(RejectReason::UnknownUnit),
    };

    if !unit_allowed(signal, unit) {
        return Err(RejectReason::UnitMismatch);
    }

    let mut metadata: HashMap<String, MetricValue> = record
        .meta
        .iter()
        .filter_map(|(k, v)| MetricValue::from_json(v).map(|mv| (k.clone(), mv)))
        .collect();
    if let Some(label) = original_label {
        metadata.insert("original_label".to_string(), MetricValue::String(label));
    }

    Ok(CanonicalEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        timestamp,
        signal,
        value,
        unit,
        metadata,
    })
}

/// Normalize a batch of mapped records, upholding the accounting invariant
/// `rows_ingested + rows_dropped == records.len()`.
pub fn normalize_batch(
    records: Vec<(MappedRecord, Signal, Option<String>)>,
    reference_tz: Tz,
) -> BatchOutcome {
    let total = records.len();
    let mut events = Vec::new();
    let mut rows_dropped = 0;

    for (record, signal, original_label) in records {
        match normalize_record(record, signal, original_label, reference_tz) {
            Ok(event) => events.push(event),
            Err(reason) => {
                log::warn!("dropping record: {}", reason.as_str());
                rows_dropped += 1;
            }
        }
    }

    debug_assert_eq!(events.len() + rows_dropped, total);
    BatchOutcome {
        rows_ingested: events.len(),
        events,
        rows_dropped,
    }
}

/// Parse a raw timestamp value to a UTC instant.
///
/// Accepted forms: RFC 3339 / ISO-8601 with an explicit offset (the offset
/// wins), a naive datetime interpreted in the reference timezone, and UNIX
/// epoch seconds (numeric or numeric string, fractional allowed).
fn parse_timestamp(value: &serde_json::Value, reference_tz: Tz) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::Number(n) => epoch_to_utc(n.as_f64()?),
        serde_json::Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return local_to_utc(naive, reference_tz);
                }
            }
            epoch_to_utc(s.parse::<f64>().ok()?)
        }
        _ => None,
    }
}

fn epoch_to_utc(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let secs = seconds.trunc() as i64;
    let nanos = (seconds.fract().abs() * 1e9) as u32;
    DateTime::from_timestamp(secs, nanos)
}

fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    // `earliest` resolves DST-fold ambiguity deterministically
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
