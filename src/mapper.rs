//! Field mapping
//!
//! This module resolves heterogeneous incoming field names and signal labels
//! to the canonical schema using two pure-data lookup tables. Supporting a
//! new device export means adding table rows (or loading a JSON table), not
//! branching code.

use crate::parser::RawRecord;
use crate::types::Signal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical column names a raw field can resolve to
pub const COLUMN_TIMESTAMP: &str = "timestamp";
pub const COLUMN_SIGNAL: &str = "signal";
pub const COLUMN_VALUE: &str = "value";
pub const COLUMN_UNIT: &str = "unit";
pub const COLUMN_META: &str = "meta";

/// Lookup tables for field and label resolution.
///
/// The tables are configuration data: they serialize to/from JSON so a
/// deployment can extend them without touching normalization logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMap {
    /// Incoming column name -> canonical column name
    columns: HashMap<String, String>,
    /// Signal label -> canonical signal kind
    labels: HashMap<String, Signal>,
}

impl Default for FieldMap {
    fn default() -> Self {
        let columns = [
            ("Timestamp", COLUMN_TIMESTAMP),
            ("eventType", COLUMN_SIGNAL),
            ("Event Type", COLUMN_SIGNAL),
            ("type", COLUMN_SIGNAL),
            ("ecgChannel", COLUMN_VALUE),
            ("ECG Channel", COLUMN_VALUE),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        let labels = [
            ("ecg", Signal::Ecg),
            ("r_peak", Signal::RPeak),
            ("R-peak", Signal::RPeak),
            ("st_elev", Signal::StElev),
            ("ST Elevation", Signal::StElev),
            ("st_depr", Signal::StDepr),
            ("ST Depression", Signal::StDepr),
            ("marked_event", Signal::MarkedEvent),
            ("Marked Event", Signal::MarkedEvent),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to))
        .collect();

        Self { columns, labels }
    }
}

impl FieldMap {
    /// Load a mapping table from JSON configuration
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the mapping table for review
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Register an additional column alias
    pub fn add_column_alias(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.columns.insert(from.into(), to.into());
    }

    /// Register an additional signal label
    pub fn add_label(&mut self, label: impl Into<String>, signal: Signal) {
        self.labels.insert(label.into(), signal);
    }

    /// Resolve a raw field name to its canonical column. Names already
    /// canonical resolve to themselves; anything else is unmapped.
    pub fn resolve_column<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if let Some(canonical) = self.columns.get(name) {
            return Some(canonical.as_str());
        }
        match name {
            COLUMN_TIMESTAMP | COLUMN_SIGNAL | COLUMN_VALUE | COLUMN_UNIT | COLUMN_META => {
                Some(name)
            }
            _ => None,
        }
    }

    /// Resolve a signal label. An unrecognized label maps to
    /// [`Signal::MarkedEvent`] with the original label returned for
    /// preservation in metadata.
    pub fn resolve_label(&self, label: &str) -> (Signal, Option<String>) {
        match self.labels.get(label) {
            Some(signal) => (*signal, None),
            None => (Signal::MarkedEvent, Some(label.to_string())),
        }
    }

    /// Map one raw record into canonical slots. Fields that resolve nowhere
    /// are carried into `meta` under their original names so no information
    /// is silently dropped.
    pub fn map_record(&self, record: RawRecord) -> MappedRecord {
        let mut mapped = MappedRecord::default();

        for (name, value) in record {
            // Owned copy so the fallback arm can move `name` into meta
            let column = self.resolve_column(&name).map(str::to_string);
            match column.as_deref() {
                Some(COLUMN_TIMESTAMP) => mapped.timestamp = some_non_null(value),
                Some(COLUMN_SIGNAL) => {
                    mapped.label = match value {
                        serde_json::Value::String(s) if !s.is_empty() => Some(s),
                        _ => None,
                    }
                }
                Some(COLUMN_VALUE) => mapped.value = some_non_null(value),
                Some(COLUMN_UNIT) => mapped.unit = some_non_null(value),
                Some(COLUMN_META) => {
                    if let serde_json::Value::Object(map) = value {
                        mapped.meta.extend(map);
                    }
                }
                _ => {
                    mapped.meta.insert(name, value);
                }
            }
        }

        mapped
    }
}

fn some_non_null(value: serde_json::Value) -> Option<serde_json::Value> {
    match value {
        serde_json::Value::Null => None,
        v => Some(v),
    }
}

/// A raw record with fields resolved into canonical slots, ready for
/// normalization
#[derive(Debug, Default)]
pub struct MappedRecord {
    pub timestamp: Option<serde_json::Value>,
    pub label: Option<String>,
    pub value: Option<serde_json::Value>,
    pub unit: Option<serde_json::Value>,
    pub meta: serde_json::Map<String, serde_json::Value>,
}
