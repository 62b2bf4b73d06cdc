//! Engine orchestration
//!
//! [`CoherenceEngine`] wires the pipeline together: uploads run parser ->
//! field mapper -> normalizer -> event store, check-ins and live samples run
//! buffer -> {trend detector, coherence scorer}. The engine owns all mutable
//! state explicitly; callers never touch storage directly.

use crate::buffer::CheckInBuffer;
use crate::error::EngineError;
use crate::mapper::FieldMap;
use crate::normalizer::{self, RejectReason};
use crate::parser::{self, UploadFormat};
use crate::providers::LiveMetricProvider;
use crate::scoring;
use crate::store::{EventStore, MemoryEventStore};
use crate::trend;
use crate::types::{CanonicalEvent, CheckIn, CheckInOutcome, IngestSummary, Trend};
use chrono::{DateTime, Utc};

/// Capability for turning a scored check-in into a user-facing message.
///
/// Invoked only after scoring. A generator failure is reported alongside the
/// already-computed outcome; it can never corrupt or replace it.
pub trait MessageGenerator {
    fn generate(&self, score: f64, trend: Trend, text: &str) -> Result<String, EngineError>;
}

/// The biometric signal normalization and coherence engine.
///
/// Constructed once per process; the event store is injectable so a durable
/// backend can replace the in-memory baseline behind the same trait.
pub struct CoherenceEngine<S: EventStore = MemoryEventStore> {
    buffer: CheckInBuffer,
    store: S,
    field_map: FieldMap,
}

impl Default for CoherenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CoherenceEngine {
    /// Create an engine with the in-memory baseline store
    pub fn new() -> Self {
        Self::with_store(MemoryEventStore::new())
    }
}

impl<S: EventStore> CoherenceEngine<S> {
    /// Create an engine over a specific event store backend
    pub fn with_store(store: S) -> Self {
        Self {
            buffer: CheckInBuffer::default(),
            store,
            field_map: FieldMap::default(),
        }
    }

    /// Replace the field-mapping table (deployment configuration)
    pub fn with_field_map(mut self, field_map: FieldMap) -> Self {
        self.field_map = field_map;
        self
    }

    /// Record a check-in: validate vitals, store it in the user's bounded
    /// history, score it, and classify the post-insert trend.
    pub fn check_in(&self, checkin: CheckIn) -> Result<CheckInOutcome, EngineError> {
        scoring::validate_vitals(checkin.breath_rate, checkin.hrv)?;

        let coherence_score = scoring::coherence_score(checkin.breath_rate, checkin.hrv);
        let history = self.buffer.record(checkin);
        let trend = trend::detect(&history);

        Ok(CheckInOutcome {
            coherence_score,
            trend,
        })
    }

    /// Record a check-in and ask the generator for a message. The outcome is
    /// computed first and returned intact even when generation fails.
    pub fn check_in_with_message(
        &self,
        checkin: CheckIn,
        generator: &dyn MessageGenerator,
    ) -> Result<(CheckInOutcome, Result<String, EngineError>), EngineError> {
        let text = checkin.text.clone();
        let outcome = self.check_in(checkin)?;
        let message = generator.generate(outcome.coherence_score, outcome.trend, &text);
        if let Err(e) = &message {
            log::warn!("message generation failed: {e}");
        }
        Ok((outcome, message))
    }

    /// Fetch the latest live sample from a wearable provider and run it
    /// through the check-in path. Provider auth errors surface as-is.
    pub fn record_live_sample(
        &self,
        user_id: &str,
        provider: &dyn LiveMetricProvider,
    ) -> Result<CheckInOutcome, EngineError> {
        let sample = provider.fetch_live_metric(user_id)?;
        self.check_in(CheckIn {
            user_id: user_id.to_string(),
            text: String::new(),
            breath_rate: sample.breath_rate,
            hrv: sample.hrv,
            timestamp: sample.timestamp,
        })
    }

    /// Current history snapshot for a user (empty for unknown users)
    pub fn history(&self, user_id: &str) -> Vec<CheckIn> {
        self.buffer.history(user_id)
    }

    /// Ingest an upload batch into the event store.
    ///
    /// Row-level failures (malformed records, normalization rejections,
    /// duplicates) are counted as dropped; only structural failures return
    /// `Err`. The summary upholds `ingested + dropped == records in input`.
    pub fn ingest(
        &mut self,
        content: &[u8],
        format: UploadFormat,
        tz_override: Option<&str>,
    ) -> Result<IngestSummary, EngineError> {
        let reference_tz = normalizer::resolve_timezone(tz_override)?;
        let batch = parser::parse_upload(content, format)?;
        let mut rows_dropped = batch.malformed;

        let mut resolved = Vec::with_capacity(batch.records.len());
        for record in batch.records {
            let mapped = self.field_map.map_record(record);
            match mapped.label.clone() {
                Some(label) => {
                    let (signal, original_label) = self.field_map.resolve_label(&label);
                    resolved.push((mapped, signal, original_label));
                }
                None => {
                    log::warn!("dropping record: {}", RejectReason::MissingSignal.as_str());
                    rows_dropped += 1;
                }
            }
        }

        let outcome = normalizer::normalize_batch(resolved, reference_tz);
        rows_dropped += outcome.rows_dropped;

        let mut rows_ingested = 0;
        for event in outcome.events {
            if self.store.append(event) {
                rows_ingested += 1;
            } else {
                // Identical (timestamp, signal, value) already stored
                rows_dropped += 1;
            }
        }

        let summary = IngestSummary::new(rows_ingested, rows_dropped);
        log::info!(
            "upload complete: ingested={} dropped={}",
            summary.rows_ingested,
            summary.rows_dropped
        );
        Ok(summary)
    }

    /// Stored events in `[since, until)`, ascending by timestamp
    pub fn events_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Vec<CanonicalEvent> {
        self.store.query(since, until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IngestStatus, LiveMetricSample, MetricValue, Signal};
    use pretty_assertions::assert_eq;

    fn checkin(user: &str, breath_rate: f64, hrv: f64) -> CheckIn {
        CheckIn {
            user_id: user.to_string(),
            text: "feeling ok".to_string(),
            breath_rate,
            hrv,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_check_in_scores_and_trends() {
        let engine = CoherenceEngine::new();

        let o1 = engine.check_in(checkin("u1", 20.0, 50.0)).unwrap();
        assert_eq!(o1.coherence_score, 55.0);
        assert_eq!(o1.trend, Trend::None);

        let o2 = engine.check_in(checkin("u1", 22.0, 47.0)).unwrap();
        assert_eq!(o2.coherence_score, 43.5);
        assert_eq!(o2.trend, Trend::Rising);

        let o3 = engine.check_in(checkin("u1", 24.0, 38.0)).unwrap();
        assert_eq!(o3.coherence_score, 29.0);
        assert_eq!(o3.trend, Trend::Rising);

        // A drop back down breaks the strict increase
        let o4 = engine.check_in(checkin("u1", 20.0, 50.0)).unwrap();
        assert_eq!(o4.trend, Trend::Stable);
    }

    #[test]
    fn test_invalid_vitals_rejected_at_boundary() {
        let engine = CoherenceEngine::new();
        assert!(matches!(
            engine.check_in(checkin("u1", -2.0, 50.0)),
            Err(EngineError::ValidationError(_))
        ));
        assert!(matches!(
            engine.check_in(checkin("u1", 16.0, -1.0)),
            Err(EngineError::ValidationError(_))
        ));
        // Rejected check-ins never enter the history
        assert!(engine.history("u1").is_empty());
    }

    struct FixedGenerator;
    struct FailingGenerator;

    impl MessageGenerator for FixedGenerator {
        fn generate(&self, score: f64, trend: Trend, _text: &str) -> Result<String, EngineError> {
            Ok(format!("score {score}, trend {}", trend.as_str()))
        }
    }

    impl MessageGenerator for FailingGenerator {
        fn generate(&self, _: f64, _: Trend, _: &str) -> Result<String, EngineError> {
            Err(EngineError::GenerationError("model offline".to_string()))
        }
    }

    #[test]
    fn test_generator_runs_after_scoring() {
        let engine = CoherenceEngine::new();
        let (outcome, message) = engine
            .check_in_with_message(checkin("u1", 20.0, 50.0), &FixedGenerator)
            .unwrap();
        assert_eq!(outcome.coherence_score, 55.0);
        assert_eq!(message.unwrap(), "score 55, trend none");
    }

    #[test]
    fn test_generator_failure_leaves_outcome_intact() {
        let engine = CoherenceEngine::new();
        let (outcome, message) = engine
            .check_in_with_message(checkin("u1", 20.0, 50.0), &FailingGenerator)
            .unwrap();
        assert_eq!(outcome.coherence_score, 55.0);
        assert!(matches!(message, Err(EngineError::GenerationError(_))));
        // The check-in was still recorded
        assert_eq!(engine.history("u1").len(), 1);
    }

    struct StubProvider;
    struct ExpiredProvider;

    impl LiveMetricProvider for StubProvider {
        fn fetch_live_metric(&self, _user_id: &str) -> Result<LiveMetricSample, EngineError> {
            Ok(LiveMetricSample {
                breath_rate: 20.0,
                hrv: 50.0,
                timestamp: Utc::now(),
            })
        }
    }

    impl LiveMetricProvider for ExpiredProvider {
        fn fetch_live_metric(&self, _user_id: &str) -> Result<LiveMetricSample, EngineError> {
            Err(EngineError::AuthError("token expired".to_string()))
        }
    }

    #[test]
    fn test_live_sample_runs_check_in_path() {
        let engine = CoherenceEngine::new();
        let outcome = engine.record_live_sample("u1", &StubProvider).unwrap();
        assert_eq!(outcome.coherence_score, 55.0);
        assert_eq!(engine.history("u1").len(), 1);
    }

    #[test]
    fn test_auth_error_surfaces_untouched() {
        let engine = CoherenceEngine::new();
        assert!(matches!(
            engine.record_live_sample("u1", &ExpiredProvider),
            Err(EngineError::AuthError(_))
        ));
        assert!(engine.history("u1").is_empty());
    }

    #[test]
    fn test_ingest_csv_with_malformed_rows() {
        let csv = "timestamp,signal,value,unit\n\
                   2025-08-17T17:00:00Z,ecg,0.8,mV\n\
                   ,ecg,0.9,mV\n\
                   2025-08-17T17:00:02Z,,0.9,mV\n\
                   2025-08-17T17:00:03Z,ecg,1.0,mV\n";
        let mut engine = CoherenceEngine::new();
        let summary = engine.ingest(csv.as_bytes(), UploadFormat::Csv, None).unwrap();

        assert_eq!(summary.status, IngestStatus::Partial);
        assert_eq!(summary.rows_ingested, 2);
        assert_eq!(summary.rows_dropped, 2);
    }

    #[test]
    fn test_ingest_counts_duplicates_as_dropped() {
        let csv = "timestamp,signal,value\n\
                   2025-08-17T17:00:02Z,ecg,0.9\n\
                   2025-08-17T17:00:00Z,ecg,0.8\n\
                   2025-08-17T17:00:00Z,ecg,0.8\n\
                   2025-08-17T17:00:01Z,r_peak,\n";
        let mut engine = CoherenceEngine::new();
        let summary = engine.ingest(csv.as_bytes(), UploadFormat::Csv, None).unwrap();

        assert_eq!(summary.rows_ingested, 3);
        assert_eq!(summary.rows_dropped, 1);

        // Re-ingesting the same batch is idempotent: everything is a dup now
        let summary = engine.ingest(csv.as_bytes(), UploadFormat::Csv, None).unwrap();
        assert_eq!(summary.rows_ingested, 0);
        assert_eq!(summary.rows_dropped, 4);
        assert_eq!(summary.status, IngestStatus::Error);
    }

    #[test]
    fn test_ingest_label_mapping_end_to_end() {
        let json = r#"[
            {"Timestamp": "2025-08-17T17:00:00Z", "Event Type": "R-peak"},
            {"Timestamp": "2025-08-17T17:00:01Z", "Event Type": "Weird Label"}
        ]"#;
        let mut engine = CoherenceEngine::new();
        let summary = engine
            .ingest(json.as_bytes(), UploadFormat::Json, None)
            .unwrap();
        assert_eq!(summary.rows_ingested, 2);

        let events = engine.events_between(
            "2025-08-17T00:00:00Z".parse().unwrap(),
            "2025-08-18T00:00:00Z".parse().unwrap(),
        );
        assert_eq!(events[0].signal, Signal::RPeak);
        assert_eq!(events[1].signal, Signal::MarkedEvent);
        assert_eq!(
            events[1].metadata["original_label"],
            MetricValue::String("Weird Label".to_string())
        );
    }

    #[test]
    fn test_ingest_tz_override() {
        let json = r#"[{"timestamp": "2025-01-15 09:00:00", "signal": "ecg", "value": 0.8, "unit": "mV"}]"#;
        let mut engine = CoherenceEngine::new();
        engine
            .ingest(json.as_bytes(), UploadFormat::Json, Some("America/New_York"))
            .unwrap();

        let events = engine.events_between(
            "2025-01-15T00:00:00Z".parse().unwrap(),
            "2025-01-16T00:00:00Z".parse().unwrap(),
        );
        assert_eq!(events[0].timestamp.to_rfc3339(), "2025-01-15T14:00:00+00:00");
    }

    #[test]
    fn test_ingest_invalid_tz_override_aborts() {
        let mut engine = CoherenceEngine::new();
        let result = engine.ingest(b"[]", UploadFormat::Json, Some("Not/AZone"));
        assert!(matches!(result, Err(EngineError::InvalidTimezone(_))));
    }

    #[test]
    fn test_ingest_structural_failure_aborts() {
        let mut engine = CoherenceEngine::new();
        assert!(engine
            .ingest(b"definitely not json", UploadFormat::Json, None)
            .is_err());
    }

    #[test]
    fn test_empty_batch_is_success() {
        let mut engine = CoherenceEngine::new();
        let summary = engine.ingest(b"[]", UploadFormat::Json, None).unwrap();
        assert_eq!(summary.status, IngestStatus::Success);
        assert_eq!(summary.rows_ingested, 0);
        assert_eq!(summary.rows_dropped, 0);
    }
}
