//! Coherence Engine - biometric signal normalization and coherence scoring
//!
//! The engine ingests biometric time-series from heterogeneous sources and
//! turns them into a bounded per-user history with trend detection and a
//! deterministic coherence score, through a row-isolated pipeline:
//! format parsing -> field mapping -> normalization -> time-indexed storage.
//!
//! ## Modules
//!
//! - **Ingestion**: CSV/JSON uploads into canonical, deduplicated events
//! - **Check-ins**: bounded per-user history, trend detection, coherence score
//! - **Boundaries**: live-metric providers and message generation as traits

pub mod buffer;
pub mod error;
pub mod mapper;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod providers;
pub mod scoring;
pub mod store;
pub mod trend;
pub mod types;

pub use buffer::{CheckInBuffer, HISTORY_CAPACITY};
pub use error::EngineError;
pub use mapper::FieldMap;
pub use parser::UploadFormat;
pub use pipeline::{CoherenceEngine, MessageGenerator};
pub use providers::{FitbitAdapter, LiveMetricProvider};
pub use scoring::coherence_score;
pub use store::{EventStore, MemoryEventStore};
pub use types::{
    CanonicalEvent, CheckIn, CheckInOutcome, IngestStatus, IngestSummary, LiveMetricSample,
    Signal, Trend, Unit,
};

/// Engine version embedded in CLI output
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
