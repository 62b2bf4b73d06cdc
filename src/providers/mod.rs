//! Live-metric provider boundary
//!
//! Wearable vendors are consumed through the [`LiveMetricProvider`]
//! capability: the core never performs network I/O, token refresh, or
//! retries. A provider returning [`EngineError::AuthError`] surfaces that
//! error to the caller untouched.

mod fitbit;

pub use fitbit::FitbitAdapter;

use crate::error::EngineError;
use crate::types::LiveMetricSample;

/// Capability for fetching the latest live metric sample for a user
pub trait LiveMetricProvider {
    fn fetch_live_metric(&self, user_id: &str) -> Result<LiveMetricSample, EngineError>;
}
