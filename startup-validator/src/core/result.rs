//! Immutable per-stage results.

use super::StageId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a stage result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
    /// Produced by running the stage in this run.
    #[default]
    Live,
    /// Supplied by the caller in place of running the stage.
    Injected,
}

impl fmt::Display for ResultOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Injected => write!(f, "injected"),
        }
    }
}

/// The result of one stage in one run.
///
/// Created exactly once per stage per run and never mutated afterwards.
/// A reviewer edit produces a new value through [`StageResult::with_payload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    stage: StageId,
    success: bool,
    payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    origin: ResultOrigin,
    attempts: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    edited: bool,
    started_at: DateTime<Utc>,
    recorded_at: DateTime<Utc>,
    duration_ms: u64,
}

impl StageResult {
    fn build(
        stage: StageId,
        success: bool,
        payload: serde_json::Value,
        error: Option<String>,
        origin: ResultOrigin,
        attempts: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        let recorded_at = Utc::now();
        let duration_ms = u64::try_from((recorded_at - started_at).num_milliseconds()).unwrap_or(0);
        Self {
            stage,
            success,
            payload,
            error,
            origin,
            attempts,
            edited: false,
            started_at,
            recorded_at,
            duration_ms,
        }
    }

    /// A successful live result.
    #[must_use]
    pub fn completed(
        stage: StageId,
        payload: serde_json::Value,
        started_at: DateTime<Utc>,
        attempts: u32,
    ) -> Self {
        Self::build(stage, true, payload, None, ResultOrigin::Live, attempts, started_at)
    }

    /// A failed live result. The payload is recorded as an empty object.
    #[must_use]
    pub fn failed(
        stage: StageId,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
        attempts: u32,
    ) -> Self {
        Self::build(
            stage,
            false,
            serde_json::Value::Object(serde_json::Map::new()),
            Some(error.into()),
            ResultOrigin::Live,
            attempts,
            started_at,
        )
    }

    /// A result supplied by the caller instead of being computed.
    #[must_use]
    pub fn injected(stage: StageId, payload: serde_json::Value) -> Self {
        Self::build(stage, true, payload, None, ResultOrigin::Injected, 0, Utc::now())
    }

    /// Sets the record time, for results rebuilt from a known timeline.
    #[must_use]
    pub fn with_recorded_at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = recorded_at;
        self.duration_ms =
            u64::try_from((recorded_at - self.started_at).num_milliseconds()).unwrap_or(0);
        self
    }

    /// Returns a copy with the payload replaced, marked as edited.
    #[must_use]
    pub fn with_payload(&self, payload: serde_json::Value) -> Self {
        Self {
            payload,
            edited: true,
            recorded_at: Utc::now(),
            ..self.clone()
        }
    }

    /// The stage this result belongs to.
    #[must_use]
    pub fn stage(&self) -> StageId {
        self.stage
    }

    /// Whether the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// The structured payload.
    #[must_use]
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// The error message of a failed stage.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Where the result came from.
    #[must_use]
    pub fn origin(&self) -> ResultOrigin {
        self.origin
    }

    /// How many attempts were made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether a reviewer replaced the payload.
    #[must_use]
    pub fn is_edited(&self) -> bool {
        self.edited
    }

    /// When the first attempt started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the result was recorded.
    #[must_use]
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Wall time between start and record.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Reads the payload as a typed analysis, tolerating missing fields.
    ///
    /// Payloads that do not fit the type at all yield `T::default()`.
    #[must_use]
    pub fn payload_as<T: DeserializeOwned + Default>(&self) -> T {
        match serde_json::from_value(self.payload.clone()) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(stage = %self.stage, error = %e, "Payload does not match typed shape");
                T::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completed_result() {
        let result = StageResult::completed(StageId::Market, json!({"growth_rate": 4.0}), Utc::now(), 1);
        assert!(result.is_success());
        assert_eq!(result.stage(), StageId::Market);
        assert_eq!(result.origin(), ResultOrigin::Live);
        assert!(result.error().is_none());
    }

    #[test]
    fn test_failed_result_has_empty_payload() {
        let result = StageResult::failed(StageId::Competitor, "search down", Utc::now(), 3);
        assert!(!result.is_success());
        assert_eq!(result.payload(), &json!({}));
        assert_eq!(result.error(), Some("search down"));
        assert_eq!(result.attempts(), 3);
    }

    #[test]
    fn test_with_payload_leaves_original_untouched() {
        let original = StageResult::completed(StageId::Mvp, json!({"features": []}), Utc::now(), 1);
        let edited = original.with_payload(json!({"features": ["Login"]}));

        assert_eq!(original.payload(), &json!({"features": []}));
        assert!(!original.is_edited());
        assert_eq!(edited.payload(), &json!({"features": ["Login"]}));
        assert!(edited.is_edited());
        assert_eq!(edited.stage(), StageId::Mvp);
    }

    #[test]
    fn test_with_recorded_at_fixes_timing() {
        use chrono::TimeZone;
        let started = Utc.with_ymd_and_hms(2026, 1, 2, 3, 0, 0).unwrap();
        let recorded = started + chrono::Duration::milliseconds(1500);

        let first = StageResult::completed(StageId::Market, json!({}), started, 1).with_recorded_at(recorded);
        let second = StageResult::completed(StageId::Market, json!({}), started, 1).with_recorded_at(recorded);

        assert_eq!(first.recorded_at(), recorded);
        assert_eq!(first.duration_ms(), 1500);
        assert_eq!(first, second);
    }

    #[test]
    fn test_injected_result() {
        let result = StageResult::injected(StageId::Market, json!({"market_size_usd": 5e8}));
        assert_eq!(result.origin(), ResultOrigin::Injected);
        assert_eq!(result.attempts(), 0);
        assert!(result.is_success());
    }

    #[test]
    fn test_payload_as_tolerates_mismatch() {
        #[derive(Debug, Default, Deserialize, PartialEq)]
        struct Shape {
            #[serde(default)]
            count: u32,
        }

        let good = StageResult::completed(StageId::Market, json!({"count": 3}), Utc::now(), 1);
        let bad = StageResult::completed(StageId::Market, json!([1, 2, 3]), Utc::now(), 1);

        assert_eq!(good.payload_as::<Shape>(), Shape { count: 3 });
        assert_eq!(bad.payload_as::<Shape>(), Shape::default());
    }
}
