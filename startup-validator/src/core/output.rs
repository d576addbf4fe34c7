//! Stage output type with factory methods.

use super::StageStatus;
use crate::errors::ProviderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a single stage attempt returns to the runner.
///
/// The runner turns the final attempt into an immutable
/// [`StageResult`](super::StageResult).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// The status of the attempt.
    pub status: StageStatus,

    /// The structured payload (for successful attempts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Error message (for failed attempts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Whether another attempt could succeed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,

    /// Additional metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl StageOutput {
    fn with_status(status: StageStatus) -> Self {
        Self {
            status,
            payload: None,
            error: None,
            retryable: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Creates a successful output with a payload.
    #[must_use]
    pub fn ok(payload: serde_json::Value) -> Self {
        Self {
            payload: Some(payload),
            ..Self::with_status(StageStatus::Ok)
        }
    }

    /// Creates a successful output from a typed payload.
    ///
    /// A payload that cannot be serialized becomes a non-retryable failure.
    #[must_use]
    pub fn ok_typed<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => Self::ok(value),
            Err(e) => Self::fail(format!("payload serialization failed: {e}")),
        }
    }

    /// Creates a failure output with an error message.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_status(StageStatus::Fail)
        }
    }

    /// Creates a retryable failure output.
    #[must_use]
    pub fn fail_retryable(error: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::fail(error)
        }
    }

    /// Creates a cancel output with a reason.
    #[must_use]
    pub fn cancel(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::with_status(StageStatus::Cancel)
        }
    }

    /// Converts a provider error into a failure, keeping its retry class.
    #[must_use]
    pub fn from_provider_error(err: &ProviderError) -> Self {
        if err.is_retryable() {
            Self::fail_retryable(err.to_string())
        } else {
            Self::fail(err.to_string())
        }
    }

    /// Adds a single metadata entry.
    #[must_use]
    pub fn add_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true if the output indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the output can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable && self.status == StageStatus::Fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_output() {
        let output = StageOutput::ok(json!({"growth_rate": 12.5}));
        assert!(output.is_success());
        assert_eq!(output.payload, Some(json!({"growth_rate": 12.5})));
        assert!(output.error.is_none());
    }

    #[test]
    fn test_fail_retryable() {
        let output = StageOutput::fail_retryable("rate limited");
        assert!(!output.is_success());
        assert!(output.is_retryable());
        assert_eq!(output.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn test_cancel_is_never_retryable() {
        let mut output = StageOutput::cancel("shutdown");
        output.retryable = true;
        assert!(!output.is_retryable());
    }

    #[test]
    fn test_from_provider_error() {
        let retryable = StageOutput::from_provider_error(&ProviderError::Http {
            provider: "serper".to_string(),
            status: 503,
        });
        let fatal = StageOutput::from_provider_error(&ProviderError::not_configured(
            "serpapi",
            "missing key",
        ));

        assert!(retryable.is_retryable());
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn test_metadata_serialization_skips_empty() {
        let output = StageOutput::ok(json!({}));
        let value = serde_json::to_value(&output).unwrap();
        assert!(value.get("metadata").is_none());

        let tagged = output.add_metadata("source", json!("offline"));
        assert_eq!(tagged.metadata.get("source"), Some(&json!("offline")));
    }
}
