//! Run identity for tracking validation runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this run (time ordered).
    pub run_id: Uuid,

    /// Caller-supplied correlation ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// When the run was created.
    pub started_at: DateTime<Utc>,
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl RunIdentity {
    /// Creates a new run identity with a generated run ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            correlation_id: None,
            started_at: Utc::now(),
        }
    }

    /// Sets the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identities_are_unique() {
        let a = RunIdentity::new();
        let b = RunIdentity::new();
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_correlation_id_skipped_when_absent() {
        let identity = RunIdentity::new();
        let value = serde_json::to_value(&identity).unwrap();
        assert!(value.get("correlation_id").is_none());

        let tagged = identity.with_correlation_id("batch-7");
        assert_eq!(tagged.correlation_id.as_deref(), Some("batch-7"));
    }
}
