//! Failure handling for stage execution.
//!
//! Fail-fast stops at the first failed stage. Best-effort records the failure
//! and keeps running the remaining stages.

use crate::core::StageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How to handle stage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stop the run on the first failure (default).
    #[default]
    FailFast,
    /// Record failures and run every remaining stage.
    BestEffort,
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail_fast"),
            Self::BestEffort => write!(f, "best_effort"),
        }
    }
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fail_fast" => Ok(Self::FailFast),
            "best_effort" => Ok(Self::BestEffort),
            other => Err(format!("unknown failure mode '{other}'")),
        }
    }
}

/// Why a stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The stage returned a failure.
    Error,
    /// An attempt exceeded the stage timeout.
    Timeout,
    /// The run was cancelled while the stage was running.
    Cancelled,
}

/// Record of one stage failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// The failed stage.
    pub stage: StageId,
    /// Error message of the last attempt.
    pub error: String,
    /// Why it failed.
    pub kind: FailureKind,
    /// Whether the last error was transient.
    pub recoverable: bool,
    /// Attempts made.
    pub attempts: u32,
    /// When the failure was recorded.
    pub failed_at: DateTime<Utc>,
}

impl FailureRecord {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(stage: StageId, error: impl Into<String>) -> Self {
        Self {
            stage,
            error: error.into(),
            kind: FailureKind::Error,
            recoverable: false,
            attempts: 1,
            failed_at: Utc::now(),
        }
    }

    /// Sets the failure kind.
    #[must_use]
    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = kind;
        self
    }

    /// Marks the failure as transient.
    #[must_use]
    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }

    /// Sets the attempt count.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Summary of stage outcomes for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureSummary {
    /// Stages the workflow asked for.
    pub total_stages: usize,
    /// Stages that succeeded.
    pub completed_stages: usize,
    /// Stages that never ran because the run stopped.
    pub skipped_stages: Vec<StageId>,
    /// Failure records, in the order they happened.
    pub failures: Vec<FailureRecord>,
}

impl FailureSummary {
    /// Fraction of requested stages that succeeded.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_stages == 0 {
            return 0.0;
        }
        self.completed_stages as f64 / self.total_stages as f64
    }

    /// Returns true if any failures occurred.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Collects stage outcomes while a run executes.
#[derive(Debug)]
pub struct FailureCollector {
    mode: FailureMode,
    failures: Vec<FailureRecord>,
    completed: BTreeSet<StageId>,
}

impl FailureCollector {
    /// Creates a collector for `mode`.
    #[must_use]
    pub fn new(mode: FailureMode) -> Self {
        Self {
            mode,
            failures: Vec::new(),
            completed: BTreeSet::new(),
        }
    }

    /// The configured mode.
    #[must_use]
    pub fn mode(&self) -> FailureMode {
        self.mode
    }

    /// Records a stage failure.
    pub fn record_failure(&mut self, record: FailureRecord) {
        tracing::warn!(
            stage = %record.stage,
            error = %record.error,
            attempts = record.attempts,
            mode = %self.mode,
            "Stage failed"
        );
        self.failures.push(record);
    }

    /// Records a stage success.
    pub fn record_completion(&mut self, stage: StageId) {
        self.completed.insert(stage);
    }

    /// Whether `stage` has failed.
    #[must_use]
    pub fn has_failed(&self, stage: StageId) -> bool {
        self.failures.iter().any(|f| f.stage == stage)
    }

    /// Whether execution should stop.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        match self.mode {
            FailureMode::FailFast => !self.failures.is_empty(),
            FailureMode::BestEffort => false,
        }
    }

    /// Builds the summary for a workflow that requested `requested` stages.
    #[must_use]
    pub fn summary(&self, requested: &[StageId]) -> FailureSummary {
        let skipped_stages = requested
            .iter()
            .filter(|s| !self.completed.contains(s) && !self.has_failed(**s))
            .copied()
            .collect();
        FailureSummary {
            total_stages: requested.len(),
            completed_stages: self.completed.len(),
            skipped_stages,
            failures: self.failures.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_fast_stops_after_first_failure() {
        let mut collector = FailureCollector::new(FailureMode::FailFast);
        collector.record_completion(StageId::Market);
        assert!(!collector.should_stop());

        collector.record_failure(FailureRecord::new(StageId::Competitor, "search down"));
        assert!(collector.should_stop());
        assert!(collector.has_failed(StageId::Competitor));
    }

    #[test]
    fn test_best_effort_never_stops() {
        let mut collector = FailureCollector::new(FailureMode::BestEffort);
        collector.record_failure(FailureRecord::new(StageId::Market, "x"));
        collector.record_failure(FailureRecord::new(StageId::Persona, "y"));
        assert!(!collector.should_stop());
    }

    #[test]
    fn test_summary_lists_skipped_stages() {
        let mut collector = FailureCollector::new(FailureMode::FailFast);
        collector.record_completion(StageId::Market);
        collector.record_failure(
            FailureRecord::new(StageId::Competitor, "timeout")
                .with_kind(FailureKind::Timeout)
                .recoverable()
                .with_attempts(3),
        );

        let summary = collector.summary(&StageId::ALL);
        assert_eq!(summary.total_stages, 4);
        assert_eq!(summary.completed_stages, 1);
        assert_eq!(summary.skipped_stages, vec![StageId::Persona, StageId::Mvp]);
        assert!(summary.has_failures());
        assert!((summary.success_rate() - 0.25).abs() < f64::EPSILON);
        assert_eq!(summary.failures[0].attempts, 3);
    }

    #[test]
    fn test_failure_mode_from_str() {
        assert_eq!("best-effort".parse::<FailureMode>(), Ok(FailureMode::BestEffort));
        assert_eq!(FailureMode::default(), FailureMode::FailFast);
        assert!("sometimes".parse::<FailureMode>().is_err());
    }
}
