//! The final validation report.

use super::{Score, ScoreBand, StageId, StageResult, StartupIdea};
use crate::pipeline::{FailureRecord, Workflow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

const VOLATILE_REPORT_FIELDS: [&str; 3] = ["created_at", "report_id", "run_id"];
const VOLATILE_RESULT_FIELDS: [&str; 3] = ["started_at", "recorded_at", "duration_ms"];

/// Terminal state of a run, as recorded in its report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Every requested stage succeeded and no reviewer objected.
    Complete,
    /// Best-effort run in which at least one stage failed.
    Degraded,
    /// The run stopped early: fail-fast abort or an unanswered checkpoint.
    Incomplete,
    /// The reviewer rejected the MVP proposal.
    Rejected,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Degraded => write!(f, "degraded"),
            Self::Incomplete => write!(f, "incomplete"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// How the checkpoint was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    /// Proceeded with the original payload.
    Approved,
    /// Proceeded with a replacement payload.
    Edited,
    /// Stopped by the reviewer.
    Rejected,
    /// No decision arrived in time.
    TimedOut,
}

impl fmt::Display for ReviewOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Edited => write!(f, "edited"),
            Self::Rejected => write!(f, "rejected"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Record of the human checkpoint, when one ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// The decision.
    pub outcome: ReviewOutcome,
    /// Which reviewer decided.
    pub reviewer: String,
    /// Reason given on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the decision was taken.
    pub decided_at: DateTime<Utc>,
}

/// The persisted output of one validation run.
///
/// Built once by the assembler and never mutated afterwards; all fields are
/// read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub(crate) report_id: Uuid,
    pub(crate) run_id: Uuid,
    pub(crate) workflow: Workflow,
    pub(crate) status: ReportStatus,
    pub(crate) idea: StartupIdea,
    pub(crate) stage_results: Vec<StageResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) precursors: Vec<StageResult>,
    pub(crate) score: Score,
    pub(crate) score_band: ScoreBand,
    pub(crate) recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) review: Option<ReviewRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) failures: Vec<FailureRecord>,
    pub(crate) created_at: DateTime<Utc>,
}

impl ValidationReport {
    /// Report identifier.
    #[must_use]
    pub fn report_id(&self) -> Uuid {
        self.report_id
    }

    /// Identifier of the run that produced the report.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The workflow that was executed.
    #[must_use]
    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    /// Terminal state.
    #[must_use]
    pub fn status(&self) -> ReportStatus {
        self.status
    }

    /// The evaluated idea.
    #[must_use]
    pub fn idea(&self) -> &StartupIdea {
        &self.idea
    }

    /// Results of the stages the workflow ran, in execution order.
    #[must_use]
    pub fn stage_results(&self) -> &[StageResult] {
        &self.stage_results
    }

    /// Externally supplied results used as stage inputs.
    #[must_use]
    pub fn precursors(&self) -> &[StageResult] {
        &self.precursors
    }

    /// The validation score.
    #[must_use]
    pub fn score(&self) -> Score {
        self.score
    }

    /// The score band.
    #[must_use]
    pub fn score_band(&self) -> ScoreBand {
        self.score_band
    }

    /// Recommendation text, most specific first.
    #[must_use]
    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    /// The checkpoint record, if a checkpoint ran.
    #[must_use]
    pub fn review(&self) -> Option<&ReviewRecord> {
        self.review.as_ref()
    }

    /// Stage failures, in the order they happened.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// When the report was assembled.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Stage identifiers of the recorded results, in order.
    #[must_use]
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stage_results.iter().map(StageResult::stage).collect()
    }

    /// The result for one stage, if it was recorded.
    #[must_use]
    pub fn result_for(&self, stage: StageId) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| r.stage() == stage)
    }

    /// Stages that were recorded as failed.
    #[must_use]
    pub fn failed_stages(&self) -> Vec<StageId> {
        self.stage_results
            .iter()
            .filter(|r| !r.is_success())
            .map(StageResult::stage)
            .collect()
    }

    /// SHA-256 over the report content with identifiers and timing removed.
    ///
    /// Two runs over the same idea, workflow and provider responses yield the
    /// same digest.
    pub fn content_digest(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(object) = value.as_object_mut() {
            for field in VOLATILE_REPORT_FIELDS {
                object.remove(field);
            }
            for list in ["stage_results", "precursors"] {
                if let Some(results) = object.get_mut(list).and_then(|v| v.as_array_mut()) {
                    for result in results.iter_mut().filter_map(|r| r.as_object_mut()) {
                        for field in VOLATILE_RESULT_FIELDS {
                            result.remove(field);
                        }
                    }
                }
            }
            if let Some(failures) = object.get_mut("failures").and_then(|v| v.as_array_mut()) {
                for failure in failures.iter_mut().filter_map(|f| f.as_object_mut()) {
                    failure.remove("failed_at");
                }
            }
            if let Some(review) = object.get_mut("review").and_then(|v| v.as_object_mut()) {
                review.remove("decided_at");
            }
        }
        let bytes = serde_json::to_vec(&value)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}
