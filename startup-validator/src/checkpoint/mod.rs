//! Human checkpoint after MVP planning.
//!
//! When a run is interactive, the MVP result is handed to a [`Reviewer`]
//! before the report is assembled. The reviewer approves it, rejects it or
//! supplies an edited payload. [`Checkpoint::await_decision`] bounds the wait
//! with a timeout and the run's cancellation token.

mod console;
mod service;

pub use console::ConsoleReviewer;
pub use service::{ChannelReviewer, PendingReview, ReviewService};

use crate::cancellation::CancellationToken;
use crate::core::{StageId, StageResult};
use crate::errors::{ErrorInfo, InputValidationError, ValidatorError};
use crate::stages::MvpPlan;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// What the reviewer is asked to decide on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// Run the result belongs to.
    pub run_id: Uuid,
    /// Name of the idea.
    pub idea_name: String,
    /// The reviewed stage.
    pub stage: StageId,
    /// The payload as produced.
    pub payload: serde_json::Value,
}

impl ReviewRequest {
    /// Builds a request for `result`.
    #[must_use]
    pub fn new(run_id: Uuid, idea_name: impl Into<String>, result: &StageResult) -> Self {
        Self {
            run_id,
            idea_name: idea_name.into(),
            stage: result.stage(),
            payload: result.payload().clone(),
        }
    }

    /// Short human-readable summary of the MVP proposal.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let plan: MvpPlan = serde_json::from_value(self.payload.clone()).unwrap_or_default();
        let mut lines = vec![format!("MVP proposal for {}", self.idea_name)];
        if !plan.features.is_empty() {
            lines.push("Features:".to_string());
            for feature in &plan.features {
                lines.push(format!("  - {} (priority {})", feature.name, feature.priority));
            }
        }
        if !plan.tech_stack.is_empty() {
            let stack: Vec<&str> = plan.tech_stack.iter().map(|c| c.name.as_str()).collect();
            lines.push(format!("Tech stack: {}", stack.join(", ")));
        }
        if plan.development_time.weeks > 0.0 {
            lines.push(format!(
                "Timeline: {:.1} weeks ({:.1} months)",
                plan.development_time.weeks, plan.development_time.months
            ));
        }
        if plan.cost_estimate.max > 0.0 {
            lines.push(format!(
                "Cost: {:.0} - {:.0} {}",
                plan.cost_estimate.min, plan.cost_estimate.max, plan.cost_estimate.currency
            ));
        }
        lines
    }
}

/// A reviewer's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Proceed with the payload as produced.
    Approve,
    /// Stop the run.
    Reject {
        /// Why the proposal was rejected.
        reason: String,
    },
    /// Proceed with a replacement payload.
    Edit {
        /// The replacement payload. Must be a JSON object.
        payload: serde_json::Value,
    },
}

/// Someone (or something) who decides on an MVP proposal.
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Reviewer name, recorded in the report.
    fn name(&self) -> &str;

    /// Waits for a decision on `request`.
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewDecision, ValidatorError>;
}

/// Approves everything at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl Reviewer for AutoApprove {
    fn name(&self) -> &str {
        "auto"
    }

    async fn review(&self, _request: &ReviewRequest) -> Result<ReviewDecision, ValidatorError> {
        Ok(ReviewDecision::Approve)
    }
}

/// How the checkpoint ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointOutcome {
    /// Keep the original payload.
    Approved,
    /// Use this payload instead.
    Edited(serde_json::Value),
    /// Stop the run.
    Rejected {
        /// The reviewer's reason.
        reason: String,
    },
    /// No decision within the timeout.
    TimedOut,
}

/// The pause point between MVP planning and report assembly.
#[derive(Clone)]
pub struct Checkpoint {
    reviewer: Arc<dyn Reviewer>,
}

impl Checkpoint {
    /// Creates a checkpoint that asks `reviewer`.
    #[must_use]
    pub fn new(reviewer: Arc<dyn Reviewer>) -> Self {
        Self { reviewer }
    }

    /// The reviewer's name.
    #[must_use]
    pub fn reviewer_name(&self) -> &str {
        self.reviewer.name()
    }

    /// Waits for the reviewer, at most `timeout`.
    ///
    /// Cancellation of the run wins over a pending decision and is returned
    /// as [`ValidatorError::Cancelled`].
    pub async fn await_decision(
        &self,
        request: &ReviewRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CheckpointOutcome, ValidatorError> {
        let decision = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(ValidatorError::Cancelled(
                    cancel.reason().unwrap_or_else(|| "cancelled during review".to_string()),
                ));
            }
            decided = tokio::time::timeout(timeout, self.reviewer.review(request)) => {
                match decided {
                    Ok(decision) => decision?,
                    Err(_) => {
                        tracing::warn!(
                            run_id = %request.run_id,
                            timeout_secs = timeout.as_secs(),
                            "Checkpoint timed out waiting for a decision"
                        );
                        return Ok(CheckpointOutcome::TimedOut);
                    }
                }
            }
        };

        match decision {
            ReviewDecision::Approve => Ok(CheckpointOutcome::Approved),
            ReviewDecision::Reject { reason } => Ok(CheckpointOutcome::Rejected { reason }),
            ReviewDecision::Edit { payload } if payload.is_object() => {
                Ok(CheckpointOutcome::Edited(payload))
            }
            ReviewDecision::Edit { .. } => {
                let info = ErrorInfo::new("INPUT-003-EDIT", "Edited payload is not an object")
                    .with_fix_hint("Supply the edited MVP plan as a JSON object.");
                Err(InputValidationError::new("Reviewer edit must be a JSON object")
                    .with_fields(vec!["payload".to_string()])
                    .with_error_info(info)
                    .into())
            }
        }
    }
}

impl std::fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkpoint")
            .field("reviewer", &self.reviewer.name())
            .finish()
    }
}
