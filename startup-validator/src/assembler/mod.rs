//! Report assembly and persistence.
//!
//! The assembler turns the results of one run into an immutable
//! [`ValidationReport`]: it reads [`Findings`] from the stage payloads,
//! scores them with a [`ScoreCard`] and derives recommendations. It performs
//! no I/O and reads no clock; identifiers and timestamps come from the
//! caller so identical inputs yield identical reports.
//!
//! [`ReportStore`] writes the report and the per-stage results to disk.

mod findings;
mod recommendations;
mod scoring;
mod store;

pub use findings::Findings;
pub use recommendations::recommend;
pub use scoring::{ScoreCard, ScoreFactor, BASE_SCORE};
pub use store::{PersistedReport, ReportStore};

use crate::core::{
    ReportStatus, ReviewOutcome, ReviewRecord, StageResult, StartupIdea, ValidationReport,
};
use crate::pipeline::{FailureMode, FailureRecord, FailureSummary, Workflow};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Everything a report is built from.
#[derive(Debug, Clone)]
pub struct AssemblyInput {
    /// Identifier for the new report.
    pub report_id: Uuid,
    /// The run that produced the results.
    pub run_id: Uuid,
    /// Executed workflow.
    pub workflow: Workflow,
    /// Terminal state.
    pub status: ReportStatus,
    /// The evaluated idea.
    pub idea: StartupIdea,
    /// Live results, in execution order.
    pub stage_results: Vec<StageResult>,
    /// Injected results.
    pub precursors: Vec<StageResult>,
    /// Checkpoint record.
    pub review: Option<ReviewRecord>,
    /// Stage failures.
    pub failures: Vec<FailureRecord>,
    /// Assembly time.
    pub created_at: DateTime<Utc>,
}

/// Builds reports from run results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportAssembler;

impl ReportAssembler {
    /// Creates an assembler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Scores the results and builds the report.
    #[must_use]
    pub fn assemble(&self, input: AssemblyInput) -> ValidationReport {
        let findings = Findings::collect(&input.stage_results, &input.precursors);
        let card = ScoreCard::evaluate(&findings);
        let score = card.score();

        tracing::debug!(
            run_id = %input.run_id,
            raw_score = card.raw(),
            score = score.value(),
            factors = card.factors().len(),
            "Scored validation results"
        );

        ValidationReport {
            report_id: input.report_id,
            run_id: input.run_id,
            workflow: input.workflow,
            status: input.status,
            idea: input.idea,
            stage_results: input.stage_results,
            precursors: input.precursors,
            score,
            score_band: score.band(),
            recommendations: recommend(&findings),
            review: input.review,
            failures: input.failures,
            created_at: input.created_at,
        }
    }
}

/// The terminal state for a run.
///
/// A reviewer rejection wins over everything else. An unanswered checkpoint
/// or a fail-fast abort leaves the run incomplete.
#[must_use]
pub fn resolve_status(
    mode: FailureMode,
    summary: &FailureSummary,
    review: Option<ReviewOutcome>,
) -> ReportStatus {
    match review {
        Some(ReviewOutcome::Rejected) => return ReportStatus::Rejected,
        Some(ReviewOutcome::TimedOut) => return ReportStatus::Incomplete,
        _ => {}
    }

    if !summary.has_failures() && summary.skipped_stages.is_empty() {
        return ReportStatus::Complete;
    }

    match mode {
        FailureMode::FailFast => ReportStatus::Incomplete,
        FailureMode::BestEffort => ReportStatus::Degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ScoreBand, StageId};
    use crate::testing::fixtures::sample_idea;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn input(stage_results: Vec<StageResult>) -> AssemblyInput {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        AssemblyInput {
            report_id: Uuid::nil(),
            run_id: Uuid::nil(),
            workflow: Workflow::FullValidation,
            status: ReportStatus::Complete,
            idea: sample_idea(),
            stage_results,
            precursors: Vec::new(),
            review: None,
            failures: Vec::new(),
            created_at: at,
        }
    }

    fn market(growth: f64) -> StageResult {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 0, 0).unwrap();
        StageResult::completed(
            StageId::Market,
            json!({"growth_rate": growth, "market_size_usd": 2e9}),
            at,
            1,
        )
        .with_recorded_at(at + chrono::Duration::seconds(2))
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let assembler = ReportAssembler::new();
        let first = assembler.assemble(input(vec![market(25.0)]));
        let second = assembler.assemble(input(vec![market(25.0)]));

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_assemble_scores_and_recommends() {
        let report = ReportAssembler::new().assemble(input(vec![market(25.0)]));

        assert_eq!(report.score().value(), 70);
        assert_eq!(report.score_band(), ScoreBand::Promising);
        assert!(report.recommendations()[0].starts_with("The market is growing rapidly"));
        assert_eq!(report.stage_ids(), vec![StageId::Market]);
    }

    #[test]
    fn test_resolve_status() {
        let clean = FailureSummary {
            total_stages: 4,
            completed_stages: 4,
            ..FailureSummary::default()
        };
        let failed = FailureSummary {
            total_stages: 4,
            completed_stages: 3,
            failures: vec![FailureRecord::new(StageId::Persona, "llm down")],
            ..FailureSummary::default()
        };

        assert_eq!(resolve_status(FailureMode::FailFast, &clean, None), ReportStatus::Complete);
        assert_eq!(
            resolve_status(FailureMode::FailFast, &clean, Some(ReviewOutcome::Edited)),
            ReportStatus::Complete
        );
        assert_eq!(resolve_status(FailureMode::FailFast, &failed, None), ReportStatus::Incomplete);
        assert_eq!(resolve_status(FailureMode::BestEffort, &failed, None), ReportStatus::Degraded);
        assert_eq!(
            resolve_status(FailureMode::FailFast, &clean, Some(ReviewOutcome::TimedOut)),
            ReportStatus::Incomplete
        );
        assert_eq!(
            resolve_status(FailureMode::BestEffort, &failed, Some(ReviewOutcome::Rejected)),
            ReportStatus::Rejected
        );
    }
}
