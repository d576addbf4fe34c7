//! The top-level validation orchestrator.

use super::{FailureSummary, Precursors, StageRunner};
use crate::assembler::{resolve_status, AssemblyInput, ReportAssembler, ReportStore};
use crate::cancellation::CancellationToken;
use crate::checkpoint::{Checkpoint, CheckpointOutcome, ConsoleReviewer, ReviewRequest, Reviewer};
use crate::config::ValidatorConfig;
use crate::context::{RunContext, RunIdentity};
use crate::core::{ReviewOutcome, ReviewRecord, StageId, StartupIdea, ValidationReport};
use crate::errors::ValidatorError;
use crate::events::{
    EventSink, LoggingEventSink, CHECKPOINT_REQUESTED, CHECKPOINT_RESOLVED, REPORT_ASSEMBLED,
    REPORT_PERSISTED, RUN_FAILED, RUN_STARTED,
};
use crate::observability::RunSpanAttributes;
use crate::providers::ProviderSet;
use crate::stages::StageRegistry;
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The assembled report.
    pub report: ValidationReport,
    /// Where the report was written.
    pub report_path: PathBuf,
    /// Per-stage result files, if enabled.
    pub intermediate_paths: Vec<PathBuf>,
    /// Stage completion and failure counts.
    pub failure_summary: FailureSummary,
}

/// Runs a startup idea through a workflow and produces a persisted report.
///
/// The validator holds configuration only. Every call to
/// [`StartupValidator::validate`] builds its own [`RunContext`], so one
/// validator can serve concurrent runs.
pub struct StartupValidator {
    config: ValidatorConfig,
    runner: StageRunner,
    checkpoint: Option<Checkpoint>,
    event_sink: Arc<dyn EventSink>,
    store: ReportStore,
    assembler: ReportAssembler,
}

impl StartupValidator {
    /// Creates a validator over an explicit stage registry.
    ///
    /// Interactive configurations get a console reviewer until
    /// [`StartupValidator::with_reviewer`] replaces it.
    #[must_use]
    pub fn new(config: ValidatorConfig, registry: StageRegistry) -> Self {
        let runner = StageRunner::from_config(registry, &config);
        let store = ReportStore::new(config.output_dir.clone())
            .with_intermediate_results(config.save_intermediate_results);
        let checkpoint = config
            .interactive
            .then(|| Checkpoint::new(Arc::new(ConsoleReviewer::new())));
        Self {
            config,
            runner,
            checkpoint,
            event_sink: Arc::new(LoggingEventSink::debug()),
            store,
            assembler: ReportAssembler::new(),
        }
    }

    /// Creates a validator with the standard stages over the collaborators
    /// selected by the configuration.
    pub fn from_config(config: ValidatorConfig) -> Result<Self, ValidatorError> {
        config.validate()?;
        let providers = ProviderSet::from_settings(&config.providers)?;
        let registry = StageRegistry::standard(&providers, &config.providers);
        Ok(Self::new(config, registry))
    }

    /// Sets the reviewer consulted at the checkpoint. Has no effect unless
    /// the configuration is interactive.
    #[must_use]
    pub fn with_reviewer(mut self, reviewer: Arc<dyn Reviewer>) -> Self {
        if self.config.interactive {
            self.checkpoint = Some(Checkpoint::new(reviewer));
        }
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validates `idea` with a private cancellation token.
    pub async fn validate(
        &self,
        idea: StartupIdea,
        precursors: &Precursors,
    ) -> Result<RunOutcome, ValidatorError> {
        self.validate_with_cancellation(idea, precursors, Arc::new(CancellationToken::new()))
            .await
    }

    /// Validates `idea`, stopping when `cancel` fires.
    ///
    /// Input problems are reported before any stage runs. Stage failures
    /// end up in the report; only cancellation, input and persistence
    /// problems are returned as errors.
    pub async fn validate_with_cancellation(
        &self,
        idea: StartupIdea,
        precursors: &Precursors,
        cancel: Arc<CancellationToken>,
    ) -> Result<RunOutcome, ValidatorError> {
        let workflow = self.config.workflow;
        let checked = idea
            .validate()
            .map_err(ValidatorError::from)
            .and_then(|()| precursors.validate_for(workflow));
        if let Err(err) = checked {
            tracing::warn!(
                idea = %idea.name,
                workflow = %workflow,
                category = err.category(),
                error = %err,
                "Rejected validation input"
            );
            return Err(err);
        }

        let identity = RunIdentity::new();
        let run_id = identity.run_id;
        let attributes = RunSpanAttributes::new()
            .with_run_id(run_id.to_string())
            .with_workflow(workflow.as_str())
            .with_idea(idea.name.clone())
            .with_modes(
                self.config.execution_mode.to_string(),
                self.config.failure_mode.to_string(),
            );
        tracing::info!(attributes = ?attributes.to_attributes(), "Starting validation run");

        let mut ctx = precursors
            .results_for(workflow)
            .into_iter()
            .fold(RunContext::new(identity, idea), RunContext::with_precursor)
            .with_event_sink(self.event_sink.clone())
            .with_cancellation(cancel);

        self.event_sink
            .emit(
                RUN_STARTED,
                Some(json!({
                    "run_id": run_id,
                    "workflow": workflow,
                    "idea": ctx.idea().name,
                    "stages": workflow.stages(),
                })),
            )
            .await;

        let outcome = match self.execute(&mut ctx).await {
            Ok(executed) => self.finish(ctx, executed).await,
            Err(err) => {
                self.run_failed(run_id, &err).await;
                Err(err)
            }
        };
        if let Err(err) = &outcome {
            if matches!(err, ValidatorError::Cancelled(_)) {
                tracing::warn!(run_id = %run_id, error = %err, "Validation run cancelled");
            } else {
                tracing::error!(run_id = %run_id, error = %err, "Validation run failed");
            }
        }
        outcome
    }

    async fn execute(
        &self,
        ctx: &mut RunContext,
    ) -> Result<(FailureSummary, Option<ReviewRecord>), ValidatorError> {
        let summary = self.runner.run(self.config.workflow, ctx).await?;
        let review = self.checkpoint(ctx).await?;
        Ok((summary, review))
    }

    async fn finish(
        &self,
        ctx: RunContext,
        (summary, review): (FailureSummary, Option<ReviewRecord>),
    ) -> Result<RunOutcome, ValidatorError> {
        let run_id = ctx.identity().run_id;
        let status = resolve_status(
            self.config.failure_mode,
            &summary,
            review.as_ref().map(|r| r.outcome),
        );
        let (idea, stage_results, precursors) = ctx.into_parts();

        let report = self.assembler.assemble(AssemblyInput {
            report_id: Uuid::now_v7(),
            run_id,
            workflow: self.config.workflow,
            status,
            idea: Arc::try_unwrap(idea).unwrap_or_else(|shared| (*shared).clone()),
            stage_results,
            precursors,
            review,
            failures: summary.failures.clone(),
            created_at: Utc::now(),
        });
        self.event_sink
            .emit(
                REPORT_ASSEMBLED,
                Some(json!({
                    "run_id": run_id,
                    "report_id": report.report_id(),
                    "status": report.status(),
                    "score": report.score().value(),
                })),
            )
            .await;

        let persisted = match self.store.persist(&report).await {
            Ok(persisted) => persisted,
            Err(err) => {
                self.run_failed(run_id, &err).await;
                return Err(err);
            }
        };
        self.event_sink
            .emit(
                REPORT_PERSISTED,
                Some(json!({
                    "run_id": run_id,
                    "path": persisted.report_path.display().to_string(),
                })),
            )
            .await;

        tracing::info!(
            run_id = %run_id,
            status = %report.status(),
            score = report.score().value(),
            band = report.score_band().label(),
            "Validation run finished"
        );

        Ok(RunOutcome {
            report,
            report_path: persisted.report_path,
            intermediate_paths: persisted.intermediate_paths,
            failure_summary: summary,
        })
    }

    /// Pauses for the reviewer after a successful MVP stage.
    async fn checkpoint(&self, ctx: &mut RunContext) -> Result<Option<ReviewRecord>, ValidatorError> {
        let Some(checkpoint) = &self.checkpoint else {
            return Ok(None);
        };
        let Some(mvp) = ctx
            .results()
            .iter()
            .find(|r| r.stage() == StageId::Mvp && r.is_success())
            .cloned()
        else {
            return Ok(None);
        };

        let run_id = ctx.identity().run_id;
        let request = ReviewRequest::new(run_id, ctx.idea().name.clone(), &mvp);
        self.event_sink
            .emit(
                CHECKPOINT_REQUESTED,
                Some(json!({
                    "run_id": run_id,
                    "stage": StageId::Mvp,
                    "reviewer": checkpoint.reviewer_name(),
                })),
            )
            .await;

        let outcome = checkpoint
            .await_decision(&request, self.config.review_timeout(), ctx.cancellation())
            .await?;

        let (outcome, reason) = match outcome {
            CheckpointOutcome::Approved => (ReviewOutcome::Approved, None),
            CheckpointOutcome::Edited(payload) => {
                ctx.replace(mvp.with_payload(payload));
                (ReviewOutcome::Edited, None)
            }
            CheckpointOutcome::Rejected { reason } => (ReviewOutcome::Rejected, Some(reason)),
            CheckpointOutcome::TimedOut => (ReviewOutcome::TimedOut, None),
        };

        self.event_sink
            .emit(
                CHECKPOINT_RESOLVED,
                Some(json!({
                    "run_id": run_id,
                    "outcome": outcome,
                    "reason": reason,
                })),
            )
            .await;

        Ok(Some(ReviewRecord {
            outcome,
            reviewer: checkpoint.reviewer_name().to_string(),
            reason,
            decided_at: Utc::now(),
        }))
    }

    async fn run_failed(&self, run_id: Uuid, err: &ValidatorError) {
        self.event_sink
            .emit(
                RUN_FAILED,
                Some(json!({
                    "run_id": run_id,
                    "category": err.category(),
                    "error": err.to_string(),
                })),
            )
            .await;
    }
}

impl std::fmt::Debug for StartupValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartupValidator")
            .field("workflow", &self.config.workflow)
            .field("output_dir", &self.config.output_dir)
            .field("checkpoint", &self.checkpoint)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}
