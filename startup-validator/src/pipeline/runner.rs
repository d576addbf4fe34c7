//! Stage execution: ordering, timeouts, retries and failure handling.

use super::{
    FailureCollector, FailureKind, FailureMode, FailureRecord, FailureSummary, RetryDecision,
    RetryPolicy, Workflow,
};
use crate::cancellation::CancellationToken;
use crate::config::ValidatorConfig;
use crate::context::{RunContext, StageContext};
use crate::core::{StageId, StageOutput, StageResult, StageStatus};
use crate::errors::ValidatorError;
use crate::events::{STAGE_COMPLETED, STAGE_FAILED, STAGE_INJECTED, STAGE_RETRYING, STAGE_STARTED};
use crate::observability::{SpanTimer, StageSpanAttributes};
use crate::stages::StageRegistry;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// How the stages of a workflow are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One stage at a time, in workflow order.
    #[default]
    Sequential,
    /// Stages whose dependencies are done run together, wave by wave.
    Parallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            other => Err(format!("unknown execution mode '{other}'")),
        }
    }
}

/// Groups `stages` into waves. Every stage runs after the stages it depends
/// on that are part of the same selection.
#[must_use]
pub fn dependency_waves(stages: &[StageId]) -> Vec<Vec<StageId>> {
    let mut remaining = stages.to_vec();
    let mut done: Vec<StageId> = Vec::new();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<StageId>, Vec<StageId>) =
            remaining.into_iter().partition(|stage| {
                stage
                    .dependencies()
                    .iter()
                    .all(|dep| !stages.contains(dep) || done.contains(dep))
            });
        if ready.is_empty() {
            waves.push(blocked);
            break;
        }
        done.extend(ready.iter().copied());
        waves.push(ready);
        remaining = blocked;
    }
    waves
}

/// Final state of one stage after all of its attempts.
struct StageRun {
    result: StageResult,
    failure: Option<FailureRecord>,
}

/// Executes the stages of a workflow against a [`RunContext`].
#[derive(Debug, Clone)]
pub struct StageRunner {
    registry: StageRegistry,
    retry: RetryPolicy,
    stage_timeout: Duration,
    failure_mode: FailureMode,
    execution_mode: ExecutionMode,
}

impl StageRunner {
    /// Creates a runner with default policies.
    #[must_use]
    pub fn new(registry: StageRegistry) -> Self {
        Self {
            registry,
            retry: RetryPolicy::default(),
            stage_timeout: Duration::from_secs(120),
            failure_mode: FailureMode::default(),
            execution_mode: ExecutionMode::default(),
        }
    }

    /// Creates a runner configured from `config`.
    #[must_use]
    pub fn from_config(registry: StageRegistry, config: &ValidatorConfig) -> Self {
        Self::new(registry)
            .with_retry_policy(RetryPolicy::from(&config.retry))
            .with_stage_timeout(config.stage_timeout())
            .with_failure_mode(config.failure_mode)
            .with_execution_mode(config.execution_mode)
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Sets the execution mode.
    #[must_use]
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// The configured failure mode.
    #[must_use]
    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Runs every stage of `workflow`, recording results into `ctx`.
    ///
    /// Stage failures are recorded, not returned: the summary tells whether
    /// the run stopped early. Only cancellation ends the call with an error.
    pub async fn run(
        &self,
        workflow: Workflow,
        ctx: &mut RunContext,
    ) -> Result<FailureSummary, ValidatorError> {
        for precursor in ctx.precursors() {
            ctx.event_sink().try_emit(
                STAGE_INJECTED,
                Some(json!({
                    "stage": precursor.stage(),
                    "run_id": ctx.identity().run_id,
                })),
            );
        }

        let mut collector = FailureCollector::new(self.failure_mode);
        let waves = match self.execution_mode {
            ExecutionMode::Sequential => workflow.stages().iter().map(|s| vec![*s]).collect(),
            ExecutionMode::Parallel => dependency_waves(workflow.stages()),
        };

        for wave in waves {
            Self::check_cancelled(ctx.cancellation())?;

            let contexts: Vec<StageContext> =
                wave.iter().map(|stage| ctx.stage_context(*stage)).collect();
            let runs =
                join_all(contexts.into_iter().map(|stage_ctx| self.execute_stage(stage_ctx))).await;

            let mut cancelled = None;
            for run in runs {
                match run {
                    Ok(StageRun { result, failure }) => {
                        match failure {
                            Some(record) => collector.record_failure(record),
                            None => collector.record_completion(result.stage()),
                        }
                        ctx.record(result);
                    }
                    Err(err) => cancelled = Some(err),
                }
            }
            if let Some(err) = cancelled {
                return Err(err);
            }
            if collector.should_stop() {
                tracing::info!(
                    run_id = %ctx.identity().run_id,
                    "Stopping run after stage failure"
                );
                break;
            }
        }

        Ok(collector.summary(workflow.stages()))
    }

    fn check_cancelled(token: &CancellationToken) -> Result<(), ValidatorError> {
        if token.is_cancelled() {
            Err(ValidatorError::Cancelled(
                token.reason().unwrap_or_else(|| "cancelled".to_string()),
            ))
        } else {
            Ok(())
        }
    }

    async fn execute_stage(&self, ctx: StageContext) -> Result<StageRun, ValidatorError> {
        let stage_id = ctx.stage();
        let started_at = Utc::now();
        let timer = SpanTimer::start(format!("stage.{stage_id}"));

        let Some(stage) = self.registry.get(stage_id) else {
            let message = format!("No implementation registered for stage '{stage_id}'");
            ctx.try_emit(STAGE_FAILED, json!({ "error": message, "attempts": 0 }));
            return Ok(StageRun {
                result: StageResult::failed(stage_id, message.clone(), started_at, 0),
                failure: Some(FailureRecord::new(stage_id, message).with_attempts(0)),
            });
        };

        let cancel = Arc::clone(ctx.cancellation());
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            ctx.try_emit(STAGE_STARTED, json!({ "attempt": attempt }));
            tracing::debug!(stage = %stage_id, attempt, "Stage attempt started");

            let mut kind = FailureKind::Error;
            let output = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(self.cancelled(&ctx, &cancel, attempt, &timer));
                }
                outcome = tokio::time::timeout(self.stage_timeout, stage.execute(&ctx)) => {
                    match outcome {
                        Ok(output) => output,
                        Err(_) => {
                            kind = FailureKind::Timeout;
                            StageOutput::fail_retryable(format!(
                                "Stage timed out after {}s",
                                self.stage_timeout.as_secs_f64()
                            ))
                        }
                    }
                }
            };

            match output.status {
                StageStatus::Ok => {
                    let payload = output.payload.unwrap_or_else(|| json!({}));
                    let duration_ms = timer.finish();
                    ctx.try_emit(
                        STAGE_COMPLETED,
                        json!({ "attempts": attempt, "duration_ms": duration_ms }),
                    );
                    StageSpanAttributes::new(stage_id.as_str())
                        .with_status("ok")
                        .with_attempts(attempt)
                        .with_duration_ms(duration_ms)
                        .log();
                    tracing::info!(stage = %stage_id, attempts = attempt, duration_ms, "Stage completed");
                    return Ok(StageRun {
                        result: StageResult::completed(stage_id, payload, started_at, attempt),
                        failure: None,
                    });
                }
                StageStatus::Cancel => {
                    let reason = output
                        .error
                        .unwrap_or_else(|| format!("Stage '{stage_id}' requested cancellation"));
                    cancel.cancel(reason);
                    return Err(self.cancelled(&ctx, &cancel, attempt, &timer));
                }
                StageStatus::Fail => {}
            }

            let error = output
                .error
                .clone()
                .unwrap_or_else(|| "Stage failed without an error message".to_string());
            match self.retry.decide(attempt, &output) {
                RetryDecision::Retry(delay) => {
                    #[allow(clippy::cast_possible_truncation)]
                    let delay_ms = delay.as_millis() as u64;
                    tracing::warn!(stage = %stage_id, attempt, delay_ms, error = %error, "Retrying stage");
                    ctx.try_emit(
                        STAGE_RETRYING,
                        json!({ "attempt": attempt, "delay_ms": delay_ms, "error": error }),
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return Err(self.cancelled(&ctx, &cancel, attempt, &timer));
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp | RetryDecision::NotRetryable => {
                    let duration_ms = timer.finish();
                    ctx.try_emit(
                        STAGE_FAILED,
                        json!({ "attempts": attempt, "error": error, "duration_ms": duration_ms }),
                    );
                    StageSpanAttributes::new(stage_id.as_str())
                        .with_status("fail")
                        .with_attempts(attempt)
                        .with_duration_ms(duration_ms)
                        .with_error(error.as_str())
                        .log();

                    let mut record = FailureRecord::new(stage_id, error.as_str())
                        .with_kind(kind)
                        .with_attempts(attempt);
                    if output.retryable {
                        record = record.recoverable();
                    }
                    return Ok(StageRun {
                        result: StageResult::failed(stage_id, error, started_at, attempt),
                        failure: Some(record),
                    });
                }
            }
        }
    }

    fn cancelled(
        &self,
        ctx: &StageContext,
        token: &CancellationToken,
        attempt: u32,
        timer: &SpanTimer,
    ) -> ValidatorError {
        let reason = token.reason().unwrap_or_else(|| "cancelled".to_string());
        StageSpanAttributes::new(ctx.stage().as_str())
            .with_status("cancel")
            .with_attempts(attempt)
            .with_duration_ms(timer.elapsed_ms())
            .with_error(reason.as_str())
            .log();
        tracing::info!(
            stage = %ctx.stage(),
            mode = %self.failure_mode,
            reason = %reason,
            "Stage interrupted by cancellation"
        );
        ValidatorError::Cancelled(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunIdentity;
    use crate::core::StartupIdea;
    use crate::events::CollectingEventSink;
    use crate::pipeline::JitterStrategy;
    use crate::stages::FnStage;
    use crate::testing::ScriptedStage;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::default()
            .with_base_delay_ms(1)
            .with_jitter(JitterStrategy::None)
    }

    fn ok_registry() -> StageRegistry {
        StageId::ALL.iter().fold(StageRegistry::new(), |registry, id| {
            let id = *id;
            registry.with_stage(Arc::new(FnStage::new(id, move |_ctx| {
                StageOutput::ok(json!({ "stage": id.as_str() }))
            })))
        })
    }

    fn context() -> RunContext {
        RunContext::new(RunIdentity::new(), StartupIdea::new("FreshMeal", "Meal kits"))
    }

    #[test]
    fn test_dependency_waves() {
        let full = dependency_waves(&StageId::ALL);
        assert_eq!(
            full,
            vec![
                vec![StageId::Market],
                vec![StageId::Competitor],
                vec![StageId::Persona],
                vec![StageId::Mvp],
            ]
        );

        let independent = dependency_waves(&[StageId::Market, StageId::Mvp]);
        assert_eq!(independent, vec![vec![StageId::Market], vec![StageId::Mvp]]);

        let unrelated = dependency_waves(&[StageId::Mvp]);
        assert_eq!(unrelated, vec![vec![StageId::Mvp]]);
    }

    #[test]
    fn test_execution_mode_from_str() {
        assert_eq!("parallel".parse::<ExecutionMode>(), Ok(ExecutionMode::Parallel));
        assert_eq!(ExecutionMode::default(), ExecutionMode::Sequential);
        assert!("eventually".parse::<ExecutionMode>().is_err());
    }

    #[tokio::test]
    async fn test_runs_stages_in_order() {
        let runner = StageRunner::new(ok_registry());
        let mut ctx = context();

        let summary = runner.run(Workflow::FullValidation, &mut ctx).await.unwrap();

        let order: Vec<StageId> = ctx.results().iter().map(StageResult::stage).collect();
        assert_eq!(order, StageId::ALL.to_vec());
        assert_eq!(summary.completed_stages, 4);
        assert!(!summary.has_failures());
    }

    #[tokio::test]
    async fn test_parallel_mode_matches_sequential_order() {
        let runner = StageRunner::new(ok_registry()).with_execution_mode(ExecutionMode::Parallel);
        let mut ctx = context();

        runner.run(Workflow::FullValidation, &mut ctx).await.unwrap();

        let order: Vec<StageId> = ctx.results().iter().map(StageResult::stage).collect();
        assert_eq!(order, StageId::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let registry = ok_registry().with_stage(Arc::new(FnStage::new(StageId::Market, move |_ctx| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                StageOutput::fail_retryable("429 Too Many Requests")
            } else {
                StageOutput::ok(json!({ "growth_rate": 8.0 }))
            }
        })));
        let runner = StageRunner::new(registry).with_retry_policy(fast_retry());
        let mut ctx = context();

        runner.run(Workflow::MarketOnly, &mut ctx).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(ctx.results()[0].is_success());
        assert_eq!(ctx.results()[0].attempts(), 3);
    }

    #[tokio::test]
    async fn test_retries_stop_at_max_attempts() {
        let stage = Arc::new(ScriptedStage::new(
            StageId::Market,
            vec![StageOutput::fail_retryable("503 Service Unavailable")],
        ));
        let registry = ok_registry().with_stage(stage.clone());
        let runner = StageRunner::new(registry).with_retry_policy(fast_retry().with_max_attempts(2));
        let mut ctx = context();

        let summary = runner.run(Workflow::MarketOnly, &mut ctx).await.unwrap();

        assert_eq!(stage.calls(), 2);
        assert!(!ctx.results()[0].is_success());
        assert_eq!(summary.failures[0].attempts, 2);
        assert!(summary.failures[0].recoverable);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let stage = Arc::new(ScriptedStage::new(
            StageId::Market,
            vec![StageOutput::fail("401 Unauthorized")],
        ));
        let registry = ok_registry().with_stage(stage.clone());
        let runner = StageRunner::new(registry).with_retry_policy(fast_retry());
        let mut ctx = context();

        runner.run(Workflow::MarketOnly, &mut ctx).await.unwrap();

        assert_eq!(stage.calls(), 1);
        assert_eq!(ctx.results()[0].error(), Some("401 Unauthorized"));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_run() {
        let registry = ok_registry().with_stage(Arc::new(FnStage::new(StageId::Competitor, |_ctx| {
            StageOutput::fail("search quota exhausted")
        })));
        let runner = StageRunner::new(registry);
        let mut ctx = context();

        let summary = runner.run(Workflow::FullValidation, &mut ctx).await.unwrap();

        assert_eq!(ctx.results().len(), 2);
        assert!(!ctx.results()[1].is_success());
        assert_eq!(summary.skipped_stages, vec![StageId::Persona, StageId::Mvp]);
    }

    #[tokio::test]
    async fn test_best_effort_keeps_going() {
        let registry = ok_registry().with_stage(Arc::new(FnStage::new(StageId::Competitor, |_ctx| {
            StageOutput::fail("search quota exhausted")
        })));
        let runner = StageRunner::new(registry).with_failure_mode(FailureMode::BestEffort);
        let mut ctx = context();

        let summary = runner.run(Workflow::FullValidation, &mut ctx).await.unwrap();

        assert_eq!(ctx.results().len(), 4);
        assert_eq!(ctx.results()[1].payload(), &json!({}));
        assert_eq!(summary.completed_stages, 3);
        assert_eq!(summary.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_recorded() {
        let stage = Arc::new(
            ScriptedStage::new(StageId::Market, vec![StageOutput::ok(json!({}))])
                .with_delay(Duration::from_secs(5)),
        );
        let registry = ok_registry().with_stage(stage);
        let runner = StageRunner::new(registry)
            .with_retry_policy(RetryPolicy::no_retry())
            .with_stage_timeout(Duration::from_millis(20));
        let mut ctx = context();

        let summary = runner.run(Workflow::MarketOnly, &mut ctx).await.unwrap();

        assert_eq!(summary.failures[0].kind, FailureKind::Timeout);
        assert!(ctx.results()[0].error().unwrap_or_default().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_running_stage() {
        let stage = Arc::new(
            ScriptedStage::new(StageId::Market, vec![StageOutput::ok(json!({}))])
                .with_delay(Duration::from_secs(5)),
        );
        let registry = ok_registry().with_stage(stage);
        let runner = StageRunner::new(registry);
        let token = Arc::new(CancellationToken::new());
        let mut ctx = context().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel("operator interrupt");
        });

        let err = runner.run(Workflow::FullValidation, &mut ctx).await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, ValidatorError::Cancelled(ref reason) if reason == "operator interrupt"));
        assert!(ctx.results().is_empty());
    }

    #[tokio::test]
    async fn test_events_cover_lifecycle() {
        let sink = Arc::new(CollectingEventSink::new());
        let runner = StageRunner::new(ok_registry());
        let mut ctx = context()
            .with_event_sink(sink.clone())
            .with_precursor(StageResult::injected(StageId::Market, json!({})));

        runner.run(Workflow::MvpOnly, &mut ctx).await.unwrap();

        assert_eq!(
            sink.event_types(),
            vec![STAGE_INJECTED, STAGE_STARTED, STAGE_COMPLETED]
        );
    }

    #[tokio::test]
    async fn test_missing_stage_is_a_failure() {
        let runner = StageRunner::new(StageRegistry::new());
        let mut ctx = context();

        let summary = runner.run(Workflow::MarketOnly, &mut ctx).await.unwrap();

        assert_eq!(summary.failures.len(), 1);
        assert!(ctx.results()[0].error().unwrap_or_default().contains("No implementation"));
    }
}
