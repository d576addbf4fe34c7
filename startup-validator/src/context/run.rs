//! Per-run accumulating context.

use super::{RunIdentity, StageContext};
use crate::cancellation::CancellationToken;
use crate::core::{StageId, StageResult, StartupIdea};
use crate::events::{EventSink, NoOpEventSink};
use std::collections::BTreeMap;
use std::sync::Arc;

/// State of one run: the idea, the injected precursors and the results
/// recorded so far.
///
/// Owned exclusively by the runner. Concurrent runs each build their own.
pub struct RunContext {
    identity: RunIdentity,
    idea: Arc<StartupIdea>,
    precursors: BTreeMap<StageId, StageResult>,
    results: Vec<StageResult>,
    event_sink: Arc<dyn EventSink>,
    cancel: Arc<CancellationToken>,
}

impl RunContext {
    /// Creates a context for a new run.
    #[must_use]
    pub fn new(identity: RunIdentity, idea: StartupIdea) -> Self {
        Self {
            identity,
            idea: Arc::new(idea),
            precursors: BTreeMap::new(),
            results: Vec::new(),
            event_sink: Arc::new(NoOpEventSink),
            cancel: Arc::new(CancellationToken::new()),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Registers an externally supplied result for a stage.
    #[must_use]
    pub fn with_precursor(mut self, result: StageResult) -> Self {
        self.precursors.insert(result.stage(), result);
        self
    }

    /// The run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// The submitted idea.
    #[must_use]
    pub fn idea(&self) -> &Arc<StartupIdea> {
        &self.idea
    }

    /// The event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// The cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Appends a stage result. Each stage is recorded at most once.
    ///
    /// Returns `false` and keeps the existing result if the stage was
    /// already recorded.
    pub fn record(&mut self, result: StageResult) -> bool {
        if self.results.iter().any(|r| r.stage() == result.stage()) {
            tracing::warn!(stage = %result.stage(), "Ignoring duplicate stage result");
            return false;
        }
        self.results.push(result);
        true
    }

    /// Replaces a recorded result with a reviewer-edited copy.
    pub(crate) fn replace(&mut self, result: StageResult) {
        if let Some(slot) = self.results.iter_mut().find(|r| r.stage() == result.stage()) {
            *slot = result;
        }
    }

    /// Results recorded so far, in execution order.
    #[must_use]
    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    /// Injected precursors, in stage order.
    #[must_use]
    pub fn precursors(&self) -> Vec<StageResult> {
        self.precursors.values().cloned().collect()
    }

    /// The result a stage would see for `stage`: the live one if recorded,
    /// else an injected precursor.
    #[must_use]
    pub fn visible(&self, stage: StageId) -> Option<&StageResult> {
        self.results
            .iter()
            .find(|r| r.stage() == stage)
            .or_else(|| self.precursors.get(&stage))
    }

    /// Builds the read-only view handed to `stage`.
    #[must_use]
    pub fn stage_context(&self, stage: StageId) -> StageContext {
        let prior = stage
            .dependencies()
            .iter()
            .filter_map(|dep| self.visible(*dep).map(|r| (*dep, r.clone())))
            .collect();
        StageContext::new(
            stage,
            self.identity.clone(),
            self.idea.clone(),
            prior,
            self.event_sink.clone(),
            self.cancel.clone(),
        )
    }

    /// Consumes the context, returning recorded results and precursors.
    #[must_use]
    pub fn into_parts(self) -> (Arc<StartupIdea>, Vec<StageResult>, Vec<StageResult>) {
        let precursors = self.precursors.into_values().collect();
        (self.idea, self.results, precursors)
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.identity.run_id)
            .field("idea", &self.idea.name)
            .field("results", &self.results.len())
            .field("precursors", &self.precursors.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn context() -> RunContext {
        RunContext::new(RunIdentity::new(), StartupIdea::new("FreshMeal", "Meal kits"))
    }

    #[test]
    fn test_record_rejects_duplicates() {
        let mut ctx = context();
        assert!(ctx.record(StageResult::completed(StageId::Market, json!({"a": 1}), Utc::now(), 1)));
        assert!(!ctx.record(StageResult::completed(StageId::Market, json!({"a": 2}), Utc::now(), 1)));
        assert_eq!(ctx.results().len(), 1);
        assert_eq!(ctx.results()[0].payload(), &json!({"a": 1}));
    }

    #[test]
    fn test_live_result_shadows_precursor() {
        let mut ctx = context().with_precursor(StageResult::injected(StageId::Market, json!({"src": "file"})));
        assert_eq!(ctx.visible(StageId::Market).unwrap().payload(), &json!({"src": "file"}));

        ctx.record(StageResult::completed(StageId::Market, json!({"src": "live"}), Utc::now(), 1));
        assert_eq!(ctx.visible(StageId::Market).unwrap().payload(), &json!({"src": "live"}));
    }

    #[test]
    fn test_stage_context_only_carries_dependencies() {
        let mut ctx = context();
        ctx.record(StageResult::completed(StageId::Market, json!({}), Utc::now(), 1));
        ctx.record(StageResult::completed(StageId::Competitor, json!({}), Utc::now(), 1));

        let market_view = ctx.stage_context(StageId::Market);
        assert!(market_view.precursor(StageId::Competitor).is_none());

        let mvp_view = ctx.stage_context(StageId::Mvp);
        assert!(mvp_view.precursor(StageId::Market).is_some());
        assert!(mvp_view.precursor(StageId::Competitor).is_some());
        assert!(mvp_view.precursor(StageId::Persona).is_none());
    }
}
