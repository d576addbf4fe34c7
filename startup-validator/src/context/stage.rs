//! Read-only context handed to a stage.

use super::RunIdentity;
use crate::cancellation::CancellationToken;
use crate::core::{StageId, StageResult, StartupIdea};
use crate::events::EventSink;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything a stage may read: the idea and the prior results for the
/// stages it depends on.
#[derive(Clone)]
pub struct StageContext {
    stage: StageId,
    identity: RunIdentity,
    idea: Arc<StartupIdea>,
    prior: BTreeMap<StageId, StageResult>,
    event_sink: Arc<dyn EventSink>,
    cancel: Arc<CancellationToken>,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        stage: StageId,
        identity: RunIdentity,
        idea: Arc<StartupIdea>,
        prior: BTreeMap<StageId, StageResult>,
        event_sink: Arc<dyn EventSink>,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            stage,
            identity,
            idea,
            prior,
            event_sink,
            cancel,
        }
    }

    /// The stage being executed.
    #[must_use]
    pub fn stage(&self) -> StageId {
        self.stage
    }

    /// The run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// The submitted idea.
    #[must_use]
    pub fn idea(&self) -> &StartupIdea {
        &self.idea
    }

    /// The prior result for `stage`, live or injected, successful or not.
    #[must_use]
    pub fn precursor(&self, stage: StageId) -> Option<&StageResult> {
        self.prior.get(&stage)
    }

    /// The prior payload for `stage` read as a typed analysis.
    ///
    /// Failed results are skipped.
    #[must_use]
    pub fn precursor_as<T: DeserializeOwned + Default>(&self, stage: StageId) -> Option<T> {
        self.precursor(stage)
            .filter(|r| r.is_success())
            .map(StageResult::payload_as)
    }

    /// Returns whether the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The cancellation token of the run.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Emits an event tagged with this stage.
    pub fn try_emit(&self, event_type: &str, mut data: serde_json::Value) {
        if let Some(object) = data.as_object_mut() {
            object.insert("stage".to_string(), serde_json::json!(self.stage));
            object.insert("run_id".to_string(), serde_json::json!(self.identity.run_id));
        }
        self.event_sink.try_emit(event_type, Some(data));
    }
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("stage", &self.stage)
            .field("run_id", &self.identity.run_id)
            .field("prior", &self.prior.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use chrono::Utc;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Growth {
        #[serde(default)]
        growth_rate: f64,
    }

    fn context_with(prior: Vec<StageResult>, sink: Arc<dyn EventSink>) -> StageContext {
        StageContext::new(
            StageId::Mvp,
            RunIdentity::new(),
            Arc::new(StartupIdea::new("FreshMeal", "Meal kits")),
            prior.into_iter().map(|r| (r.stage(), r)).collect(),
            sink,
            Arc::new(CancellationToken::new()),
        )
    }

    #[test]
    fn test_precursor_as_skips_failures() {
        let ctx = context_with(
            vec![
                StageResult::completed(StageId::Market, json!({"growth_rate": 7.5}), Utc::now(), 1),
                StageResult::failed(StageId::Competitor, "down", Utc::now(), 1),
            ],
            Arc::new(CollectingEventSink::new()),
        );

        assert_eq!(ctx.precursor_as::<Growth>(StageId::Market), Some(Growth { growth_rate: 7.5 }));
        assert!(ctx.precursor(StageId::Competitor).is_some());
        assert_eq!(ctx.precursor_as::<Growth>(StageId::Competitor), None);
    }

    #[test]
    fn test_try_emit_tags_stage() {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = context_with(Vec::new(), sink.clone());

        ctx.try_emit("stage.note", json!({"detail": "x"}));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let data = events[0].1.clone().unwrap();
        assert_eq!(data["stage"], json!("mvp"));
        assert_eq!(data["detail"], json!("x"));
    }
}
