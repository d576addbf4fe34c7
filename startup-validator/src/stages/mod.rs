//! The four analysis stages and their registry.
//!
//! A stage reads the idea and the prior results in its [`StageContext`] and
//! returns a [`StageOutput`]. Stages never see results they do not depend on
//! and never write to shared state; the runner records what they return.

pub mod competitor;
pub mod estimator;
pub mod market;
pub mod mvp;
pub mod persona;

use crate::config::ProviderSettings;
use crate::context::StageContext;
use crate::core::{StageId, StageOutput};
use crate::providers::ProviderSet;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

pub use competitor::{CompetitorAnalysis, CompetitorStage};
pub use estimator::{Complexity, FeatureSpec, MvpEstimate, MvpEstimator};
pub use market::{MarketAnalysis, MarketStage};
pub use mvp::{MvpPlan, MvpStage};
pub use persona::{PersonaSet, PersonaStage};

/// One unit of analysis work.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Which stage this is.
    fn id(&self) -> StageId;

    /// Executes one attempt.
    async fn execute(&self, ctx: &StageContext) -> StageOutput;
}

/// A stage backed by a plain function.
pub struct FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    id: StageId,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    /// Creates a function-backed stage.
    pub fn new(id: StageId, func: F) -> Self {
        Self { id, func }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("id", &self.id).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    fn id(&self) -> StageId {
        self.id
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        (self.func)(ctx)
    }
}

/// Maps stage identifiers to implementations.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    stages: HashMap<StageId, Arc<dyn Stage>>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The four analysis stages wired to `providers`.
    #[must_use]
    pub fn standard(providers: &ProviderSet, settings: &ProviderSettings) -> Self {
        Self::new()
            .with_stage(Arc::new(MarketStage::new(
                providers.llm.clone(),
                providers.search.clone(),
            )))
            .with_stage(Arc::new(
                CompetitorStage::new(
                    providers.llm.clone(),
                    providers.search.clone(),
                    providers.fetcher.clone(),
                )
                .with_max_competitors(settings.max_competitors),
            ))
            .with_stage(Arc::new(PersonaStage::new(providers.llm.clone())))
            .with_stage(Arc::new(MvpStage::new(providers.vectors.clone())))
    }

    /// Registers a stage, replacing any stage with the same id.
    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.register(stage);
        self
    }

    /// Registers a stage, replacing any stage with the same id.
    pub fn register(&mut self, stage: Arc<dyn Stage>) {
        self.stages.insert(stage.id(), stage);
    }

    /// The stage registered for `id`.
    #[must_use]
    pub fn get(&self, id: StageId) -> Option<Arc<dyn Stage>> {
        self.stages.get(&id).cloned()
    }

    /// Whether a stage is registered for `id`.
    #[must_use]
    pub fn contains(&self, id: StageId) -> bool {
        self.stages.contains_key(&id)
    }
}

/// Non-empty lines of an LLM answer with list markers removed.
pub(crate) fn answer_lines(answer: &str) -> Vec<String> {
    answer
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*' | '•'))
                .trim()
                .trim_matches('"')
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::cancellation::CancellationToken;
    use crate::context::{RunIdentity, StageContext};
    use crate::core::{StageId, StageResult, StartupIdea};
    use crate::events::NoOpEventSink;
    use std::sync::Arc;

    pub fn context(stage: StageId, idea: StartupIdea, prior: Vec<StageResult>) -> StageContext {
        StageContext::new(
            stage,
            RunIdentity::new(),
            Arc::new(idea),
            prior.into_iter().map(|r| (r.stage(), r)).collect(),
            Arc::new(NoOpEventSink),
            Arc::new(CancellationToken::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StartupIdea;

    #[test]
    fn test_answer_lines_strip_markers() {
        let lines = answer_lines("1. meal kits\n- \"healthy food\"\n\n  * grocery delivery  \n");
        assert_eq!(lines, vec!["meal kits", "healthy food", "grocery delivery"]);
    }

    #[test]
    fn test_standard_registry_has_all_stages() {
        let registry =
            StageRegistry::standard(&ProviderSet::offline(), &ProviderSettings::default());
        for id in StageId::ALL {
            assert!(registry.contains(id));
            assert_eq!(registry.get(id).map(|s| s.id()), Some(id));
        }
    }

    #[tokio::test]
    async fn test_fn_stage_replaces_registered_stage() {
        let registry = StageRegistry::standard(&ProviderSet::offline(), &ProviderSettings::default())
            .with_stage(Arc::new(FnStage::new(StageId::Market, |_ctx| {
                StageOutput::ok(serde_json::json!({"stub": true}))
            })));

        let ctx = test_support::context(StageId::Market, StartupIdea::new("A", "B"), Vec::new());
        let output = registry.get(StageId::Market).unwrap().execute(&ctx).await;
        assert_eq!(output.payload, Some(serde_json::json!({"stub": true})));
    }
}
