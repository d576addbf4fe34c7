//! Scripted stages and reviewers.

use crate::checkpoint::{ReviewDecision, ReviewRequest, Reviewer};
use crate::context::StageContext;
use crate::core::{StageId, StageOutput};
use crate::errors::ValidatorError;
use crate::stages::Stage;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// A stage that returns a fixed sequence of outputs.
///
/// Once the script runs out the last output repeats.
#[derive(Debug)]
pub struct ScriptedStage {
    id: StageId,
    script: Vec<StageOutput>,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl ScriptedStage {
    /// Creates a scripted stage. An empty script always succeeds with `{}`.
    #[must_use]
    pub fn new(id: StageId, script: Vec<StageOutput>) -> Self {
        Self {
            id,
            script,
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Sleeps before every answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attempts started so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn execute(&self, _ctx: &StageContext) -> StageOutput {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .get(call)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_else(|| StageOutput::ok(serde_json::json!({})))
    }
}

/// A stage that succeeds with a fixed payload and records the prior results
/// it was shown.
#[derive(Debug)]
pub struct RecordingStage {
    id: StageId,
    payload: serde_json::Value,
    seen: Mutex<Vec<BTreeMap<StageId, serde_json::Value>>>,
}

impl RecordingStage {
    /// Creates a recording stage.
    #[must_use]
    pub fn new(id: StageId, payload: serde_json::Value) -> Self {
        Self {
            id,
            payload,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Prior payloads visible to each call, keyed by stage.
    #[must_use]
    pub fn seen(&self) -> Vec<BTreeMap<StageId, serde_json::Value>> {
        self.seen.lock().clone()
    }

    /// Number of calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let prior = StageId::ALL
            .iter()
            .filter_map(|stage| {
                ctx.precursor(*stage)
                    .map(|result| (*stage, result.payload().clone()))
            })
            .collect();
        self.seen.lock().push(prior);
        StageOutput::ok(self.payload.clone())
    }
}

/// A reviewer that always gives the same decision.
#[derive(Debug)]
pub struct ScriptedReviewer {
    decision: ReviewDecision,
    delay: Option<Duration>,
    requests: Mutex<Vec<ReviewRequest>>,
}

impl ScriptedReviewer {
    /// Creates a reviewer answering `decision`.
    #[must_use]
    pub fn new(decision: ReviewDecision) -> Self {
        Self {
            decision,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Waits before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ReviewRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Reviewer for ScriptedReviewer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn review(&self, request: &ReviewRequest) -> Result<ReviewDecision, ValidatorError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.decision.clone())
    }
}
