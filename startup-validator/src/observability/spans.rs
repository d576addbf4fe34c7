//! Span attributes and timing for runs and stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Span attributes for one validation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSpanAttributes {
    /// Run ID.
    pub run_id: Option<String>,
    /// Correlation ID supplied by the caller.
    pub correlation_id: Option<String>,
    /// Workflow name.
    pub workflow: Option<String>,
    /// Idea name.
    pub idea: Option<String>,
    /// Execution mode.
    pub execution_mode: Option<String>,
    /// Failure mode.
    pub failure_mode: Option<String>,
}

impl RunSpanAttributes {
    /// Creates empty run attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the run ID.
    #[must_use]
    pub fn with_run_id(mut self, id: impl Into<String>) -> Self {
        self.run_id = Some(id.into());
        self
    }

    /// Sets the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Sets the workflow name.
    #[must_use]
    pub fn with_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = Some(workflow.into());
        self
    }

    /// Sets the idea name.
    #[must_use]
    pub fn with_idea(mut self, idea: impl Into<String>) -> Self {
        self.idea = Some(idea.into());
        self
    }

    /// Sets the execution and failure modes.
    #[must_use]
    pub fn with_modes(mut self, execution: impl Into<String>, failure: impl Into<String>) -> Self {
        self.execution_mode = Some(execution.into());
        self.failure_mode = Some(failure.into());
        self
    }

    /// Flattens into dotted attribute names.
    #[must_use]
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        let entries = [
            ("run.id", &self.run_id),
            ("run.correlation_id", &self.correlation_id),
            ("run.workflow", &self.workflow),
            ("run.idea", &self.idea),
            ("run.execution_mode", &self.execution_mode),
            ("run.failure_mode", &self.failure_mode),
        ];
        for (key, value) in entries {
            if let Some(v) = value {
                attrs.insert(key.to_string(), v.clone());
            }
        }
        attrs
    }
}

/// Span attributes for one stage execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSpanAttributes {
    /// Stage name.
    pub stage_name: String,
    /// Final status.
    pub status: Option<String>,
    /// Attempts made.
    pub attempts: u32,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Error message if failed.
    pub error: Option<String>,
}

impl StageSpanAttributes {
    /// Creates attributes for `stage_name`.
    #[must_use]
    pub fn new(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            ..Default::default()
        }
    }

    /// Sets the stage status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the attempt count.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Flattens into dotted attribute names.
    #[must_use]
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        attrs.insert("stage.name".to_string(), self.stage_name.clone());
        attrs.insert("stage.attempts".to_string(), self.attempts.to_string());
        if let Some(ref v) = self.status {
            attrs.insert("stage.status".to_string(), v.clone());
        }
        if let Some(v) = self.duration_ms {
            attrs.insert("stage.duration_ms".to_string(), format!("{v:.1}"));
        }
        if let Some(ref v) = self.error {
            attrs.insert("stage.error".to_string(), v.clone());
        }
        attrs
    }

    /// Logs the attributes as a single structured event.
    pub fn log(&self) {
        let attributes = self.to_attributes();
        if self.error.is_some() {
            tracing::warn!(stage = %self.stage_name, ?attributes, "Stage span closed");
        } else {
            tracing::debug!(stage = %self.stage_name, ?attributes, "Stage span closed");
        }
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_attributes_skip_unset() {
        let attrs = RunSpanAttributes::new()
            .with_run_id("run-1")
            .with_workflow("market_only")
            .to_attributes();
        assert_eq!(attrs.get("run.id").map(String::as_str), Some("run-1"));
        assert_eq!(attrs.get("run.workflow").map(String::as_str), Some("market_only"));
        assert!(!attrs.contains_key("run.idea"));
    }

    #[test]
    fn test_stage_attributes() {
        let attrs = StageSpanAttributes::new("market")
            .with_status("fail")
            .with_attempts(3)
            .with_duration_ms(12.345)
            .with_error("timeout")
            .to_attributes();
        assert_eq!(attrs["stage.name"], "market");
        assert_eq!(attrs["stage.attempts"], "3");
        assert_eq!(attrs["stage.duration_ms"], "12.3");
        assert_eq!(attrs["stage.error"], "timeout");
    }

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("stage.market");
        assert_eq!(timer.name(), "stage.market");
        assert!(timer.finish() >= 0.0);
    }
}
