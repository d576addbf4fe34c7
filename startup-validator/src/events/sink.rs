//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, Level};

/// An event name with its payload, as captured by [`CollectingEventSink`].
pub type RecordedEvent = (String, Option<serde_json::Value>);

/// Receives the lifecycle events of validation runs.
///
/// Sinks are shared between concurrent runs; every payload carries its
/// `run_id` so events can be told apart.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event, awaiting any delivery work.
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Emits an event from synchronous code. Must never fail or block.
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// Writes events to `tracing`, lifting `run_id` and `stage` out of the
/// payload into structured fields.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Logs at `level`. Anything other than `DEBUG` logs at `INFO`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Logs at debug level.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event_type: &str, data: Option<&serde_json::Value>) {
        let field = |key: &str| {
            data.and_then(|d| d.get(key))
                .and_then(serde_json::Value::as_str)
                .unwrap_or("-")
                .to_string()
        };
        let run_id = field("run_id");
        let stage = field("stage");
        if self.level == Level::DEBUG {
            debug!(event = event_type, run_id = %run_id, stage = %stage, data = ?data, "Validation event");
        } else {
            info!(event = event_type, run_id = %run_id, stage = %stage, data = ?data, "Validation event");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// Keeps every event in memory, in emission order. Used by tests and by
/// callers that inspect a run after it finished.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every captured event.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.read().clone()
    }

    /// Number of captured events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Event names, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Events whose name starts with `type_prefix`, e.g. `"stage."`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<RecordedEvent> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// The `stage` field of every `event_type` event, in order.
    #[must_use]
    pub fn stages_of(&self, event_type: &str) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t == event_type)
            .filter_map(|(_, data)| data.as_ref()?.get("stage")?.as_str().map(str::to_string))
            .collect()
    }

    fn record(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.record(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.record(event_type, data);
    }
}
