//! Event sink system for observability.
//!
//! The runner, checkpoint and report store emit lifecycle events through an
//! [`EventSink`] that is handed to them explicitly.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event emitted when a run begins.
pub const RUN_STARTED: &str = "run.started";
/// Event emitted when a run ends with an error.
pub const RUN_FAILED: &str = "run.failed";
/// Event emitted before a stage attempt.
pub const STAGE_STARTED: &str = "stage.started";
/// Event emitted when a stage attempt will be retried.
pub const STAGE_RETRYING: &str = "stage.retrying";
/// Event emitted when a stage succeeds.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// Event emitted when a stage is recorded as failed.
pub const STAGE_FAILED: &str = "stage.failed";
/// Event emitted when caller-supplied data stands in for a stage.
pub const STAGE_INJECTED: &str = "stage.injected";
/// Event emitted when the checkpoint waits for a reviewer.
pub const CHECKPOINT_REQUESTED: &str = "checkpoint.requested";
/// Event emitted when the checkpoint is resolved.
pub const CHECKPOINT_RESOLVED: &str = "checkpoint.resolved";
/// Event emitted once the report is built.
pub const REPORT_ASSEMBLED: &str = "report.assembled";
/// Event emitted once the report is on disk.
pub const REPORT_PERSISTED: &str = "report.persisted";
