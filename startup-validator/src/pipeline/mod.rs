//! Workflow selection, stage execution and the validation orchestrator.
//!
//! A [`Workflow`] names the stages to run. The [`StageRunner`] executes them
//! with timeouts, retries and the configured [`FailureMode`], and the
//! [`StartupValidator`] wraps a run with input validation, the reviewer
//! checkpoint, report assembly and persistence.

mod failure;
mod retry;
mod runner;
mod validator;
mod workflow;


pub use failure::{FailureCollector, FailureKind, FailureMode, FailureRecord, FailureSummary};
pub use retry::{JitterStrategy, RetryDecision, RetryPolicy};
pub use runner::{dependency_waves, ExecutionMode, StageRunner};
pub use validator::{RunOutcome, StartupValidator};
pub use workflow::{Precursors, Workflow};
