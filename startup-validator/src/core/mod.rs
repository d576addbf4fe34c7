//! Core types for the validation pipeline.
//!
//! This module contains the fundamental data model: stage identifiers and
//! statuses, stage outputs and results, the submitted idea, scores and the
//! final report.

mod idea;
mod output;
mod report;
mod result;
mod score;
mod status;

pub use idea::StartupIdea;
pub use output::StageOutput;
pub use report::{ReportStatus, ReviewOutcome, ReviewRecord, ValidationReport};
pub use result::{ResultOrigin, StageResult};
pub use score::{Score, ScoreBand};
pub use status::{StageId, StageStatus};
