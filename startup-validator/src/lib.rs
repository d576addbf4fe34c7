//! # Startup Validator
//!
//! A multi-stage pipeline that evaluates a startup idea and produces a
//! scored, persisted validation report.
//!
//! A run moves through four analysis stages:
//!
//! - **Market research**: search trends, growth and market size
//! - **Competitor analysis**: competitor sites, features, pricing and gaps
//! - **Customer personas**: audience characteristics and pain points
//! - **MVP planning**: features, tech stack, cost and timeline estimates
//!
//! Named workflows select which stages run. An optional human checkpoint
//! pauses after MVP planning for approval, rejection or an edited plan.
//! The results are scored into one of four bands and written to disk.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use startup_validator::prelude::*;
//!
//! let config = ValidatorConfig::load(None)?
//!     .with_env()
//!     .with_workflow(Workflow::FullValidation);
//! let validator = StartupValidator::from_config(config)?;
//!
//! let idea = StartupIdea::new("FreshMeal", "Meal planning with exact portions")
//!     .with_target_audience("Busy professionals");
//! let outcome = validator.validate(idea, &Precursors::new()).await?;
//! println!("{} ({})", outcome.report.score(), outcome.report.score_band().label());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod assembler;
pub mod cancellation;
pub mod checkpoint;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod providers;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assembler::{ReportAssembler, ReportStore, ScoreCard};
    pub use crate::cancellation::CancellationToken;
    pub use crate::checkpoint::{
        AutoApprove, ChannelReviewer, ConsoleReviewer, ReviewDecision, ReviewService, Reviewer,
    };
    pub use crate::config::ValidatorConfig;
    pub use crate::context::{RunContext, RunIdentity, StageContext};
    pub use crate::core::{
        ReportStatus, Score, ScoreBand, StageId, StageOutput, StageResult, StartupIdea,
        ValidationReport,
    };
    pub use crate::errors::{InputValidationError, ProviderError, ValidatorError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{
        ExecutionMode, FailureMode, Precursors, RunOutcome, StageRunner, StartupValidator,
        Workflow,
    };
    pub use crate::providers::ProviderSet;
    pub use crate::stages::{Stage, StageRegistry};
}
