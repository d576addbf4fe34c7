//! Testing utilities for validation runs.
//!
//! This module provides:
//! - Stub collaborators with canned answers
//! - Scripted and recording stages
//! - A scripted reviewer
//! - Fixtures for a deterministic end-to-end run

pub mod fixtures;
mod mocks;
mod stubs;

pub use mocks::{RecordingStage, ScriptedReviewer, ScriptedStage};
pub use stubs::{StubFetcher, StubLlm, StubSearch};
