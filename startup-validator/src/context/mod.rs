//! Run and stage contexts.
//!
//! A [`RunContext`] is created per run and owned by the runner for the
//! duration of that run. Stages receive a read-only [`StageContext`] snapshot
//! holding the idea and the prior results they may read.

mod identity;
mod run;
mod stage;

pub use identity::RunIdentity;
pub use run::RunContext;
pub use stage::StageContext;
