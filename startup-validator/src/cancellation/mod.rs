//! Cooperative cancellation for validation runs.

mod token;

pub use token::{CancelCallback, CancellationToken};
