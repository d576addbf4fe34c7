//! Observability utilities.

mod spans;

pub use spans::{RunSpanAttributes, SpanTimer, StageSpanAttributes};

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber.
///
/// `filter` uses `RUST_LOG` syntax and is only consulted when `RUST_LOG` is
/// unset. Returns `false` if a subscriber was already installed, which keeps
/// repeated calls from tests harmless.
pub fn init_tracing(filter: &str, json: bool) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        let _ = init_tracing("warn", false);
        assert!(!init_tracing("debug", true));
    }
}
