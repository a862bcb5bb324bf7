//! Observability utilities.
//!
//! The engine logs through `tracing`. [`init_tracing`] installs a
//! `tracing-subscriber` formatter for binaries and tests that want to see
//! those logs.

mod spans;

pub use spans::{run_span, step_span, SpanTimer, StepStatus};

use tracing_subscriber::EnvFilter;

/// Builds a filter from `RUST_LOG`, falling back to `default_level`.
#[must_use]
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a global fmt subscriber.
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(default_level: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Installs a global subscriber writing one JSON object per event.
///
/// Returns false if a global subscriber was already installed.
pub fn init_json_tracing(default_level: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(default_level))
        .with_current_span(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_idempotent() {
        let _ = init_tracing("debug");
        assert!(!init_tracing("debug"));
        assert!(!init_json_tracing("debug"));
    }

    #[test]
    fn test_invalid_level_falls_back() {
        let filter = env_filter("not a [valid directive");
        assert!(!filter.to_string().is_empty());
    }
}
