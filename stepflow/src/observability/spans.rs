//! Spans and timing for pipeline runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::Span;
use uuid::Uuid;

/// How a step invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// The step ran and its outcome was applied.
    Completed,
    /// A required input could not be resolved.
    Skipped,
    /// The step failed and the run was terminated.
    Failed,
}

impl StepStatus {
    /// Returns the lowercase status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creates the span covering one pipeline run.
#[must_use]
pub fn run_span(pipeline: &str, run_id: Uuid, steps: usize) -> Span {
    tracing::info_span!("pipeline_run", pipeline = %pipeline, run_id = %run_id, steps)
}

/// Creates the span covering one step invocation.
#[must_use]
pub fn step_span(step: &str, position: usize) -> Span {
    tracing::debug_span!("step", step = %step, position)
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logs the outcome of the timed step and returns the duration.
    pub fn finish(self, status: StepStatus) -> f64 {
        let duration_ms = self.elapsed_ms();
        tracing::debug!(step = %self.name, %status, duration_ms, "step finished");
        duration_ms
    }
}
