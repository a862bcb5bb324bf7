//! Mock step handlers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::steps::{Args, Outcome, StepDescriptor, StepHandler};

/// A shared, ordered log of step invocations.
#[derive(Debug, Clone, Default)]
pub struct RecordingLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl RecordingLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns the recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// A handler that records each call and returns an outcome built per call.
pub struct MockHandler {
    log: RecordingLog,
    calls: AtomicUsize,
    respond: Box<dyn Fn(&Args) -> anyhow::Result<Outcome> + Send + Sync>,
}

impl MockHandler {
    /// Creates a handler returning [`Outcome::None`].
    #[must_use]
    pub fn new(log: RecordingLog) -> Self {
        Self::responding(log, |_| Ok(Outcome::None))
    }

    /// Creates a handler building its outcome from the arguments.
    pub fn responding<F>(log: RecordingLog, respond: F) -> Self
    where
        F: Fn(&Args) -> anyhow::Result<Outcome> + Send + Sync + 'static,
    {
        Self {
            log,
            calls: AtomicUsize::new(0),
            respond: Box::new(respond),
        }
    }

    /// Returns the number of times the handler was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MockHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHandler")
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StepHandler for MockHandler {
    async fn invoke(&self, args: Args) -> anyhow::Result<Outcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.record(args.step_name());
        (self.respond)(&args)
    }
}

/// A handler that always fails with the given message.
#[derive(Debug, Clone)]
pub struct FailingHandler {
    message: String,
}

impl FailingHandler {
    /// Creates a new failing handler.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl StepHandler for FailingHandler {
    async fn invoke(&self, args: Args) -> anyhow::Result<Outcome> {
        Err(anyhow::anyhow!("{}", self.message).context(format!("{} aborted", args.step_name())))
    }
}

/// A handler that panics.
#[derive(Debug, Clone)]
pub struct PanickingHandler {
    message: String,
}

impl PanickingHandler {
    /// Creates a new panicking handler.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl StepHandler for PanickingHandler {
    async fn invoke(&self, _args: Args) -> anyhow::Result<Outcome> {
        panic!("{}", self.message)
    }
}

/// Builds a step that records its name in `log` when invoked.
pub fn recording_step(name: &str, log: &RecordingLog) -> StepDescriptor {
    StepDescriptor::new(name, MockHandler::new(log.clone()))
}

/// Builds a step that records its name and answers with `respond`.
pub fn responding_step<F>(name: &str, log: &RecordingLog, respond: F) -> StepDescriptor
where
    F: Fn(&Args) -> anyhow::Result<Outcome> + Send + Sync + 'static,
{
    StepDescriptor::new(name, MockHandler::responding(log.clone(), respond))
}
