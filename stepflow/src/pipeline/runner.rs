//! The run loop.

use super::discovery::Candidate;
use super::interpret::Interpreter;
use super::resolver::{resolve, Resolution};
use crate::config::RunConfig;
use crate::observability::{run_span, step_span, SpanTimer, StepStatus};
use crate::services::ServiceLookup;
use crate::store::{Message, Store, WriteMode};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;

/// An ordered pipeline of steps, ready to run.
///
/// Built by [`EngineBuilder`](super::EngineBuilder). Running never returns
/// an error: a failing step records an Error message and terminates the
/// store, which the caller inspects after the run.
pub struct Engine {
    name: String,
    steps: Vec<Candidate>,
    services: Option<Arc<dyn ServiceLookup>>,
    config: RunConfig,
}

impl Engine {
    pub(crate) fn new(
        name: String,
        steps: Vec<Candidate>,
        services: Option<Arc<dyn ServiceLookup>>,
        config: RunConfig,
    ) -> Self {
        Self {
            name,
            steps,
            services,
            config,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the step names in execution order.
    #[must_use]
    pub fn plan(&self) -> Vec<&str> {
        self.steps.iter().map(Candidate::name).collect()
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step was discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the run configuration.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs the pipeline against a new store and returns it.
    pub async fn run(&self) -> Store {
        self.run_with(Store::new()).await
    }

    /// Runs the pipeline against `store` and returns it.
    ///
    /// Flags already present in the store take precedence over the engine
    /// configuration. Steps see each other's writes immediately; so does
    /// every other handle to the same store.
    pub async fn run_with(&self, store: Store) -> Store {
        self.config.apply_to(&store, WriteMode::SkipIfExists);
        let span = run_span(&self.name, store.id(), self.steps.len());

        async {
            tracing::info!("pipeline run started");
            let mut completed = 0_usize;
            for (position, step) in self.steps.iter().enumerate() {
                if store.is_terminated() {
                    tracing::info!(step = step.name(), "store terminated, stopping run");
                    break;
                }
                let status = self
                    .run_step(step, &store)
                    .instrument(step_span(step.name(), position))
                    .await;
                if status == StepStatus::Completed {
                    completed += 1;
                }
            }
            tracing::info!(
                completed,
                terminated = store.is_terminated(),
                "pipeline run finished"
            );
        }
        .instrument(span)
        .await;

        store
    }

    async fn run_step(&self, step: &Candidate, store: &Store) -> StepStatus {
        let timer = SpanTimer::start(step.name());
        let result = AssertUnwindSafe(self.invoke(step, store))
            .catch_unwind()
            .await;

        let failure = match result {
            Ok(Ok(status)) => return status_logged(timer, status),
            Ok(Err(err)) => format!("{err:#}"),
            Err(panic) => panic_message(panic.as_ref()),
        };

        tracing::error!(step = step.name(), error = %failure, "step failed");
        store.add_message(Message::error(format!(
            "Step '{}' failed: {failure}",
            step.name()
        )));
        store.terminate();
        status_logged(timer, StepStatus::Failed)
    }

    async fn invoke(&self, step: &Candidate, store: &Store) -> anyhow::Result<StepStatus> {
        let args = match resolve(step, store, self.services.as_deref())? {
            Resolution::Ready(args) => args,
            Resolution::Skipped { parameter } => {
                tracing::debug!(step = step.name(), parameter = %parameter, "step skipped");
                store.diagnostic(format!(
                    "Step '{}' skipped: required parameter '{parameter}' could not be resolved",
                    step.name()
                ));
                return Ok(StepStatus::Skipped);
            }
        };

        let outcome = step.step.handler().invoke(args).await?;
        tracing::trace!(step = step.name(), kind = outcome.kind(), "step returned");
        Interpreter::new(store.clone(), step.name())
            .apply(outcome, step.produces.as_ref())
            .await?;
        Ok(StepStatus::Completed)
    }
}

fn status_logged(timer: SpanTimer, status: StepStatus) -> StepStatus {
    timer.finish(status);
    status
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        format!("panicked: {text}")
    } else if let Some(text) = panic.downcast_ref::<String>() {
        format!("panicked: {text}")
    } else {
        "panicked".to_string()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("plan", &self.plan())
            .field("services", &self.services.is_some())
            .field("config", &self.config)
            .finish()
    }
}
