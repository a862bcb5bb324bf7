//! Step descriptors, handlers and outcomes.
//!
//! Steps are the units of work an engine discovers, orders and runs.

mod descriptor;
mod handler;
mod naming;
mod outcome;
mod source;

pub use descriptor::{ParamDescriptor, StepDescriptor, StepMarker};
pub use handler::{Args, AsyncFnHandler, FnHandler, StepHandler};
pub use naming::{infer_produces, Produces, ProducesMode, ENSURE_PREFIXES, WRITE_PREFIXES};
pub use outcome::{ActionFn, DeferredFn, Outcome};
pub use source::{SourceMarkers, StepSet, StepSource};
