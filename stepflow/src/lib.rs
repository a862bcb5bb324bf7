//! # Stepflow
//!
//! A step-pipeline execution engine.
//!
//! Stepflow discovers the steps a source exposes, orders them from explicit
//! hints and inferred data dependencies, and runs them against a shared,
//! case-insensitive context store:
//!
//! - **Discovery**: run/skip markers and a name-based produces convention
//!   (`GetMessage` produces `Message`)
//! - **Ordering**: explicit order, explicit predecessors and inferred
//!   producer edges, with cycle detection at construction
//! - **Resolution**: inputs come from the store, a service lookup, the only
//!   value of their type, or a fallback
//! - **Interpretation**: values, actions, deferred and computed results,
//!   futures and sequences are folded back into the store
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepflow::prelude::*;
//!
//! let source = StepSet::new("greeter")
//!     .with_step(StepDescriptor::from_fn("EnsureName", |_| Ok(Outcome::value("Serge"))))
//!     .with_step(
//!         StepDescriptor::from_fn("GetMessage", |args| {
//!             let name = args.require::<String>("name")?;
//!             Ok(Outcome::value(format!("Hello, {name}!")))
//!         })
//!         .with_input(ParamDescriptor::new::<String>("name").required()),
//!     );
//!
//! let engine = EngineBuilder::new(&source).include_all().build()?;
//! let store = engine.run().await;
//! assert_eq!(store.get("message", String::new())?, "Hello, Serge!");
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

pub mod config;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod services;
pub mod steps;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::RunConfig;
    pub use crate::errors::{ConfigError, ConstructionError, StepflowError, StoreError};
    pub use crate::pipeline::{DiscoveryMode, Engine, EngineBuilder};
    pub use crate::services::{ServiceLookup, ServiceRegistry};
    pub use crate::steps::{
        Args, Outcome, ParamDescriptor, SourceMarkers, StepDescriptor, StepHandler, StepMarker,
        StepSet, StepSource,
    };
    pub use crate::store::{
        Computed, Disposable, Fields, Message, Record, Severity, Store, Value, WriteMode,
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
