//! Pipeline construction and execution.
//!
//! This module provides:
//! - Step discovery over a [`StepSource`](crate::steps::StepSource)
//! - Deterministic ordering from explicit hints and inferred data edges
//! - Parameter resolution and outcome interpretation
//! - The [`Engine`] run loop and its [`EngineBuilder`]

mod builder;
pub mod discovery;
#[cfg(test)]
mod integration_tests;
pub mod interpret;
pub mod ordering;
pub mod resolver;
mod runner;

pub use builder::EngineBuilder;
pub use discovery::{Candidate, DiscoveryMode};
pub use interpret::Interpreter;
pub use resolver::Resolution;
pub use runner::Engine;
