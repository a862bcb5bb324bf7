//! Error types for the stepflow engine.
//!
//! Construction errors are fatal and surface from [`EngineBuilder::build`]
//! before any step runs. Store errors surface from reads, most often from a
//! computed entry whose evaluation failed.
//!
//! [`EngineBuilder::build`]: crate::pipeline::EngineBuilder::build

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The umbrella error type for stepflow operations.
#[derive(Debug, Error)]
pub enum StepflowError {
    /// The engine could not be constructed.
    #[error("{0}")]
    Construction(#[from] ConstructionError),

    /// A store read or write failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// The run configuration is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

/// Metadata about a construction error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "STEP-ORDER-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Errors raised while discovering and ordering steps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// Two candidate steps share a name or alias.
    #[error("Duplicate step name '{name}': declared by both '{first}' and '{second}'")]
    DuplicateName {
        /// The colliding name or alias.
        name: String,
        /// The step that claimed the name first.
        first: String,
        /// The step that claimed it again.
        second: String,
    },

    /// A step runs after a name that matches no candidate.
    #[error("Step '{step}' runs after unknown step '{predecessor}'")]
    UnknownPredecessor {
        /// The dependent step.
        step: String,
        /// The unresolved predecessor name.
        predecessor: String,
    },

    /// A step names itself as its predecessor.
    #[error("Step '{step}' cannot run after itself")]
    SelfReference {
        /// The offending step.
        step: String,
    },

    /// Explicit predecessor edges form a cycle.
    #[error("Circular dependency between steps: {}", path.join(" -> "))]
    CircularDependency {
        /// The steps forming the cycle, first step repeated at the end.
        path: Vec<String>,
    },
}

impl ConstructionError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DuplicateName { .. } => "STEP-DISCOVERY-DUPLICATE",
            Self::UnknownPredecessor { .. } => "STEP-ORDER-UNKNOWN",
            Self::SelfReference { .. } => "STEP-ORDER-SELF",
            Self::CircularDependency { .. } => "STEP-ORDER-CYCLE",
        }
    }

    /// Returns the names of the steps involved.
    #[must_use]
    pub fn steps(&self) -> Vec<String> {
        match self {
            Self::DuplicateName { first, second, .. } => vec![first.clone(), second.clone()],
            Self::UnknownPredecessor { step, .. } | Self::SelfReference { step } => {
                vec![step.clone()]
            }
            Self::CircularDependency { path } => path.clone(),
        }
    }

    /// Builds diagnostic metadata for the error.
    #[must_use]
    pub fn error_info(&self) -> ErrorInfo {
        let info = ErrorInfo::new(self.code(), self.to_string());
        match self {
            Self::DuplicateName { name, .. } => info
                .with_context_entry("name", name)
                .with_fix_hint("Rename one of the steps or drop the colliding alias."),
            Self::UnknownPredecessor { predecessor, .. } => info
                .with_context_entry("predecessor", predecessor)
                .with_fix_hint(
                    "Check the predecessor name for typos and make sure that step is not excluded by discovery.",
                ),
            Self::SelfReference { step } => info
                .with_context_entry("step", step)
                .with_fix_hint("Remove the predecessor or point it at another step."),
            Self::CircularDependency { .. } => info
                .with_fix_hint("Remove one of the predecessor links in the cycle to break it."),
        }
    }
}

/// Errors raised by store reads.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A strict read found no entry under the key.
    #[error("Key '{key}' not found in store")]
    KeyNotFound {
        /// The missing key.
        key: String,
    },

    /// The entry holds a value of a different type.
    #[error("Key '{key}' holds a value of type {actual}, expected {expected}")]
    TypeMismatch {
        /// The key that was read.
        key: String,
        /// The requested type.
        expected: &'static str,
        /// The stored type.
        actual: &'static str,
    },

    /// A computed entry failed to evaluate.
    #[error("Failed to evaluate computed entry '{key}'")]
    Evaluation {
        /// The key of the computed entry.
        key: String,
        /// The evaluation failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A computed entry read itself while being evaluated.
    #[error("Computed entry '{key}' depends on itself")]
    ComputedCycle {
        /// The key being evaluated.
        key: String,
    },
}

impl StoreError {
    /// Creates an evaluation error from a step-level failure.
    #[must_use]
    pub fn evaluation(key: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Evaluation {
            key: key.into(),
            source: source.into(),
        }
    }
}

/// Errors raised while loading a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds an unparseable value.
    #[error("Invalid value '{value}' for {var}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// The rejected value.
        value: String,
    },

    /// The configuration document could not be parsed.
    #[error("Invalid run configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
