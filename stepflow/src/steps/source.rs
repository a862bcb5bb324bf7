//! Objects that expose candidate steps.

use super::StepDescriptor;
use serde::{Deserialize, Serialize};

/// Markers applying to every step of a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMarkers {
    /// Every step is strict.
    pub strict: bool,
    /// Every parameter is required.
    pub all_required: bool,
}

/// An object exposing a set of candidate steps.
pub trait StepSource {
    /// Returns the name of the source, used as the pipeline name.
    fn name(&self) -> &str;

    /// Returns the candidate steps in declaration order.
    fn steps(&self) -> Vec<StepDescriptor>;

    /// Returns the object-level markers.
    fn markers(&self) -> SourceMarkers {
        SourceMarkers::default()
    }
}

/// A plain list of steps, the simplest [`StepSource`].
#[derive(Debug, Clone, Default)]
pub struct StepSet {
    name: String,
    steps: Vec<StepDescriptor>,
    markers: SourceMarkers,
}

impl StepSet {
    /// Creates an empty step set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a step.
    #[must_use]
    pub fn with_step(mut self, step: StepDescriptor) -> Self {
        self.steps.push(step);
        self
    }

    /// Adds a step.
    pub fn push(&mut self, step: StepDescriptor) {
        self.steps.push(step);
    }

    /// Makes every step strict.
    #[must_use]
    pub const fn strict(mut self) -> Self {
        self.markers.strict = true;
        self
    }

    /// Makes every parameter required.
    #[must_use]
    pub const fn all_required(mut self) -> Self {
        self.markers.all_required = true;
        self
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the set has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl StepSource for StepSet {
    fn name(&self) -> &str {
        &self.name
    }

    fn steps(&self) -> Vec<StepDescriptor> {
        self.steps.clone()
    }

    fn markers(&self) -> SourceMarkers {
        self.markers
    }
}
