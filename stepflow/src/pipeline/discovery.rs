//! Selects the candidate steps of a source.

use crate::errors::ConstructionError;
use crate::steps::{Produces, StepDescriptor, StepMarker, StepSource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which unmarked steps discovery includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Only steps marked to run.
    #[default]
    IncludeMarkedOnly,
    /// Every step not marked to skip.
    IncludeAll,
}

impl DiscoveryMode {
    /// Returns true if a step with this marker is a candidate.
    #[must_use]
    pub const fn includes(self, marker: StepMarker) -> bool {
        match marker {
            StepMarker::Run => true,
            StepMarker::Skip => false,
            StepMarker::Unmarked => matches!(self, Self::IncludeAll),
        }
    }
}

/// A discovered step with the source-level markers folded in.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The step.
    pub step: StepDescriptor,
    /// The key the step is presumed to produce.
    pub produces: Option<Produces>,
    /// The step or its source is strict.
    pub strict: bool,
    /// The source requires every parameter.
    pub all_required: bool,
}

impl Candidate {
    /// Returns the step name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.step.name()
    }
}

/// Returns the candidate steps of `source` in declaration order.
///
/// # Errors
///
/// Returns `DuplicateName` when two candidates share a name or alias,
/// ignoring case.
pub fn discover(
    source: &dyn StepSource,
    mode: DiscoveryMode,
) -> Result<Vec<Candidate>, ConstructionError> {
    let markers = source.markers();
    let mut claimed: HashMap<String, String> = HashMap::new();
    let mut candidates = Vec::new();

    for step in source.steps() {
        if !mode.includes(step.marker()) {
            tracing::trace!(source = source.name(), step = step.name(), "step not discovered");
            continue;
        }

        let mut own = Vec::new();
        for name in step.names() {
            let normalized = name.to_lowercase();
            if own.contains(&normalized) {
                continue;
            }
            if let Some(first) = claimed.get(&normalized) {
                return Err(ConstructionError::DuplicateName {
                    name: name.to_string(),
                    first: first.clone(),
                    second: step.name().to_string(),
                });
            }
            own.push(normalized);
        }
        for normalized in own {
            claimed.insert(normalized, step.name().to_string());
        }

        candidates.push(Candidate {
            produces: step.produces(),
            strict: markers.strict || step.is_strict(),
            all_required: markers.all_required,
            step,
        });
    }

    tracing::debug!(
        source = source.name(),
        ?mode,
        candidates = candidates.len(),
        "steps discovered"
    );
    Ok(candidates)
}
