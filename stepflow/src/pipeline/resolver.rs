//! Maps store values and services onto a step's declared inputs.

use super::discovery::Candidate;
use crate::errors::StoreError;
use crate::services::ServiceLookup;
use crate::steps::{Args, ParamDescriptor};
use crate::store::{Store, Value};

/// The result of resolving a step's arguments.
#[derive(Debug)]
pub enum Resolution {
    /// Every required input resolved.
    Ready(Args),
    /// A required input could not be resolved; the step does not run.
    Skipped {
        /// The input that could not be resolved.
        parameter: String,
    },
}

/// Resolves the arguments of a candidate step.
///
/// Each input is resolved, in order of precedence, to the store itself, a
/// compatible store value under its name or aliases, a service of its
/// type, the only store value of its type (when no sibling input shares
/// that type), or its fallback.
///
/// # Errors
///
/// Returns an error when reading a computed entry fails.
pub fn resolve(
    candidate: &Candidate,
    store: &Store,
    services: Option<&dyn ServiceLookup>,
) -> Result<Resolution, StoreError> {
    let inputs = candidate.step.inputs();
    let mut args = Args::new(candidate.name(), store.clone());

    for param in inputs {
        if param.is_skipped_from_resolution() {
            args.push(param.name(), param.fallback().cloned());
            continue;
        }

        let value = resolve_param(param, inputs, store, services)?;
        let required = param.is_required() || candidate.strict || candidate.all_required;
        if required && param.fallback().is_none() && is_missing(param, value.as_ref()) {
            return Ok(Resolution::Skipped {
                parameter: param.name().to_string(),
            });
        }
        args.push(param.name(), value);
    }

    Ok(Resolution::Ready(args))
}

fn resolve_param(
    param: &ParamDescriptor,
    siblings: &[ParamDescriptor],
    store: &Store,
    services: Option<&dyn ServiceLookup>,
) -> Result<Option<Value>, StoreError> {
    if param.is_store() {
        return Ok(Some(Value::new(store.clone())));
    }

    for name in param.names() {
        if let Some(value) = store.get_value(name)? {
            if param.accepts(&value) {
                return Ok(Some(value));
            }
            tracing::trace!(
                param = param.name(),
                key = name,
                found = value.type_name(),
                "store value has an incompatible type"
            );
            break;
        }
    }

    if param.is_any() {
        return Ok(param.fallback().cloned());
    }

    if let Some(value) = services
        .and_then(|lookup| lookup.lookup(&param.type_info()))
        .filter(|value| param.accepts(value))
    {
        return Ok(Some(value));
    }

    let same_type = siblings
        .iter()
        .filter(|sibling| !sibling.is_store() && sibling.type_info() == param.type_info())
        .count();
    if same_type == 1 {
        if let Some(value) = store.single_of_type(param.type_info())? {
            return Ok(Some(value));
        }
    }

    Ok(param.fallback().cloned())
}

fn is_missing(param: &ParamDescriptor, value: Option<&Value>) -> bool {
    value.map_or(true, |value| !param.accepts(value) || param.is_default(value))
}
