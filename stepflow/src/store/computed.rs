//! Lazily evaluated store entries.

use super::{Store, TypeInfo, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type EvalFn = dyn Fn(&Store) -> anyhow::Result<Value> + Send + Sync;

/// A deferred expression over named store inputs.
///
/// The expression is evaluated every time the entry holding it is read.
/// Within one read, each computed key is evaluated at most once.
#[derive(Clone)]
pub struct Computed {
    inputs: Vec<String>,
    output: Option<TypeInfo>,
    eval: Arc<EvalFn>,
}

impl Computed {
    /// Creates a computed entry producing a `T`.
    pub fn new<T, I, S, F>(inputs: I, eval: F) -> Self
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Store) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: Some(TypeInfo::of::<T>()),
            eval: Arc::new(move |store| eval(store).map(Value::new)),
        }
    }

    /// Creates a computed entry whose result type is only known once it runs.
    ///
    /// The result may itself be another computed entry.
    pub fn dynamic<I, S, F>(inputs: I, eval: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Store) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: None,
            eval: Arc::new(eval),
        }
    }

    /// Returns the names of the entries the expression reads.
    #[must_use]
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Returns the declared result type, if known.
    #[must_use]
    pub const fn output_type(&self) -> Option<TypeInfo> {
        self.output
    }

    pub(crate) fn evaluate(&self, store: &Store) -> anyhow::Result<Value> {
        (self.eval)(store)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}
