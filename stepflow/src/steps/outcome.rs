//! What a step hands back to the engine.

use crate::store::{Computed, Record, Store, Value};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;

/// A side effect run against the store.
pub type ActionFn = Box<dyn FnOnce(&Store) -> anyhow::Result<()> + Send>;

/// A thunk producing the outcome to interpret in its place.
pub type DeferredFn = Box<dyn FnOnce(&Store) -> anyhow::Result<Outcome> + Send>;

/// The result of one step invocation.
///
/// The engine interprets each shape and folds it back into the store.
#[derive(Default)]
pub enum Outcome {
    /// No effect.
    #[default]
    None,
    /// A value, written under the step's inferred key or spread if it is a
    /// record.
    Value(Value),
    /// Invoked immediately; its result is discarded.
    Action(ActionFn),
    /// Invoked immediately; the returned outcome is interpreted.
    Deferred(DeferredFn),
    /// Evaluated against the store; the result is interpreted.
    Computed(Computed),
    /// Awaited; the resolved outcome is interpreted.
    Async(BoxFuture<'static, anyhow::Result<Outcome>>),
    /// Each element is interpreted in order without the naming convention.
    Sequence(Vec<Outcome>),
}

impl Outcome {
    /// Wraps a value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Wraps a record whose fields are spread into the store.
    pub fn record(record: Record) -> Self {
        Self::Value(Value::record(record))
    }

    /// Wraps a side effect.
    pub fn action<F>(action: F) -> Self
    where
        F: FnOnce(&Store) -> anyhow::Result<()> + Send + 'static,
    {
        Self::Action(Box::new(action))
    }

    /// Wraps a thunk producing another outcome.
    pub fn deferred<F>(thunk: F) -> Self
    where
        F: FnOnce(&Store) -> anyhow::Result<Self> + Send + 'static,
    {
        Self::Deferred(Box::new(thunk))
    }

    /// Wraps a computed expression.
    pub fn computed(computed: Computed) -> Self {
        Self::Computed(computed)
    }

    /// Wraps a future resolving to another outcome.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<Self>> + Send + 'static,
    {
        Self::Async(Box::pin(future))
    }

    /// Collects several outcomes.
    pub fn sequence(outcomes: impl IntoIterator<Item = Self>) -> Self {
        Self::Sequence(outcomes.into_iter().collect())
    }

    /// Returns true for [`Outcome::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the shape name, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Value(_) => "value",
            Self::Action(_) => "action",
            Self::Deferred(_) => "deferred",
            Self::Computed(_) => "computed",
            Self::Async(_) => "async",
            Self::Sequence(_) => "sequence",
        }
    }
}

impl From<()> for Outcome {
    fn from((): ()) -> Self {
        Self::None
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Record> for Outcome {
    fn from(record: Record) -> Self {
        Self::record(record)
    }
}

impl From<Computed> for Outcome {
    fn from(computed: Computed) -> Self {
        Self::Computed(computed)
    }
}

impl From<Vec<Self>> for Outcome {
    fn from(outcomes: Vec<Self>) -> Self {
        Self::Sequence(outcomes)
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Computed(computed) => f.debug_tuple("Computed").field(computed).finish(),
            Self::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
            other => f.write_str(other.kind()),
        }
    }
}
