//! Step handlers and the resolved arguments they receive.

use super::Outcome;
use crate::store::{Store, Value};
use async_trait::async_trait;
use std::any::{type_name, Any};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

/// The arguments resolved for one step invocation.
///
/// Entries line up with the step's declared inputs. An entry is `None` when
/// the input resolved to nothing and was not required.
#[derive(Clone)]
pub struct Args {
    step: String,
    store: Store,
    names: Vec<String>,
    values: Vec<Option<Value>>,
}

impl Args {
    /// Creates an argument list for a step.
    pub fn new(step: impl Into<String>, store: Store) -> Self {
        Self {
            step: step.into(),
            store,
            names: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends a resolved argument.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Option<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: Option<Value>) {
        self.names.push(name.into());
        self.values.push(value);
    }

    /// Returns the name of the step being invoked.
    #[must_use]
    pub fn step_name(&self) -> &str {
        &self.step
    }

    /// Returns the store of the current run.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the argument at a position.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Returns the argument declared under `name`, ignoring case.
    #[must_use]
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|declared| declared.eq_ignore_ascii_case(name))
            .and_then(|index| self.value(index))
    }

    /// Borrows the argument declared under `name` as a `T`.
    #[must_use]
    pub fn get_ref<T: Any>(&self, name: &str) -> Option<&T> {
        self.raw(name).and_then(Value::downcast_ref::<T>)
    }

    /// Clones the argument declared under `name` out as a `T`.
    #[must_use]
    pub fn get<T: Any + Clone>(&self, name: &str) -> Option<T> {
        self.get_ref::<T>(name).cloned()
    }

    /// Clones the argument declared under `name` out as a `T`.
    ///
    /// # Errors
    ///
    /// Returns an error when the argument is absent or holds another type.
    pub fn require<T: Any + Clone>(&self, name: &str) -> anyhow::Result<T> {
        match self.raw(name) {
            Some(value) => value.cloned::<T>().ok_or_else(|| {
                anyhow::anyhow!(
                    "argument '{name}' of step '{}' is a {}, expected {}",
                    self.step,
                    value.type_name(),
                    type_name::<T>()
                )
            }),
            None => Err(anyhow::anyhow!(
                "argument '{name}' of step '{}' was not resolved",
                self.step
            )),
        }
    }

    /// Returns the number of declared arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the step declares no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("step", &self.step)
            .field("names", &self.names)
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

/// The invocable body of a step.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Invokes the step with its resolved arguments.
    async fn invoke(&self, args: Args) -> anyhow::Result<Outcome>;
}

/// A synchronous function-based handler.
pub struct FnHandler<F>
where
    F: Fn(Args) -> anyhow::Result<Outcome> + Send + Sync,
{
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(Args) -> anyhow::Result<Outcome> + Send + Sync,
{
    /// Creates a new function-based handler.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for FnHandler<F>
where
    F: Fn(Args) -> anyhow::Result<Outcome> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> StepHandler for FnHandler<F>
where
    F: Fn(Args) -> anyhow::Result<Outcome> + Send + Sync,
{
    async fn invoke(&self, args: Args) -> anyhow::Result<Outcome> {
        (self.func)(args)
    }
}

/// An async function-based handler.
pub struct AsyncFnHandler<F, Fut>
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnHandler<F, Fut>
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    /// Creates a new async function-based handler.
    pub const fn new(func: F) -> Self {
        Self {
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> fmt::Debug for AsyncFnHandler<F, Fut>
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> StepHandler for AsyncFnHandler<F, Fut>
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    async fn invoke(&self, args: Args) -> anyhow::Result<Outcome> {
        (self.func)(args).await
    }
}
