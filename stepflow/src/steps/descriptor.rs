//! Step and parameter descriptors.

use super::{infer_produces, Args, AsyncFnHandler, FnHandler, Outcome, Produces, StepHandler};
use crate::store::{Store, TypeInfo, Value};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type DefaultCheck = fn(&Value) -> bool;

/// Whether discovery picks a step up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMarker {
    /// Runs only when discovery includes unmarked steps.
    #[default]
    Unmarked,
    /// Always a candidate.
    Run,
    /// Never a candidate.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Typed,
    Any,
    Store,
}

/// A declared input of a step.
#[derive(Clone)]
pub struct ParamDescriptor {
    name: String,
    aliases: Vec<String>,
    type_info: TypeInfo,
    kind: ParamKind,
    required: bool,
    fallback: Option<Value>,
    skip_resolution: bool,
    default_check: Option<DefaultCheck>,
}

impl ParamDescriptor {
    /// Declares an input of type `T`.
    ///
    /// When the input is required, a value equal to `T::default()` counts
    /// as missing.
    pub fn new<T: Any + Default + PartialEq>(name: impl Into<String>) -> Self {
        let mut param = Self::with_kind(name, TypeInfo::of::<T>(), ParamKind::Typed);
        param.default_check = Some(is_default_of::<T>);
        param
    }

    /// Declares an input of a type with no default value, such as a
    /// service handle. Any present value of type `T` satisfies it.
    pub fn opaque<T: Any>(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeInfo::of::<T>(), ParamKind::Typed)
    }

    /// Declares an input that accepts a value of any type.
    pub fn any(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeInfo::of::<Value>(), ParamKind::Any)
    }

    /// Declares an input receiving the run's store.
    pub fn store(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeInfo::of::<Store>(), ParamKind::Store)
    }

    fn with_kind(name: impl Into<String>, type_info: TypeInfo, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            type_info,
            kind,
            required: false,
            fallback: None,
            skip_resolution: false,
            default_check: None,
        }
    }

    /// Marks the input as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Adds an alternative store key.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Sets the value used when nothing else resolves.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<Value>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// Excludes the input from resolution; it always receives its fallback.
    #[must_use]
    pub const fn skip_resolution(mut self) -> Self {
        self.skip_resolution = true;
        self
    }

    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the aliases.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Returns the name followed by the aliases.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Returns the declared type.
    #[must_use]
    pub const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// Returns true if the input was marked required.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the fallback value.
    #[must_use]
    pub const fn fallback(&self) -> Option<&Value> {
        self.fallback.as_ref()
    }

    /// Returns true if the input is excluded from resolution.
    #[must_use]
    pub const fn is_skipped_from_resolution(&self) -> bool {
        self.skip_resolution
    }

    /// Returns true if the input receives the store.
    #[must_use]
    pub fn is_store(&self) -> bool {
        self.kind == ParamKind::Store
    }

    /// Returns true if the input accepts any type.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.kind == ParamKind::Any
    }

    /// Returns true if `value` can be passed to this input.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        self.is_any() || value.type_info() == self.type_info
    }

    /// Returns true if `value` equals the default of the input type.
    #[must_use]
    pub fn is_default(&self, value: &Value) -> bool {
        self.default_check.is_some_and(|check| check(value))
    }
}

fn is_default_of<T: Any + Default + PartialEq>(value: &Value) -> bool {
    value
        .downcast_ref::<T>()
        .is_some_and(|inner| *inner == T::default())
}

impl fmt::Debug for ParamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("type", &self.type_info)
            .field("required", &self.required)
            .field("fallback", &self.fallback)
            .field("skip_resolution", &self.skip_resolution)
            .finish_non_exhaustive()
    }
}

/// Metadata and handler of one step.
#[derive(Clone)]
pub struct StepDescriptor {
    name: String,
    aliases: Vec<String>,
    inputs: Vec<ParamDescriptor>,
    order: Option<i32>,
    after: Option<String>,
    strict: bool,
    description: Option<String>,
    marker: StepMarker,
    handler: Arc<dyn StepHandler>,
}

impl StepDescriptor {
    /// Creates a step from a handler.
    pub fn new(name: impl Into<String>, handler: impl StepHandler + 'static) -> Self {
        Self::with_handler(name, Arc::new(handler))
    }

    /// Creates a step sharing an existing handler.
    pub fn with_handler(name: impl Into<String>, handler: Arc<dyn StepHandler>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            inputs: Vec::new(),
            order: None,
            after: None,
            strict: false,
            description: None,
            marker: StepMarker::Unmarked,
            handler,
        }
    }

    /// Creates a step from a synchronous function.
    pub fn from_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Args) -> anyhow::Result<Outcome> + Send + Sync + 'static,
    {
        Self::new(name, FnHandler::new(func))
    }

    /// Creates a step from an async function.
    pub fn from_async_fn<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Outcome>> + Send + 'static,
    {
        Self::new(name, AsyncFnHandler::new(func))
    }

    /// Declares the next input.
    #[must_use]
    pub fn with_input(mut self, input: ParamDescriptor) -> Self {
        self.inputs.push(input);
        self
    }

    /// Places the step in the explicitly ordered group.
    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Runs the step immediately after the named one.
    #[must_use]
    pub fn with_after(mut self, predecessor: impl Into<String>) -> Self {
        self.after = Some(predecessor.into());
        self
    }

    /// Adds an alternative step name.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Makes every input required.
    #[must_use]
    pub const fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Marks the step to run.
    #[must_use]
    pub const fn marked(mut self) -> Self {
        self.marker = StepMarker::Run;
        self
    }

    /// Marks the step to never run.
    #[must_use]
    pub const fn skipped(mut self) -> Self {
        self.marker = StepMarker::Skip;
        self
    }

    /// Returns the step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the aliases.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Returns the name followed by the aliases.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Returns true if `name` is the step name or one of its aliases.
    #[must_use]
    pub fn answers_to(&self, name: &str) -> bool {
        self.names().any(|own| own.eq_ignore_ascii_case(name))
    }

    /// Returns the declared inputs in order.
    #[must_use]
    pub fn inputs(&self) -> &[ParamDescriptor] {
        &self.inputs
    }

    /// Returns the explicit order.
    #[must_use]
    pub const fn order(&self) -> Option<i32> {
        self.order
    }

    /// Returns the explicit predecessor.
    #[must_use]
    pub fn after(&self) -> Option<&str> {
        self.after.as_deref()
    }

    /// Returns true if the step itself is strict.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the discovery marker.
    #[must_use]
    pub const fn marker(&self) -> StepMarker {
        self.marker
    }

    /// Returns the key the step is presumed to produce.
    #[must_use]
    pub fn produces(&self) -> Option<Produces> {
        infer_produces(&self.name)
    }

    /// Returns the handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn StepHandler> {
        &self.handler
    }
}

impl fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("inputs", &self.inputs)
            .field("order", &self.order)
            .field("after", &self.after)
            .field("strict", &self.strict)
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}
