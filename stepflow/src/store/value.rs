//! Type-erased values held by the store.

use super::Computed;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

type FieldsFn = fn(&(dyn Any + Send + Sync)) -> Vec<(String, Value)>;
type DisposeFn = fn(&(dyn Any + Send + Sync));

/// Identity of a concrete Rust type.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    /// Returns the type info of `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the type id.
    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the type name, for diagnostics only.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if this is the type info of `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A value whose public attributes can be enumerated.
///
/// Records returned from a step without a naming-convention key are spread
/// into the store, one entry per field.
pub trait Fields {
    /// Returns the field names and values.
    fn fields(&self) -> Vec<(String, Value)>;
}

/// A value holding a resource that must be released with the store.
pub trait Disposable {
    /// Releases the resource.
    fn dispose(&self);
}

/// A shared, type-erased value.
///
/// Cloning a `Value` shares the underlying data.
#[derive(Clone)]
pub struct Value {
    data: Arc<dyn Any + Send + Sync>,
    type_info: TypeInfo,
    fields: Option<FieldsFn>,
    dispose: Option<DisposeFn>,
}

impl Value {
    /// Wraps a value.
    ///
    /// Passing a `Value` returns it unchanged rather than nesting it.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let boxed: Box<dyn Any + Send + Sync> = Box::new(value);
        match boxed.downcast::<Self>() {
            Ok(value) => *value,
            Err(boxed) => Self {
                data: Arc::from(boxed),
                type_info: TypeInfo::of::<T>(),
                fields: None,
                dispose: None,
            },
        }
    }

    /// Wraps a record whose fields are spread into the store.
    #[must_use]
    pub fn record<T: Fields + Any + Send + Sync>(value: T) -> Self {
        let mut wrapped = Self::new(value);
        if wrapped.type_info.is::<T>() {
            wrapped.fields = Some(fields_of::<T>);
        }
        wrapped
    }

    /// Wraps a resource that is released when the store is disposed.
    #[must_use]
    pub fn resource<T: Disposable + Any + Send + Sync>(value: T) -> Self {
        let mut wrapped = Self::new(value);
        if wrapped.type_info.is::<T>() {
            wrapped.dispose = Some(dispose_of::<T>);
        }
        wrapped
    }

    /// Wraps a JSON value. Objects become records.
    #[must_use]
    pub fn json(value: serde_json::Value) -> Self {
        let is_object = value.is_object();
        let mut wrapped = Self::new(value);
        if is_object {
            wrapped.fields = Some(json_fields);
        }
        wrapped
    }

    /// Wraps a computed entry.
    #[must_use]
    pub fn computed(computed: Computed) -> Self {
        Self::new(computed)
    }

    /// Returns the type of the wrapped data.
    #[must_use]
    pub const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// Returns the type name of the wrapped data.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_info.name
    }

    /// Returns true if the wrapped data is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.type_info.is::<T>()
    }

    /// Borrows the wrapped data as a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// Clones the wrapped data out as a `T`.
    #[must_use]
    pub fn cloned<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    /// Returns the computed entry, if this value is one.
    #[must_use]
    pub fn as_computed(&self) -> Option<&Computed> {
        self.downcast_ref::<Computed>()
    }

    /// Returns true if this value is a computed entry.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.is::<Computed>()
    }

    /// Returns the type a computed entry declares it produces, or this
    /// value's own type for plain values.
    #[must_use]
    pub fn effective_type(&self) -> Option<TypeInfo> {
        match self.as_computed() {
            Some(computed) => computed.output_type(),
            None => Some(self.type_info),
        }
    }

    /// Returns true if the value's fields can be enumerated.
    #[must_use]
    pub const fn is_record(&self) -> bool {
        self.fields.is_some()
    }

    /// Enumerates the fields of a record.
    #[must_use]
    pub fn fields(&self) -> Option<Vec<(String, Self)>> {
        self.fields.map(|project| project(self.data.as_ref()))
    }

    /// Returns true if both values share the same data.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub(crate) fn data_addr(&self) -> usize {
        Arc::as_ptr(&self.data).cast::<()>() as usize
    }

    pub(crate) fn without_dispose(mut self) -> Self {
        self.dispose = None;
        self
    }

    pub(crate) fn release(&self) -> bool {
        match self.dispose {
            Some(dispose) => {
                dispose(self.data.as_ref());
                true
            }
            None => false,
        }
    }
}

fn fields_of<T: Fields + Any>(data: &(dyn Any + Send + Sync)) -> Vec<(String, Value)> {
    data.downcast_ref::<T>().map(Fields::fields).unwrap_or_default()
}

fn dispose_of<T: Disposable + Any>(data: &(dyn Any + Send + Sync)) {
    if let Some(resource) = data.downcast_ref::<T>() {
        resource.dispose();
    }
}

fn json_fields(data: &(dyn Any + Send + Sync)) -> Vec<(String, Value)> {
    match data.downcast_ref::<serde_json::Value>() {
        Some(serde_json::Value::Object(map)) => map
            .iter()
            .map(|(name, value)| (name.clone(), Value::json(value.clone())))
            .collect(),
        _ => Vec::new(),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Value");
        debug.field("type", &self.type_info.name);
        if let Some(text) = self.downcast_ref::<String>() {
            debug.field("value", text);
        } else if let Some(number) = self.downcast_ref::<i64>() {
            debug.field("value", number);
        } else if let Some(flag) = self.downcast_ref::<bool>() {
            debug.field("value", flag);
        } else if let Some(json) = self.downcast_ref::<serde_json::Value>() {
            debug.field("value", json);
        }
        debug.finish_non_exhaustive()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::new(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::new(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::json(value)
    }
}

impl From<Computed> for Value {
    fn from(value: Computed) -> Self {
        Self::computed(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Self::record(value)
    }
}

/// An ordered set of named values, the simplest kind of record.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds or replaces a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self
            .fields
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Gets a field by name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds a record from any serializable struct or map.
    ///
    /// Each top-level field becomes a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not serialize to a JSON object.
    pub fn from_serialize<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        match serde_json::to_value(value)? {
            serde_json::Value::Object(map) => Ok(Self {
                fields: map
                    .into_iter()
                    .map(|(name, value)| (name, Value::json(value)))
                    .collect(),
            }),
            other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "expected a struct or map, got {other}"
            ))),
        }
    }
}

impl Fields for Record {
    fn fields(&self) -> Vec<(String, Value)> {
        self.fields.clone()
    }
}
