//! External service lookup consulted during parameter resolution.

use crate::store::{TypeInfo, Value};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Provides values by type to steps whose inputs the store cannot satisfy.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceLookup: Send + Sync {
    /// Returns a value of the requested type, if one is available.
    fn lookup(&self, type_info: &TypeInfo) -> Option<Value>;
}

impl<F> ServiceLookup for F
where
    F: Fn(&TypeInfo) -> Option<Value> + Send + Sync,
{
    fn lookup(&self, type_info: &TypeInfo) -> Option<Value> {
        self(type_info)
    }
}

/// A type-keyed set of services.
///
/// Trait-object services are registered and requested as `Arc<dyn Trait>`.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<TypeInfo, Value>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service, replacing any previous one of the same type.
    pub fn register<T: Any + Send + Sync>(&mut self, service: T) {
        let value = Value::new(service);
        self.services.insert(value.type_info(), value);
    }

    /// Registers a service.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, service: T) -> Self {
        self.register(service);
        self
    }

    /// Returns the number of services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns true if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Shares the registry as a lookup.
    #[must_use]
    pub fn into_shared(self) -> Arc<dyn ServiceLookup> {
        Arc::new(self)
    }
}

impl ServiceLookup for ServiceRegistry {
    fn lookup(&self, type_info: &TypeInfo) -> Option<Value> {
        self.services.get(type_info).cloned()
    }
}
