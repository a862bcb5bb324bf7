//! The shared context store ("bag") passed through a run.
//!
//! This module provides:
//! - The case-insensitive [`Store`] with its message log and terminate flag
//! - Type-erased [`Value`]s, records and disposable resources
//! - Lazily evaluated [`Computed`] entries

mod bag;
mod computed;
mod message;
mod value;

pub use bag::{Store, WriteMode, DIAGNOSTICS_KEY, STRICT_MISSING_KEY};
pub use computed::Computed;
pub use message::{Message, Severity, SeverityFilter};
pub use value::{Disposable, Fields, Record, TypeInfo, Value};
