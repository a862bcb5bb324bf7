//! Test assertions for run results.

use crate::pipeline::Engine;
use crate::store::{Severity, Store};
use std::any::Any;
use std::fmt::Debug;

/// Asserts that the run was terminated.
pub fn assert_terminated(store: &Store) {
    assert!(
        store.is_terminated(),
        "Expected store to be terminated. Messages: {:?}",
        store.messages()
    );
}

/// Asserts that the run was not terminated.
pub fn assert_not_terminated(store: &Store) {
    assert!(
        !store.is_terminated(),
        "Expected store not to be terminated. Messages: {:?}",
        store.messages()
    );
}

/// Asserts the number of Error messages.
pub fn assert_error_count(store: &Store, expected: usize) {
    let errors = store.messages_matching(Severity::Error);
    assert_eq!(
        errors.len(),
        expected,
        "Expected {} error message(s), got {:?}",
        expected,
        errors
    );
}

/// Asserts that some message of the given severity contains `needle`.
pub fn assert_message_contains(store: &Store, severity: Severity, needle: &str) {
    let messages = store.messages_matching(severity);
    assert!(
        messages.iter().any(|message| message.text.contains(needle)),
        "Expected a {} message containing '{}', got {:?}",
        severity,
        needle,
        messages
    );
}

/// Asserts that the key holds `expected`.
pub fn assert_value_eq<T>(store: &Store, key: &str, expected: &T)
where
    T: Any + Clone + PartialEq + Debug,
{
    let actual = store.get_or_fail::<T>(key);
    assert!(
        matches!(&actual, Ok(Some(value)) if value == expected),
        "Expected {:?} under key '{}', got {:?}. Keys: {:?}",
        expected,
        key,
        actual,
        store.keys()
    );
}

/// Asserts that the key is absent.
pub fn assert_absent(store: &Store, key: &str) {
    assert!(
        !store.contains_key(key),
        "Expected key '{}' to be absent. Keys: {:?}",
        key,
        store.keys()
    );
}

/// Asserts the execution order of an engine.
pub fn assert_plan(engine: &Engine, expected: &[&str]) {
    assert_eq!(
        engine.plan(),
        expected,
        "Unexpected execution order for pipeline '{}'",
        engine.name()
    );
}
