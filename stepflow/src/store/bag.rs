//! The shared, case-insensitive context store.

use super::{Computed, Message, Severity, SeverityFilter, TypeInfo, Value};
use crate::errors::StoreError;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Key of the flag enabling Debug diagnostics.
pub const DIAGNOSTICS_KEY: &str = "DiagnosticsEnabled";

/// Key of the flag making [`Store::get_or_fail`] fail on absent keys.
pub const STRICT_MISSING_KEY: &str = "StrictOnMissingKey";

/// Upper bound on computed-to-computed unwrapping within one read.
const MAX_UNWRAP_DEPTH: usize = 64;

/// How a write treats an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace any existing value.
    #[default]
    Overwrite,
    /// Keep the existing value and drop the write.
    SkipIfExists,
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    value: Value,
    seq: u64,
}

/// Evaluation state of the read currently in progress.
#[derive(Debug, Default)]
struct ReadScope {
    depth: usize,
    evaluating: Vec<String>,
    memo: HashMap<String, Value>,
}

struct StoreInner {
    id: Uuid,
    entries: RwLock<HashMap<String, Entry>>,
    next_seq: AtomicU64,
    messages: RwLock<Vec<Message>>,
    terminated: AtomicBool,
    disposed: AtomicBool,
    scope: Mutex<ReadScope>,
}

impl StoreInner {
    fn new(entries: HashMap<String, Entry>, next_seq: u64, messages: Vec<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entries: RwLock::new(entries),
            next_seq: AtomicU64::new(next_seq),
            messages: RwLock::new(messages),
            terminated: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            scope: Mutex::new(ReadScope::default()),
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if !*self.disposed.get_mut() {
            let entries = std::mem::take(self.entries.get_mut());
            release_all(entries.into_values().collect());
        }
    }
}

/// Releases every resource once, in insertion order.
fn release_all(mut entries: Vec<Entry>) -> usize {
    entries.sort_by_key(|entry| entry.seq);
    let mut seen = HashSet::new();
    let mut released = 0;
    for entry in &entries {
        if seen.insert(entry.value.data_addr()) && entry.value.release() {
            released += 1;
        }
    }
    released
}

fn normalize(key: &str) -> String {
    key.to_lowercase()
}

/// Leaves the read scope when dropped; clears the memo once the outermost
/// read finishes.
struct ScopeGuard<'a> {
    inner: &'a StoreInner,
    key: Option<String>,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        let mut scope = self.inner.scope.lock();
        if let Some(key) = &self.key {
            if let Some(pos) = scope.evaluating.iter().rposition(|k| k == key) {
                scope.evaluating.remove(pos);
            }
        }
        scope.depth = scope.depth.saturating_sub(1);
        if scope.depth == 0 {
            scope.memo.clear();
        }
    }
}

/// The shared context of a run.
///
/// Keys are case-insensitive. A `Store` is a handle: clones share the same
/// entries, messages and terminate flag. Use [`Store::copy`] for an
/// independent store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner::new(HashMap::new(), 0, Vec::new())),
        }
    }

    /// Returns the run id of this store.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Returns true if both handles point at the same store.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Writes a value.
    ///
    /// Returns true if the value was written, false if `SkipIfExists`
    /// found an existing entry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>, mode: WriteMode) -> bool {
        let key = key.into();
        let normalized = normalize(&key);
        let mut entries = self.inner.entries.write();

        match entries.get_mut(&normalized) {
            Some(_) if mode == WriteMode::SkipIfExists => {
                tracing::trace!(key = %key, "write skipped, key exists");
                false
            }
            Some(entry) => {
                entry.value = value.into();
                true
            }
            None => {
                let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
                entries.insert(
                    normalized,
                    Entry {
                        key,
                        value: value.into(),
                        seq,
                    },
                );
                true
            }
        }
    }

    /// Gets the stored value without evaluating computed entries.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.inner
            .entries
            .read()
            .get(&normalize(key))
            .map(|entry| entry.value.clone())
    }

    /// Gets a value, evaluating it if it is a computed entry.
    ///
    /// # Errors
    ///
    /// Returns an error if a computed entry fails to evaluate.
    pub fn get_value(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let Some(raw) = self.get_raw(key) else {
            return Ok(None);
        };
        if !raw.is_computed() {
            return Ok(Some(raw));
        }
        self.evaluate_entry(key, raw).map(Some)
    }

    /// Gets a typed value, falling back to `default` when the key is absent
    /// or holds another type.
    ///
    /// # Errors
    ///
    /// Returns an error if a computed entry fails to evaluate.
    pub fn get<T: Any + Clone>(&self, key: &str, default: T) -> Result<T, StoreError> {
        Ok(self
            .get_value(key)?
            .and_then(|value| value.cloned::<T>())
            .unwrap_or(default))
    }

    /// Gets a typed value.
    ///
    /// Absent keys yield `Ok(None)`, unless [`STRICT_MISSING_KEY`] is set.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` for absent keys in strict mode, `TypeMismatch`
    /// when the entry holds another type, and evaluation errors from
    /// computed entries.
    pub fn get_or_fail<T: Any + Clone>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get_value(key)? {
            Some(value) => value
                .cloned::<T>()
                .map(Some)
                .ok_or_else(|| StoreError::TypeMismatch {
                    key: key.to_string(),
                    expected: std::any::type_name::<T>(),
                    actual: value.type_name(),
                }),
            None if self.strict_on_missing_key() => Err(StoreError::KeyNotFound {
                key: key.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Returns true if an entry exists under the key, without evaluating it.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.entries.read().contains_key(&normalize(key))
    }

    /// Returns true if the key holds a `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if a computed entry fails to evaluate.
    pub fn contains<T: Any>(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get_value(key)?.is_some_and(|value| value.is::<T>()))
    }

    /// Removes an entry, returning its raw value.
    pub fn delete(&self, key: &str) -> Option<Value> {
        self.inner
            .entries
            .write()
            .remove(&normalize(key))
            .map(|entry| entry.value)
    }

    /// Counts the entries holding (or computing) a value of the given type.
    #[must_use]
    pub fn count_of_type(&self, type_info: TypeInfo) -> usize {
        self.inner
            .entries
            .read()
            .values()
            .filter(|entry| entry.value.effective_type() == Some(type_info))
            .count()
    }

    /// Returns true iff exactly one stored value is a `T`.
    #[must_use]
    pub fn contains_single_of_type<T: Any>(&self) -> bool {
        self.count_of_type(TypeInfo::of::<T>()) == 1
    }

    /// Returns the only value of the given type, or `None` when there are
    /// zero or several.
    ///
    /// # Errors
    ///
    /// Returns an error if the matching computed entry fails to evaluate.
    pub fn single_of_type(&self, type_info: TypeInfo) -> Result<Option<Value>, StoreError> {
        let matches: Vec<String> = self
            .inner
            .entries
            .read()
            .values()
            .filter(|entry| entry.value.effective_type() == Some(type_info))
            .map(|entry| entry.key.clone())
            .collect();

        match matches.as_slice() {
            [key] => self.get_value(key),
            _ => Ok(None),
        }
    }

    /// Evaluates a computed expression against this store.
    ///
    /// Nested computed results are unwrapped.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression fails.
    pub fn evaluate(&self, computed: &Computed) -> Result<Value, StoreError> {
        self.inner.scope.lock().depth += 1;
        let _guard = ScopeGuard {
            inner: &self.inner,
            key: None,
        };
        self.unwrap_computed("<computed>", Value::computed(computed.clone()))
    }

    fn evaluate_entry(&self, key: &str, raw: Value) -> Result<Value, StoreError> {
        let normalized = normalize(key);
        {
            let mut scope = self.inner.scope.lock();
            if let Some(value) = scope.memo.get(&normalized) {
                return Ok(value.clone());
            }
            if scope.evaluating.contains(&normalized) {
                return Err(StoreError::ComputedCycle {
                    key: key.to_string(),
                });
            }
            scope.evaluating.push(normalized.clone());
            scope.depth += 1;
        }
        let _guard = ScopeGuard {
            inner: &self.inner,
            key: Some(normalized.clone()),
        };

        let value = self.unwrap_computed(key, raw)?;
        self.inner.scope.lock().memo.insert(normalized, value.clone());
        Ok(value)
    }

    fn unwrap_computed(&self, key: &str, raw: Value) -> Result<Value, StoreError> {
        let mut current = raw;
        for _ in 0..MAX_UNWRAP_DEPTH {
            let next = match current.as_computed() {
                Some(computed) => computed
                    .evaluate(self)
                    .map_err(|err| StoreError::evaluation(key, err))?,
                None => return Ok(current),
            };
            current = next;
        }
        Err(StoreError::ComputedCycle {
            key: key.to_string(),
        })
    }

    /// Appends a message to the log.
    pub fn add_message(&self, message: Message) {
        self.inner.messages.write().push(message);
    }

    /// Records a Debug message if diagnostics are enabled.
    ///
    /// Returns true if the message was recorded.
    pub fn diagnostic(&self, text: impl Into<String>) -> bool {
        if !self.diagnostics_enabled() {
            return false;
        }
        self.add_message(Message::debug(text));
        true
    }

    /// Returns a copy of the full message log.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner.messages.read().clone()
    }

    /// Returns the messages matching a severity filter.
    #[must_use]
    pub fn messages_matching(&self, filter: impl Into<SeverityFilter>) -> Vec<Message> {
        let filter = filter.into();
        self.inner
            .messages
            .read()
            .iter()
            .filter(|message| filter.contains(message.severity))
            .cloned()
            .collect()
    }

    /// Returns true if any Error message was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.inner
            .messages
            .read()
            .iter()
            .any(|message| message.severity == Severity::Error)
    }

    /// Exports the message log as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn messages_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&*self.inner.messages.read())
    }

    /// Stops the run after the current step.
    pub fn terminate(&self) {
        self.inner.terminated.store(true, Ordering::SeqCst);
    }

    /// Returns true once the store has been terminated.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::SeqCst)
    }

    fn flag(&self, key: &str) -> bool {
        self.get_raw(key)
            .and_then(|value| value.cloned::<bool>())
            .unwrap_or(false)
    }

    /// Returns true if Debug diagnostics are recorded.
    #[must_use]
    pub fn diagnostics_enabled(&self) -> bool {
        self.flag(DIAGNOSTICS_KEY)
    }

    /// Enables or disables Debug diagnostics.
    pub fn set_diagnostics(&self, enabled: bool) {
        self.set(DIAGNOSTICS_KEY, enabled, WriteMode::Overwrite);
    }

    /// Returns true if absent keys fail [`Store::get_or_fail`].
    #[must_use]
    pub fn strict_on_missing_key(&self) -> bool {
        self.flag(STRICT_MISSING_KEY)
    }

    /// Enables or disables strict missing-key reads.
    pub fn set_strict_on_missing_key(&self, strict: bool) {
        self.set(STRICT_MISSING_KEY, strict, WriteMode::Overwrite);
    }

    /// Creates an independent store with the same entries.
    ///
    /// Values are shared with this store, which keeps ownership of any
    /// resources: disposing the copy releases nothing.
    #[must_use]
    pub fn copy(&self, carry_messages: bool) -> Self {
        let entries: HashMap<String, Entry> = self
            .inner
            .entries
            .read()
            .iter()
            .map(|(normalized, entry)| {
                let mut entry = entry.clone();
                entry.value = entry.value.without_dispose();
                (normalized.clone(), entry)
            })
            .collect();
        let messages = if carry_messages {
            self.messages()
        } else {
            Vec::new()
        };
        let next_seq = self.inner.next_seq.load(Ordering::Relaxed);

        Self {
            inner: Arc::new(StoreInner::new(entries, next_seq, messages)),
        }
    }

    /// Clears the store and releases every resource it holds.
    ///
    /// Returns the number of resources released. Disposing twice releases
    /// nothing the second time.
    pub fn dispose(&self) -> usize {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let entries = std::mem::take(&mut *self.inner.entries.write());
        let released = release_all(entries.into_values().collect());
        tracing::debug!(run_id = %self.inner.id, released, "store disposed");
        released
    }

    /// Returns the keys in insertion order, with their original casing.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.sorted_entries()
            .into_iter()
            .map(|entry| entry.key)
            .collect()
    }

    /// Returns each key with the type name of its raw value.
    #[must_use]
    pub fn describe(&self) -> Vec<(String, &'static str)> {
        self.sorted_entries()
            .into_iter()
            .map(|entry| (entry.key, entry.value.type_name()))
            .collect()
    }

    fn sorted_entries(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.inner.entries.read().values().cloned().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Returns true if the store has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("keys", &self.keys())
            .field("terminated", &self.is_terminated())
            .field("messages", &self.inner.messages.read().len())
            .finish()
    }
}
