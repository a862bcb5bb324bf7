//! Folds step outcomes back into the store.

use crate::steps::{Outcome, Produces};
use crate::store::{Store, Value, WriteMode};
use futures::future::{BoxFuture, FutureExt};

/// Applies the outcomes of one step.
#[derive(Debug, Clone)]
pub struct Interpreter {
    store: Store,
    step: String,
}

impl Interpreter {
    /// Creates an interpreter for a step's outcomes.
    pub fn new(store: Store, step: impl Into<String>) -> Self {
        Self {
            store,
            step: step.into(),
        }
    }

    /// Interprets an outcome. `naming` is the key the step's own result is
    /// written under, if its name follows the produces convention.
    ///
    /// # Errors
    ///
    /// Returns the failure of an action, thunk, future or computed
    /// evaluation.
    pub fn apply<'a>(
        &'a self,
        outcome: Outcome,
        naming: Option<&'a Produces>,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        async move {
            match outcome {
                Outcome::None => Ok(()),
                Outcome::Value(value) => {
                    let value = self.resolve(value)?;
                    self.write(value, naming);
                    Ok(())
                }
                Outcome::Action(action) => action(&self.store),
                Outcome::Deferred(thunk) => {
                    let next = thunk(&self.store)?;
                    self.apply(next, naming).await
                }
                Outcome::Computed(computed) => {
                    let value = self.store.evaluate(&computed)?;
                    self.write(value, naming);
                    Ok(())
                }
                Outcome::Async(future) => {
                    let next = future.await?;
                    self.apply(next, naming).await
                }
                Outcome::Sequence(items) => {
                    for item in items {
                        self.apply(item, None).await?;
                    }
                    Ok(())
                }
            }
        }
        .boxed()
    }

    fn resolve(&self, value: Value) -> anyhow::Result<Value> {
        match value.as_computed() {
            Some(computed) => Ok(self.store.evaluate(computed)?),
            None => Ok(value),
        }
    }

    fn write(&self, value: Value, naming: Option<&Produces>) {
        if let Some(produces) = naming {
            let written = self
                .store
                .set(produces.key.as_str(), value, produces.mode.write_mode());
            tracing::debug!(step = %self.step, key = %produces.key, written, "result stored");
            return;
        }

        if let Some(fields) = value.fields() {
            let count = fields.len();
            for (name, field) in fields {
                self.store.set(name, field, WriteMode::Overwrite);
            }
            tracing::debug!(step = %self.step, fields = count, "record spread into store");
            return;
        }

        tracing::debug!(step = %self.step, kind = value.type_name(), "result discarded");
        self.store.diagnostic(format!(
            "Result of step '{}' discarded: {} has no target key",
            self.step,
            value.type_name()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::infer_produces;
    use crate::store::{Computed, Record, Severity};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn interpreter(store: &Store) -> Interpreter {
        Interpreter::new(store.clone(), "Step")
    }

    #[tokio::test]
    async fn test_none_has_no_effect() {
        let store = Store::new();
        interpreter(&store).apply(Outcome::None, None).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_named_value_respects_mode() {
        let store = Store::new();
        store.set("name", "Bob", WriteMode::Overwrite);
        let ensure = infer_produces("EnsureName").unwrap();
        let set = infer_produces("SetName").unwrap();

        let interp = interpreter(&store);
        interp.apply(Outcome::value("Alice"), Some(&ensure)).await.unwrap();
        assert_eq!(store.get("name", String::new()).unwrap(), "Bob");

        interp.apply(Outcome::value("Alice"), Some(&set)).await.unwrap();
        assert_eq!(store.get("name", String::new()).unwrap(), "Alice");
    }

    #[tokio::test]
    async fn test_record_spread_without_naming() {
        let store = Store::new();
        let record = Record::new().with("first", "Ada").with("last", "Lovelace");

        interpreter(&store).apply(Outcome::record(record), None).await.unwrap();
        assert_eq!(store.keys(), vec!["first", "last"]);
    }

    #[tokio::test]
    async fn test_named_record_stored_whole() {
        let store = Store::new();
        let produces = infer_produces("SetPerson").unwrap();
        let record = Record::new().with("first", "Ada");

        interpreter(&store)
            .apply(Outcome::record(record), Some(&produces))
            .await
            .unwrap();
        assert_eq!(store.keys(), vec!["Person"]);
    }

    #[tokio::test]
    async fn test_unnamed_scalar_discarded_with_diagnostic() {
        let store = Store::new();
        store.set_diagnostics(true);

        interpreter(&store).apply(Outcome::value(5), None).await.unwrap();
        assert_eq!(store.keys(), vec![crate::store::DIAGNOSTICS_KEY]);
        assert_eq!(store.messages_matching(Severity::Debug).len(), 1);
    }

    #[tokio::test]
    async fn test_action_invoked() {
        let store = Store::new();
        let produces = infer_produces("SetIgnored").unwrap();
        let outcome = Outcome::action(|store: &Store| {
            store.set("touched", true, WriteMode::Overwrite);
            Ok(())
        });

        interpreter(&store).apply(outcome, Some(&produces)).await.unwrap();
        assert!(store.contains_key("touched"));
        assert!(!store.contains_key("ignored"));
    }

    #[tokio::test]
    async fn test_deferred_keeps_naming() {
        let store = Store::new();
        let produces = infer_produces("GetMessage").unwrap();
        let outcome = Outcome::deferred(|_| Ok(Outcome::value("hi")));

        interpreter(&store).apply(outcome, Some(&produces)).await.unwrap();
        assert_eq!(store.get("message", String::new()).unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_computed_evaluated_against_store() {
        let store = Store::new();
        store.set("name", "Serge", WriteMode::Overwrite);
        let produces = infer_produces("GetMessage").unwrap();
        let computed = Computed::new(["name"], |store: &Store| {
            Ok(format!("Hello, {}!", store.get("name", String::new())?))
        });

        interpreter(&store)
            .apply(Outcome::computed(computed), Some(&produces))
            .await
            .unwrap();
        assert_eq!(store.get("message", String::new()).unwrap(), "Hello, Serge!");
    }

    #[tokio::test]
    async fn test_value_holding_computed_is_evaluated() {
        let store = Store::new();
        let produces = infer_produces("SetAnswer").unwrap();
        let computed = Computed::new(Vec::<String>::new(), |_| Ok(42_i64));

        interpreter(&store)
            .apply(Outcome::value(computed), Some(&produces))
            .await
            .unwrap();
        let raw = store.get_raw("answer").unwrap();
        assert!(!raw.is_computed());
        assert_eq!(raw.cloned::<i64>(), Some(42));
    }

    #[tokio::test]
    async fn test_async_awaited() {
        let store = Store::new();
        let produces = infer_produces("SetGreeting").unwrap();
        let outcome = Outcome::future(async { Ok(Outcome::value("async hi")) });

        interpreter(&store).apply(outcome, Some(&produces)).await.unwrap();
        assert_eq!(store.get("greeting", String::new()).unwrap(), "async hi");
    }

    #[tokio::test]
    async fn test_async_failure_propagates() {
        let store = Store::new();
        let outcome = Outcome::future(async { Err(anyhow::anyhow!("remote failed")) });

        let err = interpreter(&store).apply(outcome, None).await.unwrap_err();
        assert_eq!(err.to_string(), "remote failed");
    }

    #[tokio::test]
    async fn test_sequence_suppresses_naming() {
        let store = Store::new();
        let produces = infer_produces("SetTotal").unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let outcome = Outcome::sequence([
            Outcome::value(1),
            Outcome::record(Record::new().with("a", 1)),
            Outcome::action(move |_| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        ]);

        interpreter(&store).apply(outcome, Some(&produces)).await.unwrap();
        assert!(!store.contains_key("total"));
        assert!(store.contains_key("a"));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_sequence_stops_at_first_failure() {
        let store = Store::new();
        let outcome = Outcome::sequence([
            Outcome::action(|_| Err(anyhow::anyhow!("first fails"))),
            Outcome::record(Record::new().with("later", true)),
        ]);

        assert!(interpreter(&store).apply(outcome, None).await.is_err());
        assert!(!store.contains_key("later"));
    }
}
