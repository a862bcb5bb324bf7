//! Comprehensive integration tests for pipeline execution.

#[cfg(test)]
mod tests {
    use crate::errors::ConstructionError;
    use crate::pipeline::{Engine, EngineBuilder, Interpreter};
    use crate::services::ServiceRegistry;
    use crate::steps::{Args, Outcome, ParamDescriptor, StepDescriptor, StepSet};
    use crate::store::{Computed, Disposable, Record, Severity, Store, Value, WriteMode};
    use crate::testing::{
        assert_absent, assert_error_count, assert_message_contains, assert_not_terminated,
        assert_plan, assert_terminated, assert_value_eq, recording_step, responding_step,
        CallCounter, FailingHandler, PanickingHandler, RecordingLog, TestStore,
    };
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn build(source: &StepSet) -> Engine {
        EngineBuilder::new(source).include_all().build().unwrap()
    }

    /// Records `step:arg1,arg2` for each call, with unresolved args empty.
    fn recorder(
        seen: &Arc<Mutex<Vec<String>>>,
    ) -> impl Fn(Args) -> anyhow::Result<Outcome> + Send + Sync + 'static {
        let seen = seen.clone();
        move |args: Args| {
            let resolved = (0..args.len())
                .map(|i| args.value(i).and_then(Value::cloned::<String>).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(",");
            seen.lock().push(format!("{}:{resolved}", args.step_name()));
            Ok(Outcome::None)
        }
    }

    fn ensure_name() -> StepDescriptor {
        StepDescriptor::from_fn("EnsureName", |_| Ok(Outcome::value("Serge")))
    }

    #[tokio::test]
    async fn test_ensure_keeps_existing_value() {
        let source = StepSet::new("greeter").with_step(ensure_name());
        let engine = build(&source);

        let store = engine
            .run_with(TestStore::new().with("name", "Bob").build())
            .await;

        assert_value_eq(&store, "name", &"Bob".to_string());
        assert_not_terminated(&store);
    }

    #[tokio::test]
    async fn test_ensure_fills_missing_value() {
        let source = StepSet::new("greeter").with_step(ensure_name());

        let store = build(&source).run().await;
        assert_value_eq(&store, "Name", &"Serge".to_string());
    }

    #[tokio::test]
    async fn test_message_rendered_from_producers() {
        let render = StepDescriptor::from_fn("Render", |args: Args| {
            let template = args.require::<String>("message")?;
            let name = args.require::<String>("name")?;
            Ok(Outcome::action(move |store: &Store| {
                store.set("message", template.replace("{name}", &name), WriteMode::Overwrite);
                Ok(())
            }))
        })
        .with_input(ParamDescriptor::new::<String>("message").required())
        .with_input(ParamDescriptor::new::<String>("name").required());
        let source = StepSet::new("greeter")
            .with_step(render)
            .with_step(StepDescriptor::from_fn("GetMessage", |_| {
                Ok(Outcome::value("Hello, {name}!"))
            }))
            .with_step(ensure_name());

        let engine = build(&source);
        assert_plan(&engine, &["GetMessage", "EnsureName", "Render"]);

        let store = engine.run().await;
        assert_value_eq(&store, "message", &"Hello, Serge!".to_string());
        assert_eq!(store.get_or_fail::<String>("MESSAGE").unwrap().as_deref(), Some("Hello, Serge!"));
    }

    #[tokio::test]
    async fn test_message_from_computed_result() {
        let source = StepSet::new("greeter")
            .with_step(
                StepDescriptor::from_fn("GetMessage", |_| {
                    Ok(Outcome::computed(Computed::new(["name"], |store: &Store| {
                        Ok(format!("Hello, {}!", store.get("name", String::new())?))
                    })))
                })
                .with_input(ParamDescriptor::new::<String>("name")),
            )
            .with_step(ensure_name());

        let store = build(&source).run().await;
        assert_value_eq(&store, "message", &"Hello, Serge!".to_string());
    }

    #[tokio::test]
    async fn test_async_failure_terminates_run() {
        let counter = CallCounter::new();
        let observed = counter.clone();
        let source = StepSet::new("fragile")
            .with_step(StepDescriptor::from_fn("Fetch", |_| {
                Ok(Outcome::future(async {
                    Err(anyhow::anyhow!("upstream timed out"))
                }))
            }))
            .with_step(
                StepDescriptor::from_fn("Count", move |_| {
                    observed.hit();
                    Ok(Outcome::None)
                })
                .with_after("Fetch"),
            );

        let store = build(&source).run().await;

        assert_terminated(&store);
        assert_error_count(&store, 1);
        assert_message_contains(&store, Severity::Error, "upstream timed out");
        assert_message_contains(&store, Severity::Error, "Fetch");
        assert_eq!(counter.get(), 0);
    }

    #[tokio::test]
    async fn test_handler_error_chain_in_message() {
        let log = RecordingLog::new();
        let source = StepSet::new("fragile")
            .with_step(StepDescriptor::new("Load", FailingHandler::new("disk full")))
            .with_step(recording_step("After", &log));

        let store = build(&source).run().await;

        assert_terminated(&store);
        let errors = store.messages_matching(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].text, "Step 'Load' failed: Load aborted: disk full");
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let log = RecordingLog::new();
        let source = StepSet::new("fragile")
            .with_step(StepDescriptor::new("Explode", PanickingHandler::new("kaboom")))
            .with_step(recording_step("After", &log));

        let store = build(&source).run().await;

        assert_terminated(&store);
        assert_message_contains(&store, Severity::Error, "kaboom");
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_terminate_from_step_stops_run() {
        let log = RecordingLog::new();
        let source = StepSet::new("stop")
            .with_step(responding_step("Guard", &log, |args| {
                args.store().terminate();
                Ok(Outcome::None)
            }))
            .with_step(recording_step("Never", &log));

        let store = build(&source).run().await;

        assert_terminated(&store);
        assert_error_count(&store, 0);
        assert_eq!(log.entries(), vec!["Guard"]);
    }

    #[tokio::test]
    async fn test_terminated_store_runs_nothing() {
        let log = RecordingLog::new();
        let source = StepSet::new("stop").with_step(recording_step("Never", &log));
        let store = Store::new();
        store.terminate();

        build(&source).run_with(store).await;
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_mutual_after_fails_at_construction() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (a, b) = (counter.clone(), counter.clone());
        let source = StepSet::new("cycle")
            .with_step(
                StepDescriptor::from_fn("A", move |_| {
                    a.fetch_add(1, Ordering::SeqCst);
                    Ok(Outcome::None)
                })
                .with_after("B"),
            )
            .with_step(
                StepDescriptor::from_fn("B", move |_| {
                    b.fetch_add(1, Ordering::SeqCst);
                    Ok(Outcome::None)
                })
                .with_after("A"),
            );

        let err = EngineBuilder::new(&source).include_all().build().unwrap_err();
        assert!(matches!(err, ConstructionError::CircularDependency { .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_required_skips_and_continues() {
        let log = RecordingLog::new();
        let source = StepSet::new("skip")
            .with_step(
                recording_step("Greet", &log)
                    .with_input(ParamDescriptor::new::<String>("name").required()),
            )
            .with_step(recording_step("Next", &log));

        let engine = EngineBuilder::new(&source)
            .include_all()
            .with_diagnostics(true)
            .build()
            .unwrap();
        let store = engine.run().await;

        assert_eq!(log.entries(), vec!["Next"]);
        assert_not_terminated(&store);
        assert_message_contains(&store, Severity::Debug, "Greet");
        assert!(store
            .messages()
            .iter()
            .all(|message| message.severity == Severity::Debug));
    }

    #[tokio::test]
    async fn test_skip_without_diagnostics_is_silent() {
        let log = RecordingLog::new();
        let source = StepSet::new("skip").with_step(
            recording_step("Greet", &log)
                .with_input(ParamDescriptor::new::<String>("name").required()),
        );

        let store = build(&source).run().await;

        assert!(log.entries().is_empty());
        assert!(store.messages().is_empty());
    }

    #[tokio::test]
    async fn test_interpretation_through_sequence_is_idempotent() {
        let record = || Record::new().with("city", "Paris").with("zip", "75001");

        let direct = Store::new();
        Interpreter::new(direct.clone(), "Place")
            .apply(Outcome::record(record()), None)
            .await
            .unwrap();

        let twice = Store::new();
        let interpreter = Interpreter::new(twice.clone(), "Place");
        interpreter
            .apply(Outcome::record(record()), None)
            .await
            .unwrap();
        interpreter
            .apply(Outcome::sequence([Outcome::record(record())]), None)
            .await
            .unwrap();

        assert_eq!(direct.keys(), twice.keys());
        for key in direct.keys() {
            assert_eq!(
                direct.get(&key, String::new()).unwrap(),
                twice.get(&key, String::new()).unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_single_value_rule_needs_both_checks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let source = StepSet::new("ambiguity")
            .with_step(
                StepDescriptor::from_fn("One", recorder(&seen))
                    .with_input(ParamDescriptor::new::<String>("text")),
            )
            .with_step(
                StepDescriptor::from_fn("Two", recorder(&seen))
                    .with_input(ParamDescriptor::new::<String>("left"))
                    .with_input(ParamDescriptor::new::<String>("right")),
            );
        let engine = build(&source);

        // One store string: only the single-parameter step picks it up.
        engine
            .run_with(TestStore::new().with("greeting", "hi").build())
            .await;
        // Two store strings: neither step does.
        engine
            .run_with(
                TestStore::new()
                    .with("greeting", "hi")
                    .with("farewell", "bye")
                    .build(),
            )
            .await;

        assert_eq!(
            seen.lock().clone(),
            vec!["One:hi", "Two:,", "One:", "Two:,"]
        );
    }

    #[tokio::test]
    async fn test_services_from_builder() {
        let source = StepSet::new("services").with_step(
            StepDescriptor::from_fn("SetGreeting", |args: Args| {
                let prefix = args.require::<String>("prefix")?;
                Ok(Outcome::value(format!("{prefix}, world")))
            })
            .with_input(ParamDescriptor::new::<String>("prefix").required()),
        );

        let engine = EngineBuilder::new(&source)
            .include_all()
            .with_services(ServiceRegistry::new().with("Hello".to_string()))
            .build()
            .unwrap();
        let store = engine.run().await;

        assert_value_eq(&store, "greeting", &"Hello, world".to_string());
        assert_absent(&store, "prefix");
    }

    #[tokio::test]
    async fn test_async_handler_and_outcome() {
        let source = StepSet::new("async").with_step(
            StepDescriptor::from_async_fn("UpdateTotal", |args: Args| async move {
                let total = args.get::<i64>("total").unwrap_or(0);
                Ok(Outcome::future(async move { Ok(Outcome::value(total + 5)) }))
            })
            .with_input(ParamDescriptor::new::<i64>("total")),
        );

        let store = build(&source)
            .run_with(TestStore::new().with("total", 10).build())
            .await;
        assert_value_eq(&store, "total", &15_i64);
    }

    #[tokio::test]
    async fn test_record_result_spread() {
        let source = StepSet::new("spread").with_step(StepDescriptor::from_fn("Lookup", |_| {
            Ok(Outcome::record(
                Record::new().with("city", "Paris").with("country", "France"),
            ))
        }));

        let store = build(&source).run().await;
        assert_value_eq(&store, "city", &"Paris".to_string());
        assert_value_eq(&store, "country", &"France".to_string());
    }

    #[tokio::test]
    async fn test_nested_run_shares_parent_store() {
        let inner_source = StepSet::new("inner").with_step(StepDescriptor::from_fn("SetInner", |_| {
            Ok(Outcome::value(true))
        }));
        let inner = Arc::new(build(&inner_source));

        let nested = inner.clone();
        let outer_source = StepSet::new("outer").with_step(StepDescriptor::from_async_fn(
            "RunInner",
            move |args: Args| {
                let nested = nested.clone();
                async move {
                    nested.run_with(args.store().clone()).await;
                    Ok(Outcome::None)
                }
            },
        ));

        let store = build(&outer_source).run().await;
        assert_value_eq(&store, "inner", &true);
    }

    #[tokio::test]
    async fn test_nested_run_with_own_store_is_isolated() {
        let inner_source = StepSet::new("inner").with_step(StepDescriptor::from_fn("SetInner", |_| {
            Ok(Outcome::value(true))
        }));
        let inner = Arc::new(build(&inner_source));
        let child_wrote = CallCounter::new();

        let nested = inner.clone();
        let counter = child_wrote.clone();
        let outer_source = StepSet::new("outer").with_step(StepDescriptor::from_async_fn(
            "RunInner",
            move |args: Args| {
                let nested = nested.clone();
                let counter = counter.clone();
                async move {
                    let child = nested.run().await;
                    if child.get("inner", false).unwrap() && !args.store().contains_key("inner") {
                        counter.hit();
                    }
                    Ok(Outcome::None)
                }
            },
        ));

        let parent = TestStore::new().with("existing", "kept").build();
        let parent = build(&outer_source).run_with(parent).await;

        assert_eq!(child_wrote.get(), 1);
        assert_not_terminated(&parent);
        assert_absent(&parent, "inner");
        assert_value_eq(&parent, "existing", &"kept".to_string());
    }

    #[tokio::test]
    async fn test_store_flags_take_precedence_over_config() {
        let source = StepSet::new("flags").with_step(ensure_name());
        let engine = EngineBuilder::new(&source)
            .include_all()
            .with_diagnostics(true)
            .build()
            .unwrap();

        let store = Store::new();
        store.set_diagnostics(false);
        let store = engine.run_with(store).await;
        assert!(!store.diagnostics_enabled());

        let fresh = engine.run().await;
        assert!(fresh.diagnostics_enabled());
    }

    #[tokio::test]
    async fn test_resources_released_on_dispose() {
        struct Connection(CallCounter);
        impl Disposable for Connection {
            fn dispose(&self) {
                self.0.hit();
            }
        }

        let closed = CallCounter::new();
        let handle = closed.clone();
        let source = StepSet::new("resources").with_step(StepDescriptor::from_fn(
            "SetConnection",
            move |_| Ok(Outcome::value(Value::resource(Connection(handle.clone())))),
        ));

        let store = build(&source).run().await;
        assert_eq!(closed.get(), 0);
        assert_eq!(store.dispose(), 1);
        assert_eq!(closed.get(), 1);
    }

    #[tokio::test]
    async fn test_computed_read_failure_fails_step() {
        let log = RecordingLog::new();
        let source = StepSet::new("computed")
            .with_step(
                recording_step("Use", &log).with_input(ParamDescriptor::new::<i64>("ratio")),
            )
            .with_step(recording_step("After", &log));
        let store = TestStore::new()
            .with(
                "ratio",
                Computed::new::<i64, _, _, _>(Vec::<String>::new(), |_| {
                    Err(anyhow::anyhow!("division by zero"))
                }),
            )
            .build();

        let store = build(&source).run_with(store).await;

        assert_terminated(&store);
        assert_message_contains(&store, Severity::Error, "division by zero");
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_plan_is_stable_across_runs() {
        let log = RecordingLog::new();
        let source = StepSet::new("stable")
            .with_step(recording_step("C", &log))
            .with_step(recording_step("A", &log).with_order(1))
            .with_step(recording_step("B", &log));
        let engine = build(&source);

        engine.run().await;
        engine.run().await;

        assert_plan(&engine, &["A", "C", "B"]);
        assert_eq!(log.entries(), vec!["A", "C", "B", "A", "C", "B"]);
    }
}
