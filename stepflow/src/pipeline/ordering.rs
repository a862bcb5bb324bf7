//! Computes the execution order of discovered steps.
//!
//! Explicitly ordered steps come first, sorted by `(order, name)`. Every
//! other step is placed in discovery order:
//!
//! - after its explicit predecessor, when it names one;
//! - otherwise after the last step producing one of its inputs;
//! - otherwise at the end.
//!
//! Predecessors and producers are placed before their dependents. A cycle
//! of explicit predecessors is a construction error, explicitly ordered
//! steps included. A producer edge is ignored when the producer's
//! predecessor chain leads back to a step being placed, so the result does
//! not depend on declaration order.

use super::discovery::Candidate;
use crate::errors::ConstructionError;
use std::collections::HashMap;

/// Returns candidate indices in execution order.
///
/// # Errors
///
/// Returns `SelfReference`, `UnknownPredecessor` or `CircularDependency`
/// for invalid explicit predecessors.
pub fn order(candidates: &[Candidate]) -> Result<Vec<usize>, ConstructionError> {
    let mut planner = Planner::new(candidates)?;

    let mut explicit: Vec<usize> = (0..candidates.len())
        .filter(|&index| candidates[index].step.order().is_some())
        .collect();
    explicit.sort_by(|&a, &b| {
        let (left, right) = (&candidates[a].step, &candidates[b].step);
        left.order()
            .cmp(&right.order())
            .then_with(|| left.name().cmp(right.name()))
    });
    for index in explicit {
        planner.order.push(index);
        planner.placed[index] = true;
    }

    for index in 0..candidates.len() {
        planner.place(index)?;
    }

    Ok(planner.order)
}

struct Planner<'a> {
    candidates: &'a [Candidate],
    predecessors: Vec<Option<usize>>,
    producers: HashMap<String, Vec<usize>>,
    order: Vec<usize>,
    placed: Vec<bool>,
    placing: Vec<usize>,
}

impl<'a> Planner<'a> {
    fn new(candidates: &'a [Candidate]) -> Result<Self, ConstructionError> {
        let mut by_name = HashMap::new();
        let mut producers: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, candidate) in candidates.iter().enumerate() {
            for name in candidate.step.names() {
                by_name.entry(name.to_lowercase()).or_insert(index);
            }
            if let Some(produces) = &candidate.produces {
                producers
                    .entry(produces.key.to_lowercase())
                    .or_default()
                    .push(index);
            }
        }

        let predecessors = candidates
            .iter()
            .map(|candidate| {
                let Some(after) = candidate.step.after() else {
                    return Ok(None);
                };
                if candidate.step.answers_to(after) {
                    return Err(ConstructionError::SelfReference {
                        step: candidate.name().to_string(),
                    });
                }
                by_name
                    .get(&after.to_lowercase())
                    .copied()
                    .map(Some)
                    .ok_or_else(|| ConstructionError::UnknownPredecessor {
                        step: candidate.name().to_string(),
                        predecessor: after.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        check_predecessor_cycles(candidates, &predecessors)?;

        Ok(Self {
            candidates,
            predecessors,
            producers,
            order: Vec::with_capacity(candidates.len()),
            placed: vec![false; candidates.len()],
            placing: Vec::new(),
        })
    }

    fn place(&mut self, index: usize) -> Result<(), ConstructionError> {
        if self.placed[index] {
            return Ok(());
        }
        self.placing.push(index);

        let slot = match self.predecessors[index] {
            Some(predecessor) => {
                if let Some(start) = self.placing.iter().position(|&i| i == predecessor) {
                    let mut path: Vec<String> = self.placing[start..]
                        .iter()
                        .map(|&i| self.candidates[i].name().to_string())
                        .collect();
                    path.push(self.candidates[predecessor].name().to_string());
                    return Err(ConstructionError::CircularDependency { path });
                }
                self.place(predecessor)?;
                self.position(predecessor).map(|pos| pos + 1)
            }
            None => {
                let producers = self.producers_of(index);
                for &producer in &producers {
                    self.place(producer)?;
                }
                producers
                    .iter()
                    .filter_map(|&producer| self.position(producer))
                    .max()
                    .map(|pos| pos + 1)
            }
        };

        match slot {
            Some(pos) => self.order.insert(pos, index),
            None => self.order.push(index),
        }
        self.placing.pop();
        self.placed[index] = true;
        Ok(())
    }

    /// Producers of the step's inputs, excluding itself and any producer
    /// whose predecessor chain reaches a step currently being placed.
    fn producers_of(&self, index: usize) -> Vec<usize> {
        let mut found = Vec::new();
        for input in self.candidates[index].step.inputs() {
            if input.is_store() || input.is_skipped_from_resolution() {
                continue;
            }
            for name in input.names() {
                let Some(producers) = self.producers.get(&name.to_lowercase()) else {
                    continue;
                };
                for &producer in producers {
                    if producer != index
                        && !found.contains(&producer)
                        && !self.chain_reaches_placing(producer)
                    {
                        found.push(producer);
                    }
                }
            }
        }
        found
    }

    fn chain_reaches_placing(&self, from: usize) -> bool {
        let mut current = Some(from);
        while let Some(index) = current {
            if self.placing.contains(&index) {
                return true;
            }
            current = self.predecessors[index];
        }
        false
    }

    fn position(&self, index: usize) -> Option<usize> {
        self.order.iter().position(|&i| i == index)
    }
}

/// Walks every predecessor chain and reports the first cycle found.
fn check_predecessor_cycles(
    candidates: &[Candidate],
    predecessors: &[Option<usize>],
) -> Result<(), ConstructionError> {
    let mut settled = vec![false; candidates.len()];
    for start in 0..candidates.len() {
        let mut chain: Vec<usize> = Vec::new();
        let mut current = Some(start);
        while let Some(index) = current {
            if settled[index] {
                break;
            }
            if let Some(pos) = chain.iter().position(|&i| i == index) {
                let mut path: Vec<String> = chain[pos..]
                    .iter()
                    .map(|&i| candidates[i].name().to_string())
                    .collect();
                path.push(candidates[index].name().to_string());
                return Err(ConstructionError::CircularDependency { path });
            }
            chain.push(index);
            current = predecessors[index];
        }
        for index in chain {
            settled[index] = true;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::discovery::{discover, DiscoveryMode};
    use crate::steps::{Outcome, ParamDescriptor, StepDescriptor, StepSet};
    use pretty_assertions::assert_eq;

    fn step(name: &str) -> StepDescriptor {
        StepDescriptor::from_fn(name, |_| Ok(Outcome::None))
    }

    fn planned(source: &StepSet) -> Result<Vec<String>, ConstructionError> {
        let candidates = discover(source, DiscoveryMode::IncludeAll)?;
        Ok(order(&candidates)?
            .into_iter()
            .map(|index| candidates[index].name().to_string())
            .collect())
    }

    #[test]
    fn test_discovery_order_without_edges() {
        let source = StepSet::new("plain")
            .with_step(step("C"))
            .with_step(step("A"))
            .with_step(step("B"));

        assert_eq!(planned(&source).unwrap(), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_explicit_order_first_sorted_by_order_then_name() {
        let source = StepSet::new("explicit")
            .with_step(step("Loose"))
            .with_step(step("Zed").with_order(1))
            .with_step(step("Alpha").with_order(1))
            .with_step(step("First").with_order(0));

        assert_eq!(planned(&source).unwrap(), vec!["First", "Alpha", "Zed", "Loose"]);
    }

    #[test]
    fn test_after_inserts_immediately_after_predecessor() {
        let source = StepSet::new("after")
            .with_step(step("A"))
            .with_step(step("B"))
            .with_step(step("C").with_after("a"));

        assert_eq!(planned(&source).unwrap(), vec!["A", "C", "B"]);
    }

    #[test]
    fn test_after_places_predecessor_first() {
        let source = StepSet::new("after")
            .with_step(step("Second").with_after("First"))
            .with_step(step("First"));

        assert_eq!(planned(&source).unwrap(), vec!["First", "Second"]);
    }

    #[test]
    fn test_after_chain() {
        let source = StepSet::new("chain")
            .with_step(step("C").with_after("B"))
            .with_step(step("B").with_after("A"))
            .with_step(step("A"));

        assert_eq!(planned(&source).unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_producer_placed_before_consumer() {
        let source = StepSet::new("inferred")
            .with_step(step("Greet").with_input(ParamDescriptor::new::<String>("message")))
            .with_step(step("Other"))
            .with_step(step("GetMessage").with_input(ParamDescriptor::new::<String>("name")))
            .with_step(step("EnsureName"));

        assert_eq!(
            planned(&source).unwrap(),
            vec!["EnsureName", "GetMessage", "Greet", "Other"]
        );
    }

    #[test]
    fn test_consumer_follows_last_producer() {
        let source = StepSet::new("inferred")
            .with_step(step("SetA"))
            .with_step(step("Unrelated"))
            .with_step(step("SetB"))
            .with_step(
                step("Combine")
                    .with_input(ParamDescriptor::new::<String>("a"))
                    .with_input(ParamDescriptor::new::<String>("b")),
            )
            .with_step(step("Tail"));

        assert_eq!(
            planned(&source).unwrap(),
            vec!["SetA", "Unrelated", "SetB", "Combine", "Tail"]
        );
    }

    #[test]
    fn test_producer_matched_through_alias() {
        let source = StepSet::new("alias")
            .with_step(step("Greet").with_input(
                ParamDescriptor::new::<String>("text").with_alias("Message"),
            ))
            .with_step(step("SetMessage"));

        assert_eq!(planned(&source).unwrap(), vec!["SetMessage", "Greet"]);
    }

    #[test]
    fn test_self_producing_step_is_not_its_own_dependency() {
        let source = StepSet::new("self")
            .with_step(step("UpdateTotal").with_input(ParamDescriptor::new::<i64>("total")))
            .with_step(step("Other"));

        assert_eq!(planned(&source).unwrap(), vec!["UpdateTotal", "Other"]);
    }

    #[test]
    fn test_producer_cycle_is_ignored() {
        let source = StepSet::new("soft")
            .with_step(step("SetA").with_input(ParamDescriptor::new::<String>("b")))
            .with_step(step("SetB").with_input(ParamDescriptor::new::<String>("a")));

        let plan = planned(&source).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan, vec!["SetB", "SetA"]);
    }

    #[test]
    fn test_mutual_after_is_circular() {
        let source = StepSet::new("cycle")
            .with_step(step("A").with_after("B"))
            .with_step(step("B").with_after("A"));

        let err = planned(&source).unwrap_err();
        assert_eq!(
            err,
            ConstructionError::CircularDependency {
                path: vec!["A".into(), "B".into(), "A".into()],
            }
        );
    }

    #[test]
    fn test_self_reference() {
        let source = StepSet::new("self").with_step(step("A").with_alias("alpha").with_after("ALPHA"));

        let err = planned(&source).unwrap_err();
        assert_eq!(err, ConstructionError::SelfReference { step: "A".into() });
    }

    #[test]
    fn test_unknown_predecessor() {
        let source = StepSet::new("unknown").with_step(step("A").with_after("Missing"));

        let err = planned(&source).unwrap_err();
        assert_eq!(err.code(), "STEP-ORDER-UNKNOWN");
    }

    #[test]
    fn test_unknown_predecessor_on_explicit_step() {
        let source = StepSet::new("unknown").with_step(step("A").with_order(1).with_after("Ghost"));

        assert!(matches!(
            planned(&source),
            Err(ConstructionError::UnknownPredecessor { .. })
        ));
    }

    #[test]
    fn test_predecessor_excluded_by_discovery_is_unknown() {
        let source = StepSet::new("excluded")
            .with_step(step("A").marked().with_after("B"))
            .with_step(step("B"));

        let candidates = discover(&source, DiscoveryMode::IncludeMarkedOnly).unwrap();
        assert!(matches!(
            order(&candidates),
            Err(ConstructionError::UnknownPredecessor { .. })
        ));
    }

    #[test]
    fn test_every_step_placed_once() {
        let source = StepSet::new("mixed")
            .with_step(step("D").with_after("B"))
            .with_step(step("SetX").with_order(2))
            .with_step(step("B").with_input(ParamDescriptor::new::<String>("x")))
            .with_step(step("A"))
            .with_step(step("C").with_after("A"));

        let plan = planned(&source).unwrap();
        assert_eq!(plan, vec!["SetX", "B", "D", "A", "C"]);
    }

    #[test]
    fn test_after_cycle_between_explicit_steps() {
        let source = StepSet::new("cycle")
            .with_step(step("A").with_order(1).with_after("B"))
            .with_step(step("B").with_order(2).with_after("A"));

        assert_eq!(
            planned(&source).unwrap_err(),
            ConstructionError::CircularDependency {
                path: vec!["A".into(), "B".into(), "A".into()],
            }
        );
    }

    #[test]
    fn test_after_cycle_between_explicit_and_unordered_steps() {
        let source = StepSet::new("cycle")
            .with_step(step("A").with_order(1).with_after("B"))
            .with_step(step("B").with_after("A"));

        assert!(matches!(
            planned(&source),
            Err(ConstructionError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_longer_after_cycle_reports_path() {
        let source = StepSet::new("cycle")
            .with_step(step("Entry").with_after("A"))
            .with_step(step("A").with_after("C"))
            .with_step(step("B").with_after("A"))
            .with_step(step("C").with_after("B"));

        assert_eq!(
            planned(&source).unwrap_err(),
            ConstructionError::CircularDependency {
                path: vec!["A".into(), "C".into(), "B".into(), "A".into()],
            }
        );
    }

    #[test]
    fn test_producer_edge_against_after_is_declaration_independent() {
        let consumer = || step("C").with_input(ParamDescriptor::new::<String>("x"));
        let producer = || step("SetX").with_after("C");

        let consumer_first = StepSet::new("mixed")
            .with_step(consumer())
            .with_step(producer());
        let producer_first = StepSet::new("mixed")
            .with_step(producer())
            .with_step(consumer());

        assert_eq!(planned(&consumer_first).unwrap(), vec!["C", "SetX"]);
        assert_eq!(planned(&producer_first).unwrap(), vec!["C", "SetX"]);
    }

    #[test]
    fn test_producer_edge_skipped_through_transitive_after_chain() {
        let consumer = || step("Report").with_input(ParamDescriptor::new::<String>("x"));
        let producer = || step("SetX").with_after("Audit");
        let audit = || step("Audit").with_after("Report");

        let consumer_first = StepSet::new("chain")
            .with_step(consumer())
            .with_step(producer())
            .with_step(audit());
        let producer_first = StepSet::new("chain")
            .with_step(producer())
            .with_step(audit())
            .with_step(consumer());

        assert_eq!(planned(&consumer_first).unwrap(), vec!["Report", "Audit", "SetX"]);
        assert_eq!(planned(&producer_first).unwrap(), vec!["Report", "Audit", "SetX"]);
    }
}
