//! Derivation of a deployment plan from declared step dependencies.
//!
//! Ordering is a first-class artifact: the plan is recomputed from the step
//! declarations on every run, never persisted, and ties among independent
//! steps are broken by declaration order so the plan is deterministic.

use std::collections::{BTreeSet, HashMap};

use deploy_common::types::DeploymentStep;

use crate::errors::DeployError;

/// A topologically sorted deployment plan.
///
/// `layers` groups the order into ranks of mutually independent steps whose
/// dependencies are satisfied by strictly earlier layers; steps within a
/// layer may execute concurrently.
#[derive(Clone, Debug)]
pub struct DeploymentPlan {
    /// Step ids in execution order
    order: Vec<String>,
    /// Step ids grouped by dependency depth, declaration order within a layer
    layers: Vec<Vec<String>>,
}

impl DeploymentPlan {
    /// The full topological order
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// The concurrency layers of the plan
    pub fn layers(&self) -> &[Vec<String>] {
        &self.layers
    }
}

/// Builds a deployment plan from the declared steps.
///
/// Fails with [`DeployError::UnknownDependency`] when a dependency id has no
/// corresponding step, and with [`DeployError::Cycle`] naming exactly the
/// steps participating in cycles. No partial plan is produced on failure.
pub fn build(steps: &[DeploymentStep]) -> Result<DeploymentPlan, DeployError> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        if index.insert(step.id.as_str(), i).is_some() {
            return Err(DeployError::DuplicateStep(step.id.clone()));
        }
    }

    // Edges run dependency -> dependent; duplicate dependency declarations
    // are collapsed so in-degrees stay consistent
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
    let mut in_degree: Vec<usize> = vec![0; steps.len()];
    for (i, step) in steps.iter().enumerate() {
        let mut seen: BTreeSet<usize> = BTreeSet::new();
        for dep in &step.dependencies {
            let dep_idx =
                *index
                    .get(dep.as_str())
                    .ok_or_else(|| DeployError::UnknownDependency {
                        from: step.id.clone(),
                        missing: dep.clone(),
                    })?;
            if seen.insert(dep_idx) {
                dependents[dep_idx].push(i);
                in_degree[i] += 1;
            }
        }
    }

    // Kahn's algorithm; the ready set is ordered by declaration index so
    // ties are broken deterministically
    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| i)
        .collect();
    let mut level: Vec<usize> = vec![0; steps.len()];
    let mut order: Vec<usize> = Vec::with_capacity(steps.len());
    let mut remaining = in_degree.clone();

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &dependent in &dependents[i] {
            remaining[dependent] -= 1;
            level[dependent] = level[dependent].max(level[i] + 1);
            if remaining[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != steps.len() {
        return Err(DeployError::Cycle(cycle_members(
            steps,
            &dependents,
            &remaining,
        )));
    }

    let num_layers = order.iter().map(|&i| level[i] + 1).max().unwrap_or(0);
    let mut layers: Vec<Vec<String>> = vec![Vec::new(); num_layers];
    for &i in &order {
        layers[level[i]].push(steps[i].id.clone());
    }
    // Declaration order within each layer
    for layer in &mut layers {
        layer.sort_by_key(|id| index[id.as_str()]);
    }

    Ok(DeploymentPlan {
        order: order.into_iter().map(|i| steps[i].id.clone()).collect(),
        layers,
    })
}

/// Extracts the steps participating in cycles from the unprocessed subgraph.
///
/// Every unprocessed node is either on a cycle or strictly downstream of
/// one; iteratively stripping nodes with no outgoing edge inside the
/// subgraph removes the downstream tails and leaves exactly the cycle
/// members.
fn cycle_members(
    steps: &[DeploymentStep],
    dependents: &[Vec<usize>],
    remaining: &[usize],
) -> Vec<String> {
    let mut members: BTreeSet<usize> = remaining
        .iter()
        .enumerate()
        .filter(|(_, d)| **d > 0)
        .map(|(i, _)| i)
        .collect();

    loop {
        let tails: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&i| !dependents[i].iter().any(|d| members.contains(d)))
            .collect();
        if tails.is_empty() {
            break;
        }
        for i in tails {
            members.remove(&i);
        }
    }

    members.into_iter().map(|i| steps[i].id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;
    use deploy_common::types::DeploymentStep;

    use super::build;
    use crate::errors::DeployError;

    /// A minimal step for graph tests
    fn step(id: &str, deps: &[&str]) -> DeploymentStep {
        DeploymentStep::external(id, Address::ZERO).depends_on(deps.iter().copied())
    }

    /// Index of an id in a plan's order
    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|s| s == id).unwrap()
    }

    #[test]
    fn test_order_respects_edges() {
        let steps = vec![
            step("d", &["b", "c"]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("a", &[]),
        ];
        let plan = build(&steps).unwrap();

        let order = plan.order();
        assert!(position(order, "a") < position(order, "b"));
        assert!(position(order, "a") < position(order, "c"));
        assert!(position(order, "b") < position(order, "d"));
        assert!(position(order, "c") < position(order, "d"));
    }

    #[test]
    fn test_ties_broken_by_declaration_order() {
        let steps = vec![step("z", &[]), step("m", &[]), step("a", &[])];
        let plan = build(&steps).unwrap();
        assert_eq!(plan.order(), ["z", "m", "a"]);
    }

    #[test]
    fn test_layers_group_independent_steps() {
        let steps = vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
            step("e", &[]),
        ];
        let plan = build(&steps).unwrap();

        assert_eq!(plan.layers().len(), 3);
        assert_eq!(plan.layers()[0], ["a", "e"]);
        assert_eq!(plan.layers()[1], ["b", "c"]);
        assert_eq!(plan.layers()[2], ["d"]);
    }

    #[test]
    fn test_unknown_dependency() {
        let steps = vec![step("a", &[]), step("b", &["nope"])];
        match build(&steps).unwrap_err() {
            DeployError::UnknownDependency { from, missing } => {
                assert_eq!(from, "b");
                assert_eq!(missing, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_names_exactly_the_participants() {
        // a -> b -> c -> a is a cycle; d hangs off of it, e is independent
        let steps = vec![
            step("a", &["c"]),
            step("b", &["a"]),
            step("c", &["b"]),
            step("d", &["c"]),
            step("e", &[]),
        ];
        match build(&steps).unwrap_err() {
            DeployError::Cycle(ids) => assert_eq!(ids, ["a", "b", "c"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let steps = vec![step("a", &["a"])];
        match build(&steps).unwrap_err() {
            DeployError::Cycle(ids) => assert_eq!(ids, ["a"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let steps = vec![step("a", &[]), step("a", &[])];
        assert!(matches!(
            build(&steps).unwrap_err(),
            DeployError::DuplicateStep(_)
        ));
    }

    #[test]
    fn test_duplicate_dependency_declarations_collapse() {
        let steps = vec![step("a", &[]), step("b", &["a", "a"])];
        let plan = build(&steps).unwrap();
        assert_eq!(plan.order(), ["a", "b"]);
    }
}
