//! Component ordering and selection.
//!
//! Components form a dependency graph through their `requires` lists. The
//! install order puts every prerequisite before its dependents and otherwise
//! keeps the declaration order, so the built-in catalog runs top to bottom.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;

use crate::core::component::Component;
use crate::ops::errors::BootstrapError;
use crate::ops::install::probe_component;
use crate::util::context::HostContext;

/// Order `components` for installation, optionally restricted to `only`
/// (plus everything those names require).
pub fn plan_components(
    components: &[Component],
    only: &[String],
) -> Result<Vec<Component>, BootstrapError> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut by_name: HashMap<&str, NodeIndex> = HashMap::new();

    for (i, component) in components.iter().enumerate() {
        let node = graph.add_node(i);
        by_name.insert(component.name.as_str(), node);
    }

    // Edge dep -> dependent.
    for (i, component) in components.iter().enumerate() {
        for dep in &component.requires {
            let from = by_name.get(dep.as_str()).copied().ok_or_else(|| {
                BootstrapError::UnknownDependency {
                    component: component.name.clone(),
                    dependency: dep.clone(),
                }
            })?;
            graph.update_edge(from, NodeIndex::new(i), ());
        }
    }

    if let Err(cycle) = toposort(&graph, None) {
        return Err(BootstrapError::DependencyCycle {
            component: components[graph[cycle.node_id()]].name.clone(),
        });
    }

    let selected = select(&graph, &by_name, only)?;
    let order = stable_order(&graph, &selected);

    Ok(order
        .into_iter()
        .map(|node| components[graph[node]].clone())
        .collect())
}

/// Nodes named in `only` and their transitive prerequisites; all nodes when
/// `only` is empty.
fn select(
    graph: &DiGraph<usize, ()>,
    by_name: &HashMap<&str, NodeIndex>,
    only: &[String],
) -> Result<HashSet<NodeIndex>, BootstrapError> {
    if only.is_empty() {
        return Ok(graph.node_indices().collect());
    }

    let mut selected = HashSet::new();
    let mut stack = Vec::new();
    for name in only {
        let node = by_name
            .get(name.as_str())
            .copied()
            .ok_or_else(|| BootstrapError::UnknownComponent(name.clone()))?;
        stack.push(node);
    }

    while let Some(node) = stack.pop() {
        if selected.insert(node) {
            stack.extend(graph.neighbors_directed(node, Direction::Incoming));
        }
    }
    Ok(selected)
}

/// Kahn's algorithm, always taking the earliest-declared ready node.
fn stable_order(graph: &DiGraph<usize, ()>, selected: &HashSet<NodeIndex>) -> Vec<NodeIndex> {
    let mut pending: HashMap<NodeIndex, usize> = selected
        .iter()
        .map(|&n| {
            let deps = graph
                .neighbors_directed(n, Direction::Incoming)
                .filter(|d| selected.contains(d))
                .count();
            (n, deps)
        })
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = pending
        .iter()
        .filter(|&(_, &deps)| deps == 0)
        .map(|(n, _)| Reverse(n.index()))
        .collect();

    let mut order = Vec::with_capacity(selected.len());
    while let Some(Reverse(index)) = ready.pop() {
        let node = NodeIndex::new(index);
        order.push(node);
        for dependent in graph.neighbors_directed(node, Direction::Outgoing) {
            if let Some(deps) = pending.get_mut(&dependent) {
                *deps -= 1;
                if *deps == 0 {
                    ready.push(Reverse(dependent.index()));
                }
            }
        }
    }
    order
}

/// One line of `hostprep plan`.
#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub name: String,
    pub description: String,
    pub requires: Vec<String>,
    pub repository: Option<String>,
    pub packages: Vec<String>,
    pub service: Option<String>,
    /// Current probe result, when the host was probed
    pub state: Option<String>,
    pub satisfied: Option<bool>,
}

/// Describe `ordered`, probing each component when `ctx` is given.
pub fn describe_plan(ctx: Option<&HostContext<'_>>, ordered: &[Component]) -> Vec<PlanEntry> {
    ordered
        .iter()
        .map(|c| {
            let probe = ctx.map(|ctx| probe_component(ctx, c));
            PlanEntry {
                name: c.name.clone(),
                description: c.description.clone(),
                requires: c.requires.clone(),
                repository: c.repository.as_ref().map(|r| r.name.clone()),
                packages: c.install.packages.clone(),
                service: c.service().map(str::to_string),
                state: probe.as_ref().map(|p| p.to_string()),
                satisfied: probe.as_ref().map(|p| p.is_satisfied()),
            }
        })
        .collect()
}
