//! Ordering, cycle detection and the dependents index.

use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::types::{TagId, TagKind};

use super::types::{GraphNode, Level};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first post-order over dependency edges (leaf first).
///
/// Start nodes are visited in id order and edges in declaration order, so the
/// result does not depend on the order tags were discovered in.
pub(super) fn evaluation_order(nodes: &[GraphNode]) -> Result<Vec<usize>> {
    let mut starts: Vec<usize> = (0..nodes.len()).collect();
    starts.sort_by(|&a, &b| nodes[a].id().cmp(nodes[b].id()));

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    let mut path = Vec::new();

    for start in starts {
        visit(nodes, start, &mut marks, &mut path, &mut order)?;
    }

    Ok(order)
}

fn visit(
    nodes: &[GraphNode],
    index: usize,
    marks: &mut [Mark],
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> Result<()> {
    match marks[index] {
        Mark::Done => return Ok(()),
        Mark::InProgress => {
            let start = path.iter().position(|&i| i == index).unwrap_or_default();
            let cycle: Vec<TagId> = path[start..]
                .iter()
                .chain(std::iter::once(&index))
                .map(|&i| nodes[i].id().clone())
                .collect();
            return Err(Error::CyclicDependency { cycle });
        }
        Mark::Unvisited => {}
    }

    marks[index] = Mark::InProgress;
    path.push(index);
    for edge in &nodes[index].edges {
        visit(nodes, edge.index, marks, path, order)?;
    }
    path.pop();
    marks[index] = Mark::Done;
    order.push(index);
    Ok(())
}

/// Assign each node its depth and group the graph into levels.
pub(super) fn topological_levels(nodes: &mut [GraphNode], order: &[usize]) -> Vec<Level> {
    for &index in order {
        let depth = nodes[index]
            .edges
            .iter()
            .map(|edge| nodes[edge.index].depth + 1)
            .max()
            .unwrap_or(0);
        nodes[index].depth = depth;
    }

    let mut grouped: IndexMap<usize, Vec<TagId>> = IndexMap::new();
    for node in nodes.iter() {
        grouped.entry(node.depth).or_default().push(node.id().clone());
    }
    grouped.sort_keys();

    grouped
        .into_iter()
        .map(|(depth, mut tags)| {
            // Sort for determinism
            tags.sort();
            Level { depth, tags }
        })
        .collect()
}

/// Fill every node's dependents with its reverse-reachable closure.
///
/// Only compute and reference edges are followed.
pub(super) fn dependents_index(nodes: &mut [GraphNode], order: &[usize]) {
    let mut reverse: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (index, node) in nodes.iter().enumerate() {
        if node.kind() == TagKind::Simple {
            continue;
        }
        for edge in &node.edges {
            reverse[edge.index].push(index);
        }
    }

    let mut position = vec![0; nodes.len()];
    for (pos, &index) in order.iter().enumerate() {
        position[index] = pos;
    }

    for index in 0..nodes.len() {
        let mut seen = vec![false; nodes.len()];
        let mut queue: VecDeque<usize> = reverse[index].iter().copied().collect();
        let mut dependents = Vec::new();

        while let Some(next) = queue.pop_front() {
            if seen[next] {
                continue;
            }
            seen[next] = true;
            dependents.push(next);
            queue.extend(reverse[next].iter().copied());
        }

        dependents.sort_by_key(|&i| position[i]);
        nodes[index].dependents = dependents;
    }
}
