//! Closure computation and base-tag binding.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::registry::{Registry, TagDecl};
use crate::stable_hash::{FNV1A_OFFSET_BASIS_64, fnv1a64_mix};
use crate::types::{TagId, TagKind};

use super::topology::{dependents_index, evaluation_order, topological_levels};
use super::types::{Edge, GraphNode, TagGraph};

/// Resolve the tags reachable from `roots` into a validated [`TagGraph`].
///
/// Roots may name concrete tags or base tags. Fails with
/// [`Error::UnknownTag`] for a root the registry does not know,
/// [`Error::UnresolvedDependency`] for a dependency nothing can provide,
/// [`Error::AmbiguousBaseTag`] when two implementations of one base are
/// included, [`Error::TypeMismatch`] when a reference and its target store
/// different types, and [`Error::CyclicDependency`] for a cycle.
#[instrument(skip_all, fields(roots = roots.len()))]
pub fn resolve(registry: &Registry, roots: &[TagId]) -> Result<TagGraph> {
    let mut closure = Closure::default();

    for root in roots {
        if let Some(decl) = registry.get(root) {
            closure.include(decl)?;
        } else if registry.is_base(root) {
            closure.request_base(root, root);
        } else {
            return Err(Error::UnknownTag(root.clone()));
        }
    }

    loop {
        while let Some(id) = closure.worklist.pop_front() {
            let decl = Arc::clone(&closure.included[&id]);
            for dependency in decl.dependencies() {
                if let Some(dep) = registry.get(dependency) {
                    closure.include(dep)?;
                } else if registry.is_base(dependency) {
                    closure.request_base(dependency, &id);
                } else {
                    return Err(Error::UnresolvedDependency {
                        tag: id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        // Defaults are only considered once every explicit implementation
        // reachable so far has been bound.
        let mut unbound: Vec<(TagId, TagId)> = closure
            .pending
            .iter()
            .filter(|(base, _)| !closure.bound.contains_key(*base))
            .map(|(base, requester)| (base.clone(), requester.clone()))
            .collect();
        if unbound.is_empty() {
            break;
        }
        unbound.sort();

        let defaults: Vec<(TagId, Arc<TagDecl>, IndexSet<TagId>)> = unbound
            .iter()
            .filter_map(|(base, _)| registry.default_implementation(base).map(|d| (base, d)))
            .map(|(base, default)| {
                let reach = closure.explicit_reach(registry, default);
                (base.clone(), Arc::clone(default), reach)
            })
            .collect();
        let reached_by_other = |base: &TagId| {
            defaults
                .iter()
                .any(|(other, _, reach)| other != base && reach.contains(base))
        };

        for (base, requester) in &unbound {
            if registry.default_implementation(base).is_none() && !reached_by_other(base) {
                return Err(Error::UnresolvedDependency {
                    tag: requester.clone(),
                    dependency: base.clone(),
                });
            }
        }

        // Bind a single default, then drain again. A default is held back
        // while another pending default leads to an explicit implementation
        // of its base.
        let Some((base, default, _)) = defaults
            .iter()
            .find(|(base, _, _)| !reached_by_other(base))
            .or_else(|| defaults.first())
        else {
            break;
        };
        debug!(base = %base, implementation = %default.id(), "binding default implementation");
        closure.include(default)?;
    }

    build_graph(closure)
}

#[derive(Default)]
struct Closure {
    included: IndexMap<TagId, Arc<TagDecl>>,
    /// Base id to the implementation bound to it.
    bound: IndexMap<TagId, TagId>,
    /// Base ids that were requested, with the first tag requesting each.
    pending: IndexMap<TagId, TagId>,
    worklist: VecDeque<TagId>,
}

impl Closure {
    fn include(&mut self, decl: &Arc<TagDecl>) -> Result<()> {
        if self.included.contains_key(decl.id()) {
            return Ok(());
        }

        if let Some(binding) = decl.base() {
            if let Some(existing) = self.bound.get(&binding.base) {
                return Err(Error::AmbiguousBaseTag {
                    base: binding.base.clone(),
                    first: existing.clone(),
                    second: decl.id().clone(),
                });
            }
            debug!(base = %binding.base, implementation = %decl.id(), "bound base tag");
            self.bound.insert(binding.base.clone(), decl.id().clone());
        }

        self.included.insert(decl.id().clone(), Arc::clone(decl));
        self.worklist.push_back(decl.id().clone());
        Ok(())
    }

    /// Bases that have a non-default implementation among the tags `start`
    /// would pull in.
    ///
    /// Walks concrete dependencies and the defaults of still unbound bases,
    /// stopping at tags already in the closure.
    fn explicit_reach(&self, registry: &Registry, start: &Arc<TagDecl>) -> IndexSet<TagId> {
        let mut reached = IndexSet::new();
        let mut visited = IndexSet::new();
        let mut stack = vec![Arc::clone(start)];

        while let Some(decl) = stack.pop() {
            if !visited.insert(decl.id().clone()) {
                continue;
            }
            if let Some(binding) = decl.base()
                && !binding.default
            {
                reached.insert(binding.base.clone());
            }
            for dependency in decl.dependencies() {
                let next = if let Some(dep) = registry.get(dependency) {
                    dep
                } else if !self.bound.contains_key(dependency)
                    && let Some(default) = registry.default_implementation(dependency)
                {
                    default
                } else {
                    continue;
                };
                if !self.included.contains_key(next.id()) {
                    stack.push(Arc::clone(next));
                }
            }
        }

        reached
    }

    fn request_base(&mut self, base: &TagId, requester: &TagId) {
        self.pending
            .entry(base.clone())
            .or_insert_with(|| requester.clone());
    }
}

fn build_graph(closure: Closure) -> Result<TagGraph> {
    let Closure {
        included, bound, ..
    } = closure;

    let index: IndexMap<TagId, usize> = included
        .keys()
        .enumerate()
        .map(|(i, id)| (id.clone(), i))
        .collect();
    let bindings: IndexMap<TagId, usize> = bound
        .iter()
        .filter_map(|(base, id)| index.get(id).map(|&i| (base.clone(), i)))
        .collect();

    let mut nodes = Vec::with_capacity(included.len());
    for decl in included.values() {
        let mut edges = Vec::with_capacity(decl.dependencies().len());
        for dependency in decl.dependencies() {
            let target = index
                .get(dependency)
                .or_else(|| bindings.get(dependency))
                .copied()
                .ok_or_else(|| Error::UnresolvedDependency {
                    tag: decl.id().clone(),
                    dependency: dependency.clone(),
                })?;
            edges.push(Edge {
                declared: dependency.clone(),
                index: target,
            });
        }
        nodes.push(GraphNode {
            decl: Arc::clone(decl),
            edges,
            dependents: Vec::new(),
            depth: 0,
        });
    }

    for node in &nodes {
        if node.kind() == TagKind::Reference
            && let Some(edge) = node.edges.first()
        {
            let target = &nodes[edge.index].decl;
            if target.type_id() != node.decl.type_id() {
                return Err(Error::TypeMismatch {
                    tag: node.id().clone(),
                    requested: node.decl.type_name(),
                    stored: target.type_name(),
                });
            }
        }
    }

    let order = evaluation_order(&nodes)?;
    let levels = topological_levels(&mut nodes, &order);
    dependents_index(&mut nodes, &order);

    let mut fingerprint = FNV1A_OFFSET_BASIS_64;
    for &i in &order {
        let decl = &nodes[i].decl;
        fingerprint = fnv1a64_mix(fingerprint, decl.id().as_str().as_bytes());
        fingerprint = fnv1a64_mix(fingerprint, &[0]);
        fingerprint = fnv1a64_mix(fingerprint, decl.type_name().as_bytes());
        fingerprint = fnv1a64_mix(fingerprint, &[0]);
    }

    debug!(
        tags = nodes.len(),
        levels = levels.len(),
        bindings = bindings.len(),
        "tag graph resolved"
    );

    Ok(TagGraph {
        nodes,
        index,
        bindings,
        order,
        levels,
        fingerprint,
    })
}
