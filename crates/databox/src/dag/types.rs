//! Resolved graph types.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::registry::TagDecl;
use crate::types::{TagId, TagKind};

/// One dependency of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// The tag as named by the declaration (possibly a base tag).
    pub declared: TagId,
    /// Index of the node the dependency resolved to.
    pub index: usize,
}

/// A resolved tag within a [`TagGraph`].
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub(crate) decl: Arc<TagDecl>,
    /// Dependencies in declaration order.
    pub edges: Vec<Edge>,
    /// Every compute or reference node reachable backwards along compute and
    /// reference edges, in evaluation order.
    ///
    /// Construction dependencies of simple tags are not followed: they are
    /// read once while the box is built.
    pub dependents: Vec<usize>,
    /// Longest dependency path below this node.
    pub depth: usize,
}

impl GraphNode {
    pub fn id(&self) -> &TagId {
        self.decl.id()
    }

    pub fn kind(&self) -> TagKind {
        self.decl.kind()
    }

    pub fn decl(&self) -> &TagDecl {
        &self.decl
    }
}

/// Tags with no dependencies on each other, grouped by depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub depth: usize,
    /// Tag ids in this level, sorted.
    pub tags: Vec<TagId>,
}

/// The validated, ordered tag set of one box.
#[derive(Debug, Clone)]
pub struct TagGraph {
    pub(crate) nodes: Vec<GraphNode>,
    pub(crate) index: IndexMap<TagId, usize>,
    pub(crate) bindings: IndexMap<TagId, usize>,
    pub(crate) order: Vec<usize>,
    pub(crate) levels: Vec<Level>,
    pub(crate) fingerprint: u64,
}

impl TagGraph {
    /// Number of resolved tags.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` names a tag in the graph or a base tag bound in it.
    pub fn contains(&self, id: &TagId) -> bool {
        self.lookup(id).is_some()
    }

    /// Slot index for a tag id, following base-tag bindings.
    pub(crate) fn lookup(&self, id: &TagId) -> Option<usize> {
        self.index
            .get(id)
            .or_else(|| self.bindings.get(id))
            .copied()
    }

    pub fn node(&self, index: usize) -> Option<&GraphNode> {
        self.nodes.get(index)
    }

    pub(crate) fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Tag ids, leaf first.
    pub fn evaluation_order(&self) -> impl Iterator<Item = &TagId> {
        self.order.iter().map(|&i| self.nodes[i].id())
    }

    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    /// The compute and reference tags that must be invalidated when `id`
    /// changes, in evaluation order.
    pub fn dependents_of(&self, id: &TagId) -> Option<Vec<&TagId>> {
        let index = self.lookup(id)?;
        Some(
            self.nodes[index]
                .dependents
                .iter()
                .map(|&i| self.nodes[i].id())
                .collect(),
        )
    }

    /// Resolved dependencies of `id` in declaration order.
    pub fn dependencies_of(&self, id: &TagId) -> Option<Vec<&TagId>> {
        let index = self.lookup(id)?;
        Some(
            self.nodes[index]
                .edges
                .iter()
                .map(|edge| self.nodes[edge.index].id())
                .collect(),
        )
    }

    /// The implementation bound to a base tag.
    pub fn binding(&self, base: &TagId) -> Option<&TagId> {
        self.bindings.get(base).map(|&i| self.nodes[i].id())
    }

    /// All base-tag bindings as `(base, implementation)` pairs.
    pub fn bindings(&self) -> impl Iterator<Item = (&TagId, &TagId)> {
        self.bindings
            .iter()
            .map(|(base, &i)| (base, self.nodes[i].id()))
    }

    /// Tags grouped by dependency depth, shallowest first.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn kind_of(&self, id: &TagId) -> Option<TagKind> {
        self.lookup(id).map(|i| self.nodes[i].kind())
    }

    /// Stable hash of the tag ids and value types in the graph.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}
