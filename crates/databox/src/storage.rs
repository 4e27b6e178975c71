//! Slot storage and memoized evaluation.
//!
//! A [`DataBox`] holds exactly one slot per resolved tag:
//!
//! - simple slots hold the supplied or constructed value;
//! - compute slots hold a cache that is either filled (clean) or empty
//!   (dirty), plus a spare buffer holding the previous allocation while dirty;
//! - reference slots hold the index of the slot they read through to.
//!
//! # Evaluation
//!
//! Reading a dirty compute tag first reads each of its arguments (recursively
//! evaluating those that are dirty), then runs the compute function in place
//! on the spare buffer and marks the slot clean. A clean slot is returned
//! without running anything, so each compute function runs at most once per
//! dirty period.
//!
//! Reads take `&self` and return references that borrow the box. A reference
//! obtained from [`DataBox::get`] therefore cannot be held across
//! [`DataBox::mutate`], which takes `&mut self`.

use std::any::{Any, TypeId, type_name};
use std::cell::{Cell, OnceCell};
use std::fmt;

use tracing::trace;

use crate::dag::{Level, TagGraph};
use crate::error::{Error, Result};
use crate::registry::{Erased, TagBody, TagDecl};
use crate::types::{Tag, TagId};

pub(crate) enum Slot {
    Simple(Option<Erased>),
    Compute(ComputeSlot),
    Reference(usize),
}

#[derive(Default)]
pub(crate) struct ComputeSlot {
    pub(crate) cache: OnceCell<Erased>,
    pub(crate) spare: Cell<Option<Erased>>,
}

/// A tagged dependency-graph store for one element's state.
///
/// Built with [`DataBox::construct`]. Boxes are `Send`, so distinct boxes
/// can be driven from different threads, but a single box is not shared.
pub struct DataBox {
    pub(crate) graph: TagGraph,
    pub(crate) slots: Vec<Slot>,
    pub(crate) evaluations: Vec<Cell<u64>>,
}

impl DataBox {
    /// Read a tag's value.
    ///
    /// Simple tags return their stored value, or fail with
    /// [`Error::UninitializedAccess`] if none was supplied. Compute tags are
    /// evaluated first if dirty. Base tags and reference tags read through to
    /// the implementation bound in this box.
    pub fn get<T: 'static>(&self, tag: &Tag<T>) -> Result<&T> {
        let index = self.index_of(tag)?;
        let value = self.value_at(index)?;
        value
            .downcast_ref::<T>()
            .ok_or_else(|| self.type_mismatch::<T>(tag.id(), index))
    }

    /// Whether the tag's value is available without evaluation.
    ///
    /// Simple tags are always clean.
    pub fn is_clean(&self, tag: impl Into<TagId>) -> Result<bool> {
        let index = self.lookup(&tag.into())?;
        Ok(self.is_clean_at(index))
    }

    /// How many times the tag's compute function has run.
    ///
    /// Zero for simple tags. Reference tags report their target.
    pub fn evaluations(&self, tag: impl Into<TagId>) -> Result<u64> {
        let index = self.storage_index(self.lookup(&tag.into())?);
        Ok(self.evaluations[index].get())
    }

    /// The resolved graph this box was built from.
    pub fn graph(&self) -> &TagGraph {
        &self.graph
    }

    /// Tags grouped by dependency depth.
    pub fn levels(&self) -> &[Level] {
        self.graph.levels()
    }

    /// Whether the box holds `id`, directly or as a bound base tag.
    pub fn contains(&self, id: &TagId) -> bool {
        self.graph.contains(id)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn lookup(&self, id: &TagId) -> Result<usize> {
        self.graph
            .lookup(id)
            .ok_or_else(|| Error::UnknownTag(id.clone()))
    }

    /// Look up a typed handle and check its type against the declaration.
    pub(crate) fn index_of<T: 'static>(&self, tag: &Tag<T>) -> Result<usize> {
        let index = self.lookup(tag.id())?;
        if self.decl_at(index).type_id() != TypeId::of::<T>() {
            return Err(self.type_mismatch::<T>(tag.id(), index));
        }
        Ok(index)
    }

    pub(crate) fn decl_at(&self, index: usize) -> &TagDecl {
        self.graph.nodes()[index].decl()
    }

    fn type_mismatch<T>(&self, id: &TagId, index: usize) -> Error {
        Error::TypeMismatch {
            tag: id.clone(),
            requested: type_name::<T>(),
            stored: self.decl_at(index).type_name(),
        }
    }

    /// Follow reference slots to the slot that owns the value.
    pub(crate) fn storage_index(&self, mut index: usize) -> usize {
        while let Slot::Reference(target) = self.slots[index] {
            index = target;
        }
        index
    }

    pub(crate) fn is_clean_at(&self, index: usize) -> bool {
        match &self.slots[self.storage_index(index)] {
            Slot::Compute(slot) => slot.cache.get().is_some(),
            Slot::Simple(_) | Slot::Reference(_) => true,
        }
    }

    /// The value of a slot, evaluating compute slots on demand.
    pub(crate) fn value_at(&self, index: usize) -> Result<&(dyn Any + Send)> {
        let node = &self.graph.nodes()[index];
        match (&self.slots[index], &node.decl().body) {
            (Slot::Simple(value), _) => value
                .as_deref()
                .ok_or_else(|| Error::UninitializedAccess(node.id().clone())),
            (Slot::Reference(target), _) => self.value_at(*target),
            (Slot::Compute(slot), TagBody::Compute { init, compute, .. }) => {
                if let Some(value) = slot.cache.get() {
                    return Ok(&**value);
                }

                let args = self.args_for(index)?;
                let mut buffer = slot.spare.take().unwrap_or_else(|| init());
                if let Err(err) = compute(&mut *buffer, &args) {
                    slot.spare.set(Some(buffer));
                    return Err(compute_error(node.id(), err));
                }

                let count = self.evaluations[index].get() + 1;
                self.evaluations[index].set(count);
                trace!(tag = %node.id(), evaluations = count, "evaluated compute tag");

                Ok(&**slot.cache.get_or_init(|| buffer))
            }
            (Slot::Compute(_), _) => Err(Error::NotSimple {
                tag: node.id().clone(),
                kind: node.kind(),
                operation: "evaluation",
            }),
        }
    }

    /// Gather the resolved dependency values of a slot.
    pub(crate) fn args_for(&self, index: usize) -> Result<Args<'_>> {
        let node = &self.graph.nodes()[index];
        let mut entries = Vec::with_capacity(node.edges.len());
        for edge in &node.edges {
            let target = self.decl_at(edge.index);
            entries.push(ArgEntry {
                declared: &edge.declared,
                resolved: target.id(),
                type_id: target.type_id(),
                type_name: target.type_name(),
                value: self.value_at(edge.index)?,
            });
        }
        Ok(Args {
            owner: node.id(),
            entries,
        })
    }
}

fn compute_error(tag: &TagId, err: anyhow::Error) -> Error {
    // Argument access errors are reported as themselves.
    match err.downcast::<Error>() {
        Ok(err) => err,
        Err(err) => Error::Compute {
            tag: tag.clone(),
            source: err.into(),
        },
    }
}

impl fmt::Debug for DataBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for &index in self.graph.order() {
            let node = &self.graph.nodes()[index];
            let state = match &self.slots[index] {
                Slot::Simple(Some(_)) => "set",
                Slot::Simple(None) => "empty",
                Slot::Compute(slot) if slot.cache.get().is_some() => "clean",
                Slot::Compute(_) => "dirty",
                Slot::Reference(_) => "reference",
            };
            map.entry(node.id(), &state);
        }
        map.finish()
    }
}

struct ArgEntry<'a> {
    declared: &'a TagId,
    resolved: &'a TagId,
    type_id: TypeId,
    type_name: &'static str,
    value: &'a (dyn Any + Send),
}

/// Read-only view of the arguments of one compute or construction function.
///
/// Only the tags the declaration lists can be read. A declared base tag can
/// be read through either the base handle or the bound implementation's
/// handle.
pub struct Args<'a> {
    owner: &'a TagId,
    entries: Vec<ArgEntry<'a>>,
}

impl<'a> Args<'a> {
    /// Read a declared argument.
    ///
    /// Fails with [`Error::UndeclaredArgument`] for any tag the declaration
    /// does not list.
    pub fn get<T: 'static>(&self, tag: &Tag<T>) -> Result<&'a T> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.declared == tag.id() || entry.resolved == tag.id())
            .ok_or_else(|| Error::UndeclaredArgument {
                tag: self.owner.clone(),
                argument: tag.id().clone(),
            })?;

        let mismatch = || Error::TypeMismatch {
            tag: tag.id().clone(),
            requested: type_name::<T>(),
            stored: entry.type_name,
        };
        if entry.type_id != TypeId::of::<T>() {
            return Err(mismatch());
        }
        entry.value.downcast_ref::<T>().ok_or_else(mismatch)
    }

    /// The tag these arguments belong to.
    pub fn owner(&self) -> &TagId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Args<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("owner", &self.owner)
            .field(
                "arguments",
                &self.entries.iter().map(|e| e.declared).collect::<Vec<_>>(),
            )
            .finish()
    }
}
