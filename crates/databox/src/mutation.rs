//! Writes to simple tags and invalidation of their dependents.

use tracing::trace;

use crate::error::{Error, Result};
use crate::storage::{DataBox, Slot};
use crate::types::{Tag, TagKind};

impl DataBox {
    /// Modify a simple tag in place and mark its dependents dirty.
    ///
    /// The tag may be named directly, through a base tag, or through a
    /// reference, but the slot it resolves to must be simple. Exactly the
    /// compute tags that transitively depend on it become dirty. Nothing is
    /// recomputed until it is next read.
    ///
    /// ```
    /// # use databox::{DataBox, ExternalValues, OptionTable, Registry, Tag, TagDecl};
    /// # fn main() -> databox::Result<()> {
    /// let time: Tag<f64> = Tag::new("Time");
    /// let doubled: Tag<f64> = Tag::new("DoubledTime");
    ///
    /// let mut registry = Registry::new();
    /// registry.register(TagDecl::simple(&time))?;
    /// registry.register(TagDecl::compute(&doubled, vec![time.id().clone()], {
    ///     let time = time.clone();
    ///     move |out: &mut f64, args| {
    ///         *out = 2.0 * args.get(&time)?;
    ///         Ok(())
    ///     }
    /// }))?;
    ///
    /// let mut data_box = DataBox::construct(
    ///     &registry,
    ///     &[doubled.id().clone()],
    ///     &OptionTable::new(),
    ///     ExternalValues::new().with(&time, 1.0),
    /// )?;
    /// assert_eq!(*data_box.get(&doubled)?, 2.0);
    ///
    /// data_box.mutate(&time, |t| *t += 0.5)?;
    /// assert!(!data_box.is_clean(&doubled)?);
    /// assert_eq!(*data_box.get(&doubled)?, 3.0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn mutate<T, R, F>(&mut self, tag: &Tag<T>, f: F) -> Result<R>
    where
        T: 'static,
        F: FnOnce(&mut T) -> R,
    {
        let index = self.storage_index(self.index_of(tag)?);
        let decl = self.decl_at(index);
        if decl.kind() != TagKind::Simple {
            return Err(Error::NotSimple {
                tag: tag.id().clone(),
                kind: decl.kind(),
                operation: "mutate",
            });
        }
        let stored = decl.type_name();

        let result = match &mut self.slots[index] {
            Slot::Simple(Some(value)) => {
                let value = value.downcast_mut::<T>().ok_or_else(|| Error::TypeMismatch {
                    tag: tag.id().clone(),
                    requested: std::any::type_name::<T>(),
                    stored,
                })?;
                f(value)
            }
            _ => return Err(Error::UninitializedAccess(tag.id().clone())),
        };

        self.invalidate_dependents(index);
        Ok(result)
    }

    /// Move the cached value of every dependent of `index` to its spare
    /// buffer.
    pub(crate) fn invalidate_dependents(&mut self, index: usize) {
        let dependents = &self.graph.nodes()[index].dependents;
        for &dependent in dependents {
            if let Slot::Compute(slot) = &mut self.slots[dependent]
                && let Some(value) = slot.cache.take()
            {
                trace!(tag = %self.graph.nodes()[dependent].id(), "invalidated");
                slot.spare.set(Some(value));
            }
        }
    }

    /// Mark every compute slot dirty.
    pub(crate) fn invalidate_all(&mut self) {
        for slot in &mut self.slots {
            if let Slot::Compute(slot) = slot
                && let Some(value) = slot.cache.take()
            {
                slot.spare.set(Some(value));
            }
        }
    }
}
