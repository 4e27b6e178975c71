//! Box construction: slot allocation, external values and option-constructed
//! simple tags.

use std::any::{TypeId, type_name};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, instrument};

use crate::dag::{TagGraph, resolve};
use crate::error::{Error, Result};
use crate::options::{OptionTable, OptionValues, OptionViolation};
use crate::registry::{Erased, Registry, TagBody};
use crate::storage::{ComputeSlot, DataBox, Slot};
use crate::types::{Tag, TagId, TagKind};

struct ExternalValue {
    type_id: TypeId,
    type_name: &'static str,
    value: Erased,
}

/// Values supplied to simple tags from outside the box.
///
/// ```
/// use databox::{ExternalValues, Tag};
///
/// let time: Tag<f64> = Tag::new("Time");
/// let external = ExternalValues::new().with(&time, 0.0);
/// assert_eq!(external.len(), 1);
/// ```
#[derive(Default)]
pub struct ExternalValues {
    values: IndexMap<TagId, ExternalValue>,
}

impl ExternalValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply a value, replacing any earlier value for the same tag.
    pub fn insert<T: Send + 'static>(&mut self, tag: &Tag<T>, value: T) {
        self.values.insert(
            tag.id().clone(),
            ExternalValue {
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
                value: Box::new(value),
            },
        );
    }

    /// Builder method: supply a value.
    pub fn with<T: Send + 'static>(mut self, tag: &Tag<T>, value: T) -> Self {
        self.insert(tag, value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for ExternalValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.values.keys()).finish()
    }
}

impl DataBox {
    /// Resolve `roots` against `registry` and build a box.
    ///
    /// Graph errors are raised before any slot is allocated. Simple tags are
    /// then filled from `external` and from `options`; every compute slot
    /// starts dirty.
    pub fn construct(
        registry: &Registry,
        roots: &[TagId],
        options: &OptionTable,
        external: ExternalValues,
    ) -> Result<Self> {
        let graph = resolve(registry, roots)?;
        Self::from_graph(graph, options, external)
    }

    /// Build a box from an already resolved graph.
    ///
    /// Many element boxes share one tag set; resolving once and cloning the
    /// graph avoids repeating resolution per element.
    #[instrument(skip_all, fields(tags = graph.len()))]
    pub fn from_graph(
        graph: TagGraph,
        options: &OptionTable,
        external: ExternalValues,
    ) -> Result<Self> {
        let slots = graph
            .nodes()
            .iter()
            .map(|node| match node.kind() {
                TagKind::Simple => Slot::Simple(None),
                TagKind::Compute => Slot::Compute(ComputeSlot::default()),
                TagKind::Reference => Slot::Reference(node.edges[0].index),
            })
            .collect();
        let evaluations = (0..graph.len()).map(|_| Default::default()).collect();

        let mut data_box = DataBox {
            graph,
            slots,
            evaluations,
        };

        let supplied = external.len();
        data_box.apply_external(external)?;
        let constructed = data_box.construct_from_options(options)?;

        info!(
            tags = data_box.len(),
            supplied, constructed, "data box constructed"
        );
        Ok(data_box)
    }

    fn apply_external(&mut self, external: ExternalValues) -> Result<()> {
        for (id, supplied) in external.values {
            let index = self.lookup(&id)?;
            let decl = self.decl_at(index);

            if decl.kind() != TagKind::Simple {
                return Err(Error::NotSimple {
                    tag: id,
                    kind: decl.kind(),
                    operation: "external initialization",
                });
            }
            if decl.is_option_constructed() {
                return Err(Error::ConflictingInitialization { tag: id });
            }
            if decl.type_id() != supplied.type_id {
                return Err(Error::TypeMismatch {
                    tag: id,
                    requested: supplied.type_name,
                    stored: decl.type_name(),
                });
            }

            self.slots[index] = Slot::Simple(Some(supplied.value));
        }
        Ok(())
    }

    /// Run construction functions leaf first. Returns how many ran.
    fn construct_from_options(&mut self, table: &OptionTable) -> Result<usize> {
        let order = self.graph.order().to_vec();
        let mut constructed = 0;

        for index in order {
            let decl = Arc::clone(&self.graph.nodes()[index].decl);
            let TagBody::Simple {
                construction: Some(construction),
                ..
            } = &decl.body
            else {
                continue;
            };

            let mut values = OptionValues::default();
            for option in &construction.options {
                let value = option
                    .validate(table)
                    .map_err(|violation| invalid_option(decl.id(), violation))?;
                values.insert(option.name(), value);
            }

            let value = {
                let args = self.args_for(index)?;
                (construction.construct)(&values, &args)
                    .map_err(|err| construction_error(decl.id(), err))?
            };

            debug!(tag = %decl.id(), options = construction.options.len(), "constructed from options");
            self.slots[index] = Slot::Simple(Some(value));
            constructed += 1;
        }

        Ok(constructed)
    }
}

fn invalid_option(tag: &TagId, violation: OptionViolation) -> Error {
    Error::InvalidOption {
        tag: tag.clone(),
        option: violation.option,
        reason: violation.reason,
    }
}

fn construction_error(tag: &TagId, err: anyhow::Error) -> Error {
    let err = match err.downcast::<OptionViolation>() {
        Ok(violation) => return invalid_option(tag, violation),
        Err(err) => err,
    };
    match err.downcast::<Error>() {
        Ok(err) => err,
        Err(err) => Error::Construction {
            tag: tag.clone(),
            source: err.into(),
        },
    }
}
