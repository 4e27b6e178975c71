//! Tag declarations and the registry physics modules contribute them to.
//!
//! A [`TagDecl`] describes how one tag obtains its value:
//!
//! - **simple** tags are supplied externally, or built once from options
//!   (and optionally from other tags) by a construction function;
//! - **compute** tags are derived from an ordered argument list by a pure
//!   function that writes into the slot in place;
//! - **reference** tags alias another tag and own no storage.
//!
//! A declaration may also state that it implements a *base tag*: a logical
//! quantity with several interchangeable implementations. Dependents name the
//! base, and [`resolve`](crate::resolve) binds it to exactly one
//! implementation per box.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::checkpoint::ValueCodec;
use crate::error::{Error, Result};
use crate::options::{OptionTag, OptionValues};
use crate::storage::Args;
use crate::types::{Tag, TagId, TagKind};

pub(crate) type Erased = Box<dyn Any + Send>;

pub(crate) type ComputeFn =
    Box<dyn Fn(&mut (dyn Any + Send), &Args<'_>) -> anyhow::Result<()> + Send + Sync>;

pub(crate) type InitFn = Box<dyn Fn() -> Erased + Send + Sync>;

pub(crate) type ConstructFn =
    Box<dyn Fn(&OptionValues, &Args<'_>) -> anyhow::Result<Erased> + Send + Sync>;

/// Base tag a declaration implements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseBinding {
    /// The logical quantity.
    pub base: TagId,
    /// Whether this is the implementation used when none is named explicitly.
    pub default: bool,
}

pub(crate) struct Construction {
    pub(crate) options: Vec<OptionTag>,
    pub(crate) dependencies: Vec<TagId>,
    pub(crate) construct: ConstructFn,
}

pub(crate) enum TagBody {
    Simple {
        construction: Option<Construction>,
        codec: ValueCodec,
    },
    Compute {
        arguments: Vec<TagId>,
        init: InitFn,
        compute: ComputeFn,
    },
    Reference {
        target: TagId,
    },
}

/// Declaration of one tag.
pub struct TagDecl {
    id: TagId,
    type_id: TypeId,
    type_name: &'static str,
    base: Option<BaseBinding>,
    pub(crate) body: TagBody,
}

impl TagDecl {
    fn new<T: 'static>(tag: &Tag<T>, body: TagBody) -> Self {
        Self {
            id: tag.id().clone(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            base: None,
            body,
        }
    }

    /// A simple tag whose value is supplied from outside the box.
    pub fn simple<T>(tag: &Tag<T>) -> Self
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        Self::new(
            tag,
            TagBody::Simple {
                construction: None,
                codec: ValueCodec::of::<T>(),
            },
        )
    }

    /// A simple tag built from option values at construction.
    pub fn from_options<T, F>(tag: &Tag<T>, options: Vec<OptionTag>, construct: F) -> Self
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(&OptionValues) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self::from_options_and_tags(tag, options, Vec::new(), move |options, _| construct(options))
    }

    /// A simple tag built from option values and already constructed tags.
    ///
    /// `dependencies` may name simple tags or base tags. They are read through
    /// the [`Args`] view in the order given.
    pub fn from_options_and_tags<T, F>(
        tag: &Tag<T>,
        options: Vec<OptionTag>,
        dependencies: Vec<TagId>,
        construct: F,
    ) -> Self
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(&OptionValues, &Args<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let construct: ConstructFn =
            Box::new(move |options, args| Ok(Box::new(construct(options, args)?) as Erased));
        Self::new(
            tag,
            TagBody::Simple {
                construction: Some(Construction {
                    options,
                    dependencies,
                    construct,
                }),
                codec: ValueCodec::of::<T>(),
            },
        )
    }

    /// A compute tag derived from `arguments`.
    ///
    /// The function receives the slot's previous allocation (or
    /// `T::default()` on first evaluation) and must overwrite it completely.
    /// It must be pure: its result may depend only on the declared arguments.
    pub fn compute<T, F>(tag: &Tag<T>, arguments: Vec<TagId>, compute: F) -> Self
    where
        T: Default + Send + 'static,
        F: Fn(&mut T, &Args<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = tag.id().clone();
        let compute: ComputeFn = Box::new(move |slot, args| {
            let slot = slot.downcast_mut::<T>().ok_or_else(|| {
                anyhow::anyhow!("slot of {id} does not hold a {}", type_name::<T>())
            })?;
            compute(slot, args)
        });
        Self::new(
            tag,
            TagBody::Compute {
                arguments,
                init: Box::new(|| Box::new(T::default()) as Erased),
                compute,
            },
        )
    }

    /// A reference tag reading through to `target`.
    ///
    /// `target` may be a concrete tag or a base tag.
    pub fn reference<T: 'static>(tag: &Tag<T>, target: impl Into<TagId>) -> Self {
        Self::new(
            tag,
            TagBody::Reference {
                target: target.into(),
            },
        )
    }

    /// Builder method: declare this tag an implementation of `base`.
    pub fn implements(mut self, base: impl Into<TagId>) -> Self {
        self.base = Some(BaseBinding {
            base: base.into(),
            default: false,
        });
        self
    }

    /// Builder method: declare this tag the default implementation of `base`.
    pub fn default_for(mut self, base: impl Into<TagId>) -> Self {
        self.base = Some(BaseBinding {
            base: base.into(),
            default: true,
        });
        self
    }

    pub fn id(&self) -> &TagId {
        &self.id
    }

    pub fn kind(&self) -> TagKind {
        match self.body {
            TagBody::Simple { .. } => TagKind::Simple,
            TagBody::Compute { .. } => TagKind::Compute,
            TagBody::Reference { .. } => TagKind::Reference,
        }
    }

    /// Name of the stored value type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn base(&self) -> Option<&BaseBinding> {
        self.base.as_ref()
    }

    /// Whether this simple tag is built from options.
    pub fn is_option_constructed(&self) -> bool {
        matches!(
            self.body,
            TagBody::Simple {
                construction: Some(_),
                ..
            }
        )
    }

    /// Option descriptors consumed at construction (empty for other tags).
    pub fn options(&self) -> &[OptionTag] {
        match &self.body {
            TagBody::Simple {
                construction: Some(construction),
                ..
            } => &construction.options,
            _ => &[],
        }
    }

    /// Every tag this declaration reads, in declaration order.
    ///
    /// Compute arguments, construction dependencies, or the reference target.
    pub fn dependencies(&self) -> &[TagId] {
        match &self.body {
            TagBody::Simple {
                construction: Some(construction),
                ..
            } => &construction.dependencies,
            TagBody::Simple { .. } => &[],
            TagBody::Compute { arguments, .. } => arguments,
            TagBody::Reference { target } => std::slice::from_ref(target),
        }
    }
}

impl fmt::Debug for TagDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagDecl")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("type", &self.type_name)
            .field("base", &self.base)
            .field("dependencies", &self.dependencies())
            .finish()
    }
}

/// All tag declarations known to a program.
///
/// Registration order is preserved. The registry also tracks which
/// declarations implement which base tag, and each base's default.
#[derive(Debug, Default)]
pub struct Registry {
    decls: IndexMap<TagId, Arc<TagDecl>>,
    implementations: IndexMap<TagId, Vec<TagId>>,
    defaults: IndexMap<TagId, TagId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration.
    ///
    /// Fails with [`Error::DuplicateTag`] if the id is already declared or
    /// names a base tag, and with [`Error::AmbiguousBaseTag`] if a second
    /// default is declared for one base.
    pub fn register(&mut self, decl: TagDecl) -> Result<()> {
        if self.decls.contains_key(&decl.id) || self.implementations.contains_key(&decl.id) {
            return Err(Error::DuplicateTag(decl.id));
        }

        if let Some(binding) = &decl.base {
            if self.decls.contains_key(&binding.base) || binding.base == decl.id {
                return Err(Error::DuplicateTag(binding.base.clone()));
            }
            if binding.default
                && let Some(existing) = self.defaults.get(&binding.base)
            {
                return Err(Error::AmbiguousBaseTag {
                    base: binding.base.clone(),
                    first: existing.clone(),
                    second: decl.id.clone(),
                });
            }

            debug!(tag = %decl.id, base = %binding.base, default = binding.default, "registered base implementation");
            self.implementations
                .entry(binding.base.clone())
                .or_default()
                .push(decl.id.clone());
            if binding.default {
                self.defaults.insert(binding.base.clone(), decl.id.clone());
            }
        }

        self.decls.insert(decl.id.clone(), Arc::new(decl));
        Ok(())
    }

    pub fn get(&self, id: &TagId) -> Option<&Arc<TagDecl>> {
        self.decls.get(id)
    }

    pub fn contains(&self, id: &TagId) -> bool {
        self.decls.contains_key(id)
    }

    /// Whether `id` names a base tag some declaration implements.
    pub fn is_base(&self, id: &TagId) -> bool {
        self.implementations.contains_key(id)
    }

    /// The default implementation of `base`, if one was declared.
    pub fn default_implementation(&self, base: &TagId) -> Option<&Arc<TagDecl>> {
        self.defaults.get(base).and_then(|id| self.decls.get(id))
    }

    /// All implementations of `base` in registration order.
    pub fn implementations(&self, base: &TagId) -> &[TagId] {
        self.implementations
            .get(base)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Iterate over declarations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TagDecl> {
        self.decls.values().map(Arc::as_ref)
    }
}
