//! Databox.
//!
//! A tagged dependency-graph store for simulation state. Each element of a
//! simulation keeps its quantities in a [`DataBox`]: one slot per *tag*,
//! where a tag is either supplied from outside, built once from options, or
//! derived on demand from other tags and memoized.
//!
//! # Architecture
//!
//! - [`types`] - Tag identifiers and typed handles: [`TagId`], [`Tag`]
//! - [`registry`] - Tag declarations and the [`Registry`] they are added to
//! - [`options`] - Option values, option descriptors and their validation
//! - [`dag`] - Resolution of a root set into an ordered [`TagGraph`]
//! - [`storage`] - The [`DataBox`] itself: slots, reads and memoization
//! - [`checkpoint`] - Snapshots of simple values on disk
//! - [`config`] - YAML run files
//! - [`error`] - Error types
//!
//! # Lifecycle
//!
//! 1. **Register** - physics modules add [`TagDecl`]s to a [`Registry`]
//! 2. **Resolve** - the closure of the root tags is validated and ordered;
//!    base tags are bound to one implementation each
//! 3. **Construct** - simple tags are filled from external values and from
//!    options; compute tags start dirty
//! 4. **Read** - [`DataBox::get`] evaluates dirty compute tags on demand
//! 5. **Mutate** - [`DataBox::mutate`] changes a simple tag and marks exactly
//!    its transitive dependents dirty
//!
//! # Example
//!
//! ```
//! use databox::{DataBox, ExternalValues, OptionKind, OptionTable, OptionTag, Registry, Tag, TagDecl};
//!
//! # fn main() -> databox::Result<()> {
//! let mass: Tag<f64> = Tag::new("Mass");
//! let velocity: Tag<f64> = Tag::new("Velocity");
//! let momentum: Tag<f64> = Tag::new("Momentum");
//!
//! let mut registry = Registry::new();
//! registry.register(TagDecl::from_options(
//!     &mass,
//!     vec![OptionTag::new("Particle.Mass", OptionKind::Real).lower_bound(0.0)],
//!     |options| Ok(options.get::<f64>("Particle.Mass")?),
//! ))?;
//! registry.register(TagDecl::simple(&velocity))?;
//! registry.register(TagDecl::compute(
//!     &momentum,
//!     vec![mass.id().clone(), velocity.id().clone()],
//!     {
//!         let (mass, velocity) = (mass.clone(), velocity.clone());
//!         move |out: &mut f64, args| {
//!             *out = args.get(&mass)? * args.get(&velocity)?;
//!             Ok(())
//!         }
//!     },
//! ))?;
//!
//! let options = OptionTable::new().with("Particle.Mass", 2.0);
//! let mut data_box = DataBox::construct(
//!     &registry,
//!     &[momentum.id().clone()],
//!     &options,
//!     ExternalValues::new().with(&velocity, 3.0),
//! )?;
//!
//! assert_eq!(*data_box.get(&momentum)?, 6.0);
//! data_box.mutate(&velocity, |v| *v = 4.0)?;
//! assert_eq!(*data_box.get(&momentum)?, 8.0);
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod config;
mod construct;
pub mod dag;
pub mod error;
mod mutation;
pub mod options;
pub mod registry;
pub mod stable_hash;
pub mod storage;
pub mod types;

pub use checkpoint::{CheckpointError, DEFAULT_COMPRESSION_LEVEL, Snapshot, SnapshotHeader};
pub use config::{ConfigError, DriverSettings, RunConfig, RunMetadata};
pub use construct::ExternalValues;
pub use dag::{Level, TagGraph, resolve};
pub use error::{Error, Result};
pub use options::{
    FromOptionValue, OptionKind, OptionTable, OptionTag, OptionValue, OptionValues,
    OptionViolation,
};
pub use registry::{BaseBinding, Registry, TagDecl};
pub use storage::{Args, DataBox};
pub use types::{Tag, TagId, TagKind};
