//! Errors raised while resolving, constructing, reading or mutating a box.
//!
//! # Error Categories
//!
//! - **Graph errors** (raised by [`resolve`](crate::resolve) before any box
//!   exists): [`Error::UnresolvedDependency`], [`Error::CyclicDependency`],
//!   [`Error::AmbiguousBaseTag`], plus registry mistakes such as
//!   [`Error::DuplicateTag`].
//! - **Configuration errors**: [`Error::InvalidOption`],
//!   [`Error::Construction`], [`Error::ConflictingInitialization`].
//! - **Usage errors**: [`Error::UninitializedAccess`], [`Error::NotSimple`],
//!   [`Error::TypeMismatch`], [`Error::UnknownTag`],
//!   [`Error::UndeclaredArgument`].
//! - **Compute errors**: [`Error::Compute`], raised when a physics function
//!   fails while a value is being derived.
//!
//! Nothing is retried or replaced by a default. A box that hit a
//! configuration error is never handed out, and a failed computation leaves
//! its slot dirty.

use thiserror::Error;

use crate::types::{TagId, TagKind};

/// Result type alias for box operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Opaque failure reported by a compute or construction function.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the tag registry, graph builder and box.
#[derive(Debug, Error)]
pub enum Error {
    /// Two declarations share one identifier, or a declaration reuses the
    /// name of a base tag.
    #[error("duplicate tag declaration: {0}")]
    DuplicateTag(TagId),

    /// A tag was requested that is neither registered nor part of the box.
    #[error("unknown tag: {0}")]
    UnknownTag(TagId),

    /// A declared dependency names nothing the registry can provide.
    #[error("{tag} depends on {dependency}, which is not registered and has no implementation")]
    UnresolvedDependency {
        /// The tag whose declaration names the dependency.
        tag: TagId,
        /// The missing dependency.
        dependency: TagId,
    },

    /// The requested tag set contains a dependency cycle.
    ///
    /// The path starts and ends with the same tag.
    #[error("cycle detected in tag graph: {}", join_path(.cycle))]
    CyclicDependency {
        /// Tags along the cycle, in dependency order.
        cycle: Vec<TagId>,
    },

    /// Two distinct implementations claim the same base tag.
    #[error("ambiguous base tag {base}: implemented by both {first} and {second}")]
    AmbiguousBaseTag {
        /// The logical quantity with conflicting implementations.
        base: TagId,
        /// The implementation bound first.
        first: TagId,
        /// The conflicting implementation.
        second: TagId,
    },

    /// An option value is missing, of the wrong kind, or outside its bounds.
    #[error("invalid option {option} for {tag}: {reason}")]
    InvalidOption {
        /// The simple tag being constructed.
        tag: TagId,
        /// The offending option name.
        option: String,
        /// The violated bound or constraint.
        reason: String,
    },

    /// A construction function failed for a reason other than an option
    /// violation.
    #[error("failed to construct {tag}: {source}")]
    Construction {
        /// The simple tag being constructed.
        tag: TagId,
        /// The underlying failure.
        #[source]
        source: BoxedError,
    },

    /// A tag was supplied externally although it is built from options.
    #[error("{tag} is constructed from options and cannot also be supplied externally")]
    ConflictingInitialization {
        /// The doubly initialized tag.
        tag: TagId,
    },

    /// A simple tag was read or mutated before any value was supplied.
    #[error("uninitialized access: {0} has no value")]
    UninitializedAccess(TagId),

    /// A write targeted a tag that is not simple.
    #[error("{operation} requires a simple tag, but {tag} is a {kind} tag")]
    NotSimple {
        /// The targeted tag.
        tag: TagId,
        /// Its actual kind.
        kind: TagKind,
        /// What was attempted.
        operation: &'static str,
    },

    /// A value was accessed with a type other than the one stored.
    #[error("type mismatch for {tag}: requested {requested}, stored {stored}")]
    TypeMismatch {
        /// The tag that was accessed.
        tag: TagId,
        /// The type the caller asked for.
        requested: &'static str,
        /// The type the tag declares.
        stored: &'static str,
    },

    /// A compute or construction function read a tag it did not declare.
    #[error("{tag} read {argument}, which is not one of its declared arguments")]
    UndeclaredArgument {
        /// The tag whose function performed the read.
        tag: TagId,
        /// The undeclared tag.
        argument: TagId,
    },

    /// A compute function failed.
    #[error("compute function of {tag} failed: {source}")]
    Compute {
        /// The tag being evaluated.
        tag: TagId,
        /// The underlying failure.
        #[source]
        source: BoxedError,
    },
}

fn join_path(path: &[TagId]) -> String {
    path.iter()
        .map(TagId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
