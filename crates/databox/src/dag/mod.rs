//! Tag graph resolution.
//!
//! Before a box exists, the set of tags it will hold is resolved from a
//! [`Registry`](crate::Registry) and a list of root tags into a
//! [`TagGraph`].
//!
//! # Structure
//!
//! - [`GraphNode`] - one resolved tag with its dependency edges
//! - [`Edge`] - a dependency as declared, and the slot it resolved to
//! - [`Level`] - tags of equal dependency depth
//! - [`TagGraph`] - the complete resolved set for one box
//!
//! # Resolution
//!
//! [`resolve`] takes the transitive closure of the roots along compute
//! arguments, construction dependencies and reference targets. Base tags
//! are bound to one implementation each: implementations that are included
//! explicitly win, and a base's default is pulled in only when the closure
//! contains none. The graph is then ordered leaf first. Cycles are reported
//! with their path.

mod builder;
mod topology;
mod types;


pub use builder::resolve;
pub use types::{Edge, GraphNode, Level, TagGraph};
