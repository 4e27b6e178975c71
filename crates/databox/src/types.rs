//! Tag identifiers and typed tag handles.
//!
//! Every quantity stored in a [`DataBox`](crate::DataBox) is named by a
//! [`TagId`]. Callers normally hold a [`Tag<T>`] instead: a phantom-typed
//! handle that carries the value type so reads can be checked against it.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Unique identifier for a tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagId(pub String);

impl TagId {
    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TagId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl<T> From<&Tag<T>> for TagId {
    fn from(tag: &Tag<T>) -> Self {
        tag.id.clone()
    }
}

impl<T> From<Tag<T>> for TagId {
    fn from(tag: Tag<T>) -> Self {
        tag.id
    }
}

/// A typed handle naming one tag.
///
/// The handle holds no data. The type parameter records the value type the
/// tag stores so that [`DataBox::get`](crate::DataBox::get) can hand back a
/// `&T` after a checked downcast.
///
/// ```
/// use databox::{Tag, TagId};
///
/// let time: Tag<f64> = Tag::new("Time");
/// assert_eq!(time.id(), &TagId::from("Time"));
/// ```
pub struct Tag<T> {
    id: TagId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Tag<T> {
    /// Create a handle for the tag with the given identifier.
    pub fn new(id: impl Into<TagId>) -> Self {
        Self {
            id: id.into(),
            _marker: PhantomData,
        }
    }

    /// The tag's identifier.
    pub fn id(&self) -> &TagId {
        &self.id
    }
}

impl<T> Clone for Tag<T> {
    fn clone(&self) -> Self {
        Self::new(self.id.clone())
    }
}

impl<T> PartialEq for Tag<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Tag<T> {}

impl<T> fmt::Debug for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag<{}>({})", std::any::type_name::<T>(), self.id)
    }
}

impl<T> fmt::Display for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// How a tag obtains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagKind {
    /// Supplied externally or constructed from options, never derived.
    Simple,
    /// Derived from other tags by a pure function.
    Compute,
    /// Alias that redirects reads to another tag.
    Reference,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagKind::Simple => "simple",
            TagKind::Compute => "compute",
            TagKind::Reference => "reference",
        };
        f.write_str(name)
    }
}
