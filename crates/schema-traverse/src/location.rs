use crate::Keyword;
use std::fmt::{self, Write};

/// Slot is the position of a child subschema within its parent schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    /// A single subschema held directly by the keyword,
    /// as with `additionalProperties` or single-schema `items`.
    Keyword(Keyword),
    /// An element of an ordered list of subschemas, as with `anyOf` or `items`.
    Index(Keyword, usize),
    /// A named entry of a map of subschemas, as with `properties`.
    Entry(Keyword, String),
}

impl Slot {
    pub fn prop(name: impl Into<String>) -> Self {
        Slot::Entry(Keyword::Properties, name.into())
    }
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Slot::Entry(Keyword::PatternProperties, pattern.into())
    }
    pub fn additional_properties() -> Self {
        Slot::Keyword(Keyword::AdditionalProperties)
    }
    pub fn items() -> Self {
        Slot::Keyword(Keyword::Items)
    }
    pub fn item(index: usize) -> Self {
        Slot::Index(Keyword::Items, index)
    }
    pub fn additional_items() -> Self {
        Slot::Keyword(Keyword::AdditionalItems)
    }
    pub fn any_of(index: usize) -> Self {
        Slot::Index(Keyword::AnyOf, index)
    }
    pub fn all_of(index: usize) -> Self {
        Slot::Index(Keyword::AllOf, index)
    }
    pub fn one_of(index: usize) -> Self {
        Slot::Index(Keyword::OneOf, index)
    }
}

/// Slot displays as a JSON-Path segment, such as `.properties.foo` or `.anyOf[2]`.
/// Map keys are not escaped.
impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Keyword(kw) => write!(f, ".{kw}"),
            Slot::Index(kw, index) => write!(f, ".{kw}[{index}]"),
            Slot::Entry(kw, key) => write!(f, ".{kw}.{key}"),
        }
    }
}

/// `Location` of a subschema, relative to the root of a traversal.
/// It's a linked list of borrowed slots which costs nothing to extend
/// as the traversal descends.
///
/// ```
/// use schema_traverse::{Location, Slot};
///
/// let (foo, first) = (Slot::prop("foo"), Slot::item(0));
///
/// let l0 = Location::Root;
/// let l1 = l0.push(&foo);
/// let l2 = l1.push(&first);
///
/// assert_eq!("$.properties.foo.items[0]", l2.to_string());
/// assert_eq!(2, l2.depth());
/// ```
#[derive(Copy, Clone)]
pub enum Location<'a> {
    Root,
    Child(LocatedSlot<'a>),
}

/// `LocatedSlot` is a slot located within a schema graph.
#[derive(Copy, Clone)]
pub struct LocatedSlot<'a> {
    pub parent: &'a Location<'a>,
    pub slot: &'a Slot,
}

impl<'a> Location<'a> {
    /// Returns a new Location that extends this one with the given slot.
    pub fn push(&'a self, slot: &'a Slot) -> Location<'a> {
        Location::Child(LocatedSlot { parent: self, slot })
    }

    /// Number of slots between the root and this Location.
    pub fn depth(&self) -> usize {
        self.fold(0, |loc, depth| match loc {
            Location::Root => depth,
            Location::Child(_) => depth + 1,
        })
    }

    /// The final slot of this Location, or None at the root.
    pub fn slot(&self) -> Option<&'a Slot> {
        match self {
            Location::Root => None,
            Location::Child(LocatedSlot { slot, .. }) => Some(*slot),
        }
    }

    /// Folds over each Location from the root through to this one,
    /// so the location that's passed is the one that will be visited last.
    pub fn fold<T, F>(&self, initial: T, mut fun: F) -> T
    where
        F: FnMut(Location<'a>, T) -> T,
    {
        self.fold_inner(initial, &mut fun)
    }

    fn fold_inner<T, F>(&self, initial: T, fun: &mut F) -> T
    where
        F: FnMut(Location<'a>, T) -> T,
    {
        let acc = match self {
            Location::Root => initial,
            Location::Child(LocatedSlot { parent, .. }) => parent.fold_inner(initial, fun),
        };
        fun(*self, acc)
    }
}

impl<'a> fmt::Display for Location<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fold(Ok(()), |loc, result: fmt::Result| {
            result.and_then(|_| match loc {
                Location::Root => f.write_char('$'),
                Location::Child(LocatedSlot { slot, .. }) => write!(f, "{slot}"),
            })
        })
    }
}

impl<'a> fmt::Debug for Location<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
