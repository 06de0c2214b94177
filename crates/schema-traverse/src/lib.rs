//! schema-traverse visits every subschema of a JSON-Schema graph,
//! applying a transform to each and producing a mutated graph which keeps
//! the reference topology (including cycles) of the original.
//!
//! Schemas are nodes of a [`SchemaGraph`] arena, addressed by [`NodeId`].
//! Build a graph from a JSON document with [`SchemaGraph::from_value`],
//! or assemble nodes directly to express shared and cyclic references.
//! Then call [`traverse`] (or [`traverse_async`]) with [`TraverseOptions`].

pub mod keywords;

mod cycle;
mod graph;
mod location;
mod merge;
mod options;
mod traverse;
mod traverse_async;

pub use graph::{Error, Items, NodeId, Schema, SchemaGraph, SchemaObject};
pub use keywords::{Keyword, Shape};
pub use location::{LocatedSlot, Location, Slot};
pub use merge::{merge, merge_values};
pub use options::TraverseOptions;
pub use traverse::{traverse, Visit};
pub use traverse_async::{traverse_async, VisitInfo};
