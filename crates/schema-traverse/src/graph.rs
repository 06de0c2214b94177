use crate::{Keyword, Location, Shape, Slot};
use indexmap::IndexMap;
use serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("expected a schema (an object or a boolean)")]
    ExpectedSchema,
    #[error("expected an array of schemas")]
    ExpectedArrayOfSchemas,
    #[error("expected an object of schemas")]
    ExpectedObjectOfSchemas,
    #[error("expected a schema or array of schemas")]
    ExpectedSchemaOrArrayOfSchemas,
    #[error("node {0} is not part of this graph")]
    UnknownNode(NodeId),
    #[error("schema at '{location}' closes a reference cycle, which JSON cannot represent")]
    Cycle { location: String },

    #[error("at schema '{location}': {detail}")]
    AtSchema {
        #[source]
        detail: Box<Error>,
        location: String,
    },
    #[error("at keyword '{keyword}' of schema '{location}': {detail}")]
    AtKeyword {
        #[source]
        detail: Box<Error>,
        location: String,
        keyword: Keyword,
    },
}
use Error::*;

/// NodeId is an opaque handle to a Schema within a SchemaGraph.
/// Handle equality is the identity of a schema: two handles may refer
/// to structurally identical schemas and still be distinct nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Schema is a single JSON-Schema node: either a boolean schema,
/// which matches everything (`true`) or nothing (`false`),
/// or an object of keywords.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Bool(bool),
    Object(SchemaObject),
}

/// Items is the value of the `items` keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    Single(NodeId),
    List(Vec<NodeId>),
}

/// SchemaObject is a schema object. Keywords which hold subschemas are
/// typed fields referencing other nodes of the graph, while every other
/// keyword ("type", "title", "$ref", "required", ...) is held as a plain value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaObject {
    pub any_of: Option<Vec<NodeId>>,
    pub all_of: Option<Vec<NodeId>>,
    pub one_of: Option<Vec<NodeId>>,
    pub items: Option<Items>,
    pub additional_items: Option<NodeId>,
    pub properties: Option<IndexMap<String, NodeId>>,
    pub pattern_properties: Option<IndexMap<String, NodeId>>,
    pub additional_properties: Option<NodeId>,
    pub keywords: serde_json::Map<String, Value>,
}

impl SchemaObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this SchemaObject with `keyword` set to `value`.
    pub fn with(mut self, keyword: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(keyword.into(), value.into());
        self
    }

    pub fn get(&self, keyword: &str) -> Option<&Value> {
        self.keywords.get(keyword)
    }

    pub fn set(&mut self, keyword: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.keywords.insert(keyword.into(), value.into())
    }

    pub fn remove(&mut self, keyword: &str) -> Option<Value> {
        self.keywords.remove(keyword)
    }

    /// Returns true if any of `anyOf`, `allOf`, or `oneOf` is present.
    pub fn has_combinator(&self) -> bool {
        self.any_of.is_some() || self.all_of.is_some() || self.one_of.is_some()
    }

    /// Child subschemas which a traversal descends into, in traversal order.
    ///
    /// If any combinator is present then only combinators are traversed,
    /// and the `items` / `properties` family of keywords is not.
    /// `additionalItems` is traversed only if `items` isn't a single schema.
    pub fn children(&self) -> Vec<(Slot, NodeId)> {
        self.collect_slots(true)
    }

    /// Every subschema referenced by this SchemaObject, regardless of
    /// whether a traversal would descend into it.
    pub fn references(&self) -> Vec<(Slot, NodeId)> {
        self.collect_slots(false)
    }

    fn collect_slots(&self, dispatch: bool) -> Vec<(Slot, NodeId)> {
        let combinators_only = dispatch && self.has_combinator();
        let single_items = matches!(self.items, Some(Items::Single(_)));
        let mut out = Vec::new();

        for keyword in Keyword::ALL {
            if combinators_only && !keyword.is_combinator() {
                continue;
            }
            // `additionalItems` has no effect alongside a single `items` schema.
            if dispatch && single_items && keyword == Keyword::AdditionalItems {
                continue;
            }

            let single = self
                .child(&Slot::Keyword(keyword))
                .map(|id| (Slot::Keyword(keyword), id));
            let listed = self
                .list(keyword)
                .into_iter()
                .flatten()
                .enumerate()
                .map(|(index, id)| (Slot::Index(keyword, index), *id));
            let mapped = self
                .map(keyword)
                .into_iter()
                .flatten()
                .map(|(key, id)| (Slot::Entry(keyword, key.clone()), *id));

            match keyword.shape() {
                Shape::Single => out.extend(single),
                Shape::List => out.extend(listed),
                Shape::Map => out.extend(mapped),
                Shape::SingleOrList => {
                    out.extend(single);
                    out.extend(listed);
                }
            }
        }
        out
    }

    fn list(&self, keyword: Keyword) -> Option<&Vec<NodeId>> {
        match (keyword, &self.items) {
            (Keyword::AnyOf, _) => self.any_of.as_ref(),
            (Keyword::AllOf, _) => self.all_of.as_ref(),
            (Keyword::OneOf, _) => self.one_of.as_ref(),
            (Keyword::Items, Some(Items::List(ids))) => Some(ids),
            _ => None,
        }
    }

    fn list_mut(&mut self, keyword: Keyword) -> Option<&mut Vec<NodeId>> {
        match (keyword, &mut self.items) {
            (Keyword::AnyOf, _) => self.any_of.as_mut(),
            (Keyword::AllOf, _) => self.all_of.as_mut(),
            (Keyword::OneOf, _) => self.one_of.as_mut(),
            (Keyword::Items, Some(Items::List(ids))) => Some(ids),
            _ => None,
        }
    }

    fn map(&self, keyword: Keyword) -> Option<&IndexMap<String, NodeId>> {
        match keyword {
            Keyword::Properties => self.properties.as_ref(),
            Keyword::PatternProperties => self.pattern_properties.as_ref(),
            _ => None,
        }
    }

    fn map_mut(&mut self, keyword: Keyword) -> Option<&mut IndexMap<String, NodeId>> {
        match keyword {
            Keyword::Properties => self.properties.as_mut(),
            Keyword::PatternProperties => self.pattern_properties.as_mut(),
            _ => None,
        }
    }

    fn single_mut(&mut self, keyword: Keyword) -> Option<&mut NodeId> {
        match (keyword, &mut self.items) {
            (Keyword::Items, Some(Items::Single(id))) => Some(id),
            (Keyword::AdditionalItems, _) => self.additional_items.as_mut(),
            (Keyword::AdditionalProperties, _) => self.additional_properties.as_mut(),
            _ => None,
        }
    }

    /// Returns the subschema held at `slot`, if there is one.
    pub fn child(&self, slot: &Slot) -> Option<NodeId> {
        match slot {
            Slot::Keyword(Keyword::Items) => match &self.items {
                Some(Items::Single(id)) => Some(*id),
                _ => None,
            },
            Slot::Keyword(Keyword::AdditionalItems) => self.additional_items,
            Slot::Keyword(Keyword::AdditionalProperties) => self.additional_properties,
            Slot::Keyword(_) => None,
            Slot::Index(keyword, index) => self.list(*keyword)?.get(*index).copied(),
            Slot::Entry(keyword, key) => self.map(*keyword)?.get(key).copied(),
        }
    }

    /// Points an existing `slot` at `id`, returning false if this
    /// SchemaObject has no such slot.
    pub fn set_child(&mut self, slot: &Slot, id: NodeId) -> bool {
        let target = match slot {
            Slot::Keyword(keyword) => self.single_mut(*keyword),
            Slot::Index(keyword, index) => self
                .list_mut(*keyword)
                .and_then(|ids| ids.get_mut(*index)),
            Slot::Entry(keyword, key) => self.map_mut(*keyword).and_then(|m| m.get_mut(key)),
        };
        match target {
            Some(target) => {
                *target = id;
                true
            }
            None => false,
        }
    }
}

impl Schema {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Schema::Bool(b) => Some(*b),
            Schema::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&SchemaObject> {
        match self {
            Schema::Object(obj) => Some(obj),
            Schema::Bool(_) => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut SchemaObject> {
        match self {
            Schema::Object(obj) => Some(obj),
            Schema::Bool(_) => None,
        }
    }

    /// Child subschemas which a traversal descends into. Boolean schemas have none.
    pub fn children(&self) -> Vec<(Slot, NodeId)> {
        self.as_object()
            .map(SchemaObject::children)
            .unwrap_or_default()
    }

    pub fn references(&self) -> Vec<(Slot, NodeId)> {
        self.as_object()
            .map(SchemaObject::references)
            .unwrap_or_default()
    }

    pub fn child(&self, slot: &Slot) -> Option<NodeId> {
        self.as_object().and_then(|obj| obj.child(slot))
    }

    pub fn set_child(&mut self, slot: &Slot, id: NodeId) -> bool {
        match self {
            Schema::Object(obj) => obj.set_child(slot, id),
            Schema::Bool(_) => false,
        }
    }
}

impl From<bool> for Schema {
    fn from(b: bool) -> Self {
        Schema::Bool(b)
    }
}

impl From<SchemaObject> for Schema {
    fn from(obj: SchemaObject) -> Self {
        Schema::Object(obj)
    }
}

/// SchemaGraph is an arena of Schema nodes, which may reference one another
/// in arbitrary (including cyclic) topologies.
#[derive(Debug, Clone, Default)]
pub struct SchemaGraph {
    nodes: Vec<Schema>,
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a Schema to the graph, returning its new and distinct NodeId.
    pub fn insert(&mut self, schema: impl Into<Schema>) -> NodeId {
        self.nodes.push(schema.into());
        NodeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> Option<&Schema> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Schema> {
        self.nodes.get_mut(id.0)
    }

    /// Shortcut for mutable access to the SchemaObject of `id`.
    pub fn object_mut(&mut self, id: NodeId) -> Option<&mut SchemaObject> {
        self.get_mut(id).and_then(Schema::as_object_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Schema)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, schema)| (NodeId(index), schema))
    }

    /// Follow `slots` from `root`, returning the node at their end.
    pub fn descend(&self, root: NodeId, slots: &[Slot]) -> Option<NodeId> {
        slots
            .iter()
            .try_fold(root, |id, slot| self.get(id)?.child(slot))
    }

    /// All nodes referenced directly or transitively from `root`
    /// (including `root` itself), in order of discovery.
    /// Every referencing keyword is followed, not only those a traversal descends into.
    pub fn reachable(&self, root: NodeId) -> Vec<NodeId> {
        let mut seen = fxhash::FxHashSet::default();
        let mut stack = vec![root];
        let mut out = Vec::new();

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);

            if let Some(schema) = self.get(id) {
                // Push in reverse, so that children pop in document order.
                stack.extend(schema.references().into_iter().rev().map(|(_, id)| id));
            }
        }
        out
    }

    /// Copy the nodes reachable from `root` into a new SchemaGraph,
    /// returning it with the NodeId of `root` within it. Shared and cyclic
    /// references are preserved. Use it to compact a graph which has
    /// accumulated copies from immutable traversals.
    pub fn extract(&self, root: NodeId) -> Result<(SchemaGraph, NodeId), Error> {
        if self.get(root).is_none() {
            return Err(UnknownNode(root));
        }
        let ids = self.reachable(root);
        let remap: fxhash::FxHashMap<NodeId, NodeId> = ids
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, NodeId(index)))
            .collect();

        let mut out = SchemaGraph::new();
        for id in &ids {
            let mut schema = self[*id].clone();
            for (slot, child) in schema.references() {
                if let Some(child) = remap.get(&child) {
                    schema.set_child(&slot, *child);
                }
            }
            out.insert(schema);
        }
        Ok((out, NodeId(0)))
    }

    /// Build nodes from a JSON document, returning the NodeId of its root.
    /// Each boolean or object found at a subschema position becomes its own node.
    pub fn from_value(&mut self, value: &Value) -> Result<NodeId, Error> {
        self.build(value, Location::Root)
    }

    fn build(&mut self, value: &Value, loc: Location<'_>) -> Result<NodeId, Error> {
        let map = match value {
            Value::Bool(b) => return Ok(self.insert(Schema::Bool(*b))),
            Value::Object(map) => map,
            _ => {
                return Err(AtSchema {
                    detail: Box::new(ExpectedSchema),
                    location: loc.to_string(),
                })
            }
        };

        let mut obj = SchemaObject::default();
        for (property, value) in map {
            match Keyword::from_keyword(property) {
                Some(keyword) => self.build_keyword(&mut obj, keyword, value, loc)?,
                None => {
                    obj.keywords.insert(property.clone(), value.clone());
                }
            }
        }
        Ok(self.insert(Schema::Object(obj)))
    }

    fn build_keyword(
        &mut self,
        obj: &mut SchemaObject,
        keyword: Keyword,
        value: &Value,
        loc: Location<'_>,
    ) -> Result<(), Error> {
        let is_schema = matches!(value, Value::Bool(_) | Value::Object(_));

        match (keyword.shape(), value) {
            (Shape::List | Shape::SingleOrList, Value::Array(arr)) => {
                let ids = self.build_list(keyword, arr, loc)?;
                match keyword {
                    Keyword::AnyOf => obj.any_of = Some(ids),
                    Keyword::AllOf => obj.all_of = Some(ids),
                    Keyword::OneOf => obj.one_of = Some(ids),
                    _ => obj.items = Some(Items::List(ids)),
                }
            }
            (Shape::Single | Shape::SingleOrList, _) if is_schema => {
                let id = self.build_single(keyword, value, loc)?;
                match keyword {
                    Keyword::Items => obj.items = Some(Items::Single(id)),
                    Keyword::AdditionalItems => obj.additional_items = Some(id),
                    _ => obj.additional_properties = Some(id),
                }
            }
            (Shape::Map, Value::Object(map)) => {
                let mut entries = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    let slot = Slot::Entry(keyword, key.clone());
                    entries.insert(key.clone(), self.build(value, loc.push(&slot))?);
                }
                match keyword {
                    Keyword::Properties => obj.properties = Some(entries),
                    _ => obj.pattern_properties = Some(entries),
                }
            }
            (shape, _) => {
                let detail = match shape {
                    Shape::Single => ExpectedSchema,
                    Shape::List => ExpectedArrayOfSchemas,
                    Shape::Map => ExpectedObjectOfSchemas,
                    Shape::SingleOrList => ExpectedSchemaOrArrayOfSchemas,
                };
                return Err(AtKeyword {
                    detail: Box::new(detail),
                    location: loc.to_string(),
                    keyword,
                });
            }
        }
        Ok(())
    }

    fn build_list(
        &mut self,
        keyword: Keyword,
        arr: &[Value],
        loc: Location<'_>,
    ) -> Result<Vec<NodeId>, Error> {
        let mut ids = Vec::with_capacity(arr.len());
        for (index, value) in arr.iter().enumerate() {
            let slot = Slot::Index(keyword, index);
            ids.push(self.build(value, loc.push(&slot))?);
        }
        Ok(ids)
    }

    fn build_single(
        &mut self,
        keyword: Keyword,
        value: &Value,
        loc: Location<'_>,
    ) -> Result<NodeId, Error> {
        let slot = Slot::Keyword(keyword);
        self.build(value, loc.push(&slot))
    }

    /// Render the node `id` and its subschemas as a JSON document.
    /// Fails if a reference cycle is reachable from `id`.
    /// Shared (acyclic) references are rendered once per occurrence.
    pub fn to_value(&self, id: NodeId) -> Result<Value, Error> {
        self.render(id, Location::Root, &mut Vec::new())
    }

    fn render(
        &self,
        id: NodeId,
        loc: Location<'_>,
        stack: &mut Vec<NodeId>,
    ) -> Result<Value, Error> {
        if stack.contains(&id) {
            return Err(Cycle {
                location: loc.to_string(),
            });
        }
        let obj = match self.get(id).ok_or(UnknownNode(id))? {
            Schema::Bool(b) => return Ok(Value::Bool(*b)),
            Schema::Object(obj) => obj,
        };
        stack.push(id);

        let mut out = obj.keywords.clone();

        for (keyword, ids) in [
            (Keyword::AnyOf, &obj.any_of),
            (Keyword::AllOf, &obj.all_of),
            (Keyword::OneOf, &obj.one_of),
        ] {
            if let Some(ids) = ids {
                out.insert(keyword.to_string(), self.render_list(keyword, ids, loc, stack)?);
            }
        }
        match &obj.items {
            Some(Items::Single(child)) => {
                let v = self.render_single(Keyword::Items, *child, loc, stack)?;
                out.insert(Keyword::Items.to_string(), v);
            }
            Some(Items::List(ids)) => {
                let v = self.render_list(Keyword::Items, ids, loc, stack)?;
                out.insert(Keyword::Items.to_string(), v);
            }
            None => (),
        }
        if let Some(child) = obj.additional_items {
            let v = self.render_single(Keyword::AdditionalItems, child, loc, stack)?;
            out.insert(Keyword::AdditionalItems.to_string(), v);
        }
        for (keyword, entries) in [
            (Keyword::Properties, &obj.properties),
            (Keyword::PatternProperties, &obj.pattern_properties),
        ] {
            let Some(entries) = entries else { continue };

            let mut m = serde_json::Map::with_capacity(entries.len());
            for (key, child) in entries {
                let slot = Slot::Entry(keyword, key.clone());
                m.insert(key.clone(), self.render(*child, loc.push(&slot), stack)?);
            }
            out.insert(keyword.to_string(), Value::Object(m));
        }
        if let Some(child) = obj.additional_properties {
            let v = self.render_single(Keyword::AdditionalProperties, child, loc, stack)?;
            out.insert(Keyword::AdditionalProperties.to_string(), v);
        }

        stack.pop();
        Ok(Value::Object(out))
    }

    fn render_list(
        &self,
        keyword: Keyword,
        ids: &[NodeId],
        loc: Location<'_>,
        stack: &mut Vec<NodeId>,
    ) -> Result<Value, Error> {
        let mut arr = Vec::with_capacity(ids.len());
        for (index, child) in ids.iter().enumerate() {
            let slot = Slot::Index(keyword, index);
            arr.push(self.render(*child, loc.push(&slot), stack)?);
        }
        Ok(Value::Array(arr))
    }

    fn render_single(
        &self,
        keyword: Keyword,
        child: NodeId,
        loc: Location<'_>,
        stack: &mut Vec<NodeId>,
    ) -> Result<Value, Error> {
        let slot = Slot::Keyword(keyword);
        self.render(child, loc.push(&slot), stack)
    }
}

impl std::ops::Index<NodeId> for SchemaGraph {
    type Output = Schema;

    fn index(&self, id: NodeId) -> &Schema {
        &self.nodes[id.0]
    }
}

impl std::ops::IndexMut<NodeId> for SchemaGraph {
    fn index_mut(&mut self, id: NodeId) -> &mut Schema {
        &mut self.nodes[id.0]
    }
}
