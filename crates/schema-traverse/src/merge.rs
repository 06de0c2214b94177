use crate::{Items, NodeId, Schema, SchemaGraph, SchemaObject};
use fxhash::FxHashMap;
use indexmap::IndexMap;
use serde_json::Value;

/// Recursively merge `source` into `target`, where the subschemas of both
/// are nodes of `graph`.
///
/// When both are schema objects, plain keywords merge with [`merge_values`].
/// A subschema slot (a `properties` or `patternProperties` entry, a single
/// `items`, `additionalItems` or `additionalProperties`) which holds object
/// schemas on both sides merges recursively: the `source` subschema is merged
/// into the `target` node. Any other subschema slot present in `source`,
/// such as a combinator or an `items` list, replaces that of `target`.
/// Otherwise `source` replaces `target` outright.
///
/// Merging terminates on cyclic subschemas: each pair of target and source
/// nodes is merged at most once.
pub fn merge(graph: &mut SchemaGraph, target: &mut Schema, source: Schema) {
    merge_owned(graph, target, source, |_| true)
}

/// Like [`merge`], but writes only into target subschemas for which `owned`
/// is true. Others are copied into new nodes of `graph`, and the copy is
/// merged into and linked in their place.
pub(crate) fn merge_owned<P>(
    graph: &mut SchemaGraph,
    target: &mut Schema,
    source: Schema,
    owned: P,
) where
    P: Fn(NodeId) -> bool,
{
    let mut merger = Merger {
        graph,
        owned,
        merged: FxHashMap::default(),
    };
    merger.merge(target, source);
}

struct Merger<'g, P> {
    graph: &'g mut SchemaGraph,
    owned: P,
    // (target, source) pairs which are merged or being merged,
    // and the node which holds their merge.
    merged: FxHashMap<(NodeId, NodeId), NodeId>,
}

impl<'g, P> Merger<'g, P>
where
    P: Fn(NodeId) -> bool,
{
    fn merge(&mut self, target: &mut Schema, source: Schema) {
        match (target, source) {
            (Schema::Object(target), Schema::Object(source)) => self.merge_objects(target, source),
            (target, source) => *target = source,
        }
    }

    fn merge_objects(&mut self, target: &mut SchemaObject, source: SchemaObject) {
        let SchemaObject {
            any_of,
            all_of,
            one_of,
            items,
            additional_items,
            properties,
            pattern_properties,
            additional_properties,
            keywords,
        } = source;

        replace_if_some(&mut target.any_of, any_of);
        replace_if_some(&mut target.all_of, all_of);
        replace_if_some(&mut target.one_of, one_of);

        target.items = match (target.items.take(), items) {
            (Some(Items::Single(existing)), Some(Items::Single(incoming))) => {
                Some(Items::Single(self.merge_node(existing, incoming)))
            }
            (_, Some(items)) => Some(items),
            (existing, None) => existing,
        };
        target.additional_items = self.merge_single(target.additional_items, additional_items);
        target.additional_properties =
            self.merge_single(target.additional_properties, additional_properties);

        self.merge_map(&mut target.properties, properties);
        self.merge_map(&mut target.pattern_properties, pattern_properties);

        for (keyword, value) in keywords {
            match target.keywords.get_mut(&keyword) {
                Some(existing) => merge_values(existing, value),
                None => {
                    target.keywords.insert(keyword, value);
                }
            }
        }
    }

    fn merge_single(&mut self, target: Option<NodeId>, source: Option<NodeId>) -> Option<NodeId> {
        match (target, source) {
            (Some(target), Some(source)) => Some(self.merge_node(target, source)),
            (target, None) => target,
            (None, source) => source,
        }
    }

    fn merge_map(
        &mut self,
        target: &mut Option<IndexMap<String, NodeId>>,
        source: Option<IndexMap<String, NodeId>>,
    ) {
        let Some(source) = source else { return };
        let target = target.get_or_insert_with(IndexMap::new);

        for (key, source) in source {
            let merged = match target.get(&key) {
                Some(existing) => self.merge_node(*existing, source),
                None => source,
            };
            target.insert(key, merged);
        }
    }

    /// Merge node `source` into node `target`, returning the node which now
    /// holds their merge. That's `source` itself unless both are objects.
    fn merge_node(&mut self, target: NodeId, source: NodeId) -> NodeId {
        if target == source {
            return target;
        }
        if let Some(merged) = self.merged.get(&(target, source)) {
            return *merged;
        }

        let source_schema = match (self.graph.get(target), self.graph.get(source)) {
            (Some(Schema::Object(_)), Some(source @ Schema::Object(_))) => source.clone(),
            _ => return source,
        };

        let into = if (self.owned)(target) {
            target
        } else {
            let copy = self.graph[target].clone();
            self.graph.insert(copy)
        };
        self.merged.insert((target, source), into);

        let mut schema = self.graph[into].clone();
        self.merge(&mut schema, source_schema);
        self.graph[into] = schema;

        into
    }
}

fn replace_if_some<T>(target: &mut Option<T>, source: Option<T>) {
    if source.is_some() {
        *target = source;
    }
}

/// Recursively merge JSON `source` into `target`.
/// Objects merge property-wise; any other `source` value wins.
pub fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (property, value) in source {
                match target.get_mut(&property) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target.insert(property, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Slot;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_merge_values() {
        let mut target = json!({
            "a": {"b": 1, "c": [1, 2, 3]},
            "d": "keep",
            "e": {"f": true},
        });
        merge_values(
            &mut target,
            json!({
                "a": {"c": [9], "x": null},
                "e": "replaced",
                "g": {"new": 1},
            }),
        );

        assert_eq!(
            target,
            json!({
                "a": {"b": 1, "c": [9], "x": null},
                "d": "keep",
                "e": "replaced",
                "g": {"new": 1},
            })
        );
    }

    #[test]
    fn test_merge_schemas() {
        let mut graph = SchemaGraph::new();
        let (a, b, c) = (graph.insert(true), graph.insert(false), graph.insert(true));

        let mut target = Schema::Object(
            SchemaObject {
                items: Some(Items::Single(a)),
                properties: Some([("a".to_string(), a), ("b".to_string(), b)].into_iter().collect()),
                ..Default::default()
            }
            .with("type", "object")
            .with("default", json!({"one": 1})),
        );
        let source = Schema::Object(
            SchemaObject {
                items: Some(Items::List(vec![b, c])),
                properties: Some([("b".to_string(), c)].into_iter().collect()),
                pattern_properties: Some([("^x".to_string(), a)].into_iter().collect()),
                ..Default::default()
            }
            .with("default", json!({"two": 2})),
        );
        merge(&mut graph, &mut target, source);

        let obj = target.as_object().unwrap();
        assert_eq!(obj.items, Some(Items::List(vec![b, c])));
        // Boolean subschemas are replaced by handle.
        assert_eq!(
            obj.properties.as_ref().unwrap().iter().collect::<Vec<_>>(),
            vec![(&"a".to_string(), &a), (&"b".to_string(), &c)],
        );
        assert_eq!(obj.pattern_properties.as_ref().unwrap()["^x"], a);
        assert_eq!(obj.get("type"), Some(&json!("object")));
        assert_eq!(obj.get("default"), Some(&json!({"one": 1, "two": 2})));

        // Booleans on either side are replaced outright.
        merge(&mut graph, &mut target, Schema::Bool(false));
        assert_eq!(target, Schema::Bool(false));

        let titled = Schema::Object(SchemaObject::new().with("title", "t"));
        merge(&mut graph, &mut target, titled.clone());
        assert_eq!(target, titled);
    }

    #[test]
    fn test_merge_nested_subschemas() {
        let mut graph = SchemaGraph::new();
        let target = graph
            .from_value(&json!({
                "properties": {"a": {"type": "string", "title": "a", "properties": {"deep": {"minimum": 1}}}},
                "items": {"type": "number"},
                "additionalProperties": {"type": "integer"},
            }))
            .unwrap();
        let source = graph
            .from_value(&json!({
                "properties": {
                    "a": {"description": "d", "properties": {"deep": {"maximum": 2}}},
                    "b": {"title": "b"},
                },
                "items": {"description": "i"},
                "additionalProperties": {"description": "ap"},
            }))
            .unwrap();
        let before = graph.len();

        let mut schema = graph[target].clone();
        let incoming = graph[source].clone();
        merge(&mut graph, &mut schema, incoming);
        graph[target] = schema;

        // Target subschemas were merged into in place.
        assert_eq!(graph.len(), before);
        assert_eq!(
            graph.to_value(target).unwrap(),
            json!({
                "items": {"type": "number", "description": "i"},
                "properties": {
                    "a": {
                        "properties": {"deep": {"minimum": 1, "maximum": 2}},
                        "type": "string",
                        "title": "a",
                        "description": "d",
                    },
                    "b": {"title": "b"},
                },
                "additionalProperties": {"type": "integer", "description": "ap"},
            })
        );
        // Source subschemas are unchanged.
        assert_eq!(
            graph.to_value(source).unwrap()["properties"]["a"],
            json!({"properties": {"deep": {"maximum": 2}}, "description": "d"}),
        );
    }

    #[test]
    fn test_merge_copies_unowned_subschemas() {
        let mut graph = SchemaGraph::new();
        let original = graph
            .from_value(&json!({"properties": {"a": {"type": "string"}}}))
            .unwrap();
        let original_a = graph.descend(original, &[Slot::prop("a")]).unwrap();
        let owned_from = graph.len();

        let incoming = graph.insert(SchemaObject::new().with("title", "a"));
        let mut schema = graph[original].clone();
        let source = Schema::Object(SchemaObject {
            properties: Some([("a".to_string(), incoming)].into_iter().collect()),
            ..Default::default()
        });
        merge_owned(&mut graph, &mut schema, source, |id| id.index() >= owned_from);

        // The original subschema was copied rather than written to.
        let merged_a = schema.as_object().unwrap().child(&Slot::prop("a")).unwrap();
        assert!(merged_a != original_a && merged_a != incoming);
        assert_eq!(
            graph[original_a],
            Schema::Object(SchemaObject::new().with("type", "string"))
        );
        assert_eq!(
            graph[merged_a],
            Schema::Object(SchemaObject::new().with("type", "string").with("title", "a"))
        );
    }

    #[test]
    fn test_merge_cyclic_subschemas() {
        let mut graph = SchemaGraph::new();
        let target = graph.from_value(&json!({"properties": {"next": {}}})).unwrap();
        let source = graph
            .from_value(&json!({"title": "s", "properties": {"next": {}}}))
            .unwrap();

        // Each schema's `next` property refers back to itself.
        for id in [target, source] {
            graph.object_mut(id).unwrap().set_child(&Slot::prop("next"), id);
        }

        let mut schema = graph[target].clone();
        let incoming = graph[source].clone();
        merge(&mut graph, &mut schema, incoming);
        graph[target] = schema;

        assert_eq!(graph.descend(target, &[Slot::prop("next")]), Some(target));
        assert_eq!(graph[target].as_object().unwrap().get("title"), Some(&json!("s")));
    }
}
