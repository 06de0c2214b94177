use crate::cycle::{BackEdge, Encounter, Tracker};
use crate::merge::merge_owned;
use crate::{Location, NodeId, Schema, SchemaGraph, TraverseOptions};

/// Visit describes the schema being transformed.
pub struct Visit<'v> {
    /// Graph being traversed. Transforms may insert new schemas into it,
    /// for example to add new subschemas to the schema they return.
    pub graph: &'v mut SchemaGraph,
    /// Node which the output of the transform will be written to.
    /// This is `origin` itself when traversing with `mutable`,
    /// and otherwise a copy of it.
    pub node: NodeId,
    /// Original node from which `node` was produced.
    pub origin: NodeId,
    /// True if a descendant of this schema references it, forming a cycle.
    pub is_cycle: bool,
    /// Location of this schema, relative to the traversal root.
    /// For a cycle back to a skipped root, this is the location of the back-reference.
    pub location: Location<'v>,
    /// Mutated counterpart of the schema which contains this one,
    /// or None at the root.
    pub parent: Option<NodeId>,
}

impl<'v> Visit<'v> {
    /// JSON-Path of this schema, such as `$.properties.foo.items[0]`.
    pub fn path(&self) -> String {
        self.location.to_string()
    }

    /// Current value of the parent schema, as mutated so far.
    pub fn parent_schema(&self) -> Option<&Schema> {
        self.parent.and_then(|parent| self.graph.get(parent))
    }
}

/// Traverse all subschemas of `root` within `graph`, calling `transform`
/// with each and replacing the schema with its output. Returns the NodeId
/// of the mutated root.
///
/// By default schemas are transformed depth-first, after their children.
/// Each reachable schema is transformed exactly once: a subschema which
/// references one of its ancestors is linked to the ancestor's mutated
/// counterpart rather than being traversed again, and a subschema shared
/// by several parents is traversed only on first encounter.
/// `$ref` keywords are not followed.
///
/// The first error returned by `transform` aborts the traversal.
///
/// # Graph growth
///
/// Without `mutable`, every traversed schema is copied into a new node of
/// `graph`, and nodes are never removed. Repeated traversals accumulate
/// copies, and an aborted traversal leaves behind the copies it made.
/// Use [`SchemaGraph::extract`] to copy just the result into a fresh graph.
///
/// # Recursion depth
///
/// Traversal recurses once per level of schema nesting and is bounded only
/// by the stack. An 8 MiB main-thread stack handles tens of thousands of
/// levels, while a spawned thread's default 2 MiB stack handles a few
/// thousand. Traverse deeper schemas on a thread built with a larger
/// stack size.
///
/// # Panics
///
/// If `root` is not a node of `graph`.
///
/// ```
/// use schema_traverse::{traverse, SchemaGraph, TraverseOptions};
/// use serde_json::json;
///
/// let mut graph = SchemaGraph::new();
/// let root = graph
///     .from_value(&json!({"properties": {"a": {}, "b": true}}))
///     .unwrap();
///
/// let mut paths = Vec::new();
/// let out = traverse(&mut graph, root, &TraverseOptions::default(), |schema, visit| {
///     paths.push(visit.path());
///     Ok::<_, std::convert::Infallible>(schema)
/// })
/// .unwrap();
///
/// assert_eq!(paths, vec!["$.properties.a", "$.properties.b", "$"]);
/// assert_ne!(out, root);
/// assert_eq!(graph.to_value(out).unwrap(), graph.to_value(root).unwrap());
/// ```
pub fn traverse<F, E>(
    graph: &mut SchemaGraph,
    root: NodeId,
    options: &TraverseOptions,
    transform: F,
) -> Result<NodeId, E>
where
    F: FnMut(Schema, Visit<'_>) -> Result<Schema, E>,
{
    let graph_len = graph.len();
    let mut traversal = Traversal {
        graph,
        options: *options,
        transform,
        tracker: Tracker::default(),
        owned_from: owned_from(graph_len, options),
        transforms: 0,
    };
    let result = traversal.visit(root, Location::Root, None)?;

    tracing::debug!(
        %root,
        %result,
        transforms = traversal.transforms,
        "completed schema traversal"
    );
    Ok(result)
}

struct Traversal<'g, F> {
    graph: &'g mut SchemaGraph,
    options: TraverseOptions,
    transform: F,
    tracker: Tracker,
    owned_from: Option<usize>,
    transforms: usize,
}

impl<'g, F, E> Traversal<'g, F>
where
    F: FnMut(Schema, Visit<'_>) -> Result<Schema, E>,
{
    fn visit(
        &mut self,
        origin: NodeId,
        location: Location<'_>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, E> {
        let skip = self.options.skip_first_mutation && self.tracker.depth() == 0;
        let mutated = enter_node(self.graph, origin, self.options.mutable);
        self.tracker.enter(origin, mutated);

        if self.options.bfs && !skip {
            self.apply(mutated, origin, false, location, parent)?;
        }

        for (slot, child) in self.graph[mutated].children() {
            let child_location = location.push(&slot);

            let link = match self.tracker.encounter(child) {
                Encounter::Unvisited => self.visit(child, child_location, Some(mutated))?,
                Encounter::Visited(link) => {
                    tracing::trace!(location = %child_location, %link, "linked shared schema");
                    link
                }
                Encounter::Ancestor(index) => {
                    match self
                        .tracker
                        .back_edge(index, self.options.skip_first_mutation)
                    {
                        BackEdge::Link(link) => {
                            tracing::trace!(location = %child_location, %link, "linked cycle");
                            link
                        }
                        BackEdge::TransformRoot(root) => {
                            self.apply(
                                root.mutated,
                                root.origin,
                                true,
                                child_location,
                                Some(mutated),
                            )?;
                            root.mutated
                        }
                    }
                }
            };
            self.graph[mutated].set_child(&slot, link);
        }

        let is_cycle = self.tracker.exit();

        if !self.options.bfs && !skip {
            self.apply(mutated, origin, is_cycle, location, parent)?;
        }
        Ok(mutated)
    }

    fn apply(
        &mut self,
        node: NodeId,
        origin: NodeId,
        is_cycle: bool,
        location: Location<'_>,
        parent: Option<NodeId>,
    ) -> Result<(), E> {
        let schema = self.graph[node].clone();
        let before = self.options.merge_not_mutate.then(|| schema.clone());

        let visit = Visit {
            graph: &mut *self.graph,
            node,
            origin,
            is_cycle,
            location,
            parent,
        };
        let out = (self.transform)(schema, visit)?;

        let settled = settle(self.graph, before, out, self.owned_from);
        self.graph[node] = settled;
        self.transforms += 1;
        Ok(())
    }
}

/// Returns the node into which the mutation of `origin` is written.
pub(crate) fn enter_node(graph: &mut SchemaGraph, origin: NodeId, mutable: bool) -> NodeId {
    if mutable {
        origin
    } else {
        let copy = graph[origin].clone();
        graph.insert(copy)
    }
}

/// Index of the first node which a traversal may write to, or None if it
/// may write to any node.
pub(crate) fn owned_from(graph_len: usize, options: &TraverseOptions) -> Option<usize> {
    (!options.mutable).then_some(graph_len)
}

/// Returns the schema to store for a transform output, merging it into
/// the schema as it was `before` the transform if one is provided.
/// Nodes before `owned_from` are copied rather than merged into.
pub(crate) fn settle(
    graph: &mut SchemaGraph,
    before: Option<Schema>,
    out: Schema,
    owned_from: Option<usize>,
) -> Schema {
    match before {
        Some(mut before) => {
            merge_owned(graph, &mut before, out, |id| {
                owned_from.map_or(true, |first| id.index() >= first)
            });
            before
        }
        None => out,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Slot;
    use serde_json::json;
    use tracing_test::traced_test;

    #[test]
    fn test_transform_error_aborts() {
        let mut graph = SchemaGraph::new();
        let root = graph
            .from_value(&json!({"anyOf": [{"title": "ok"}, {"title": "bad"}, {"title": "never"}]}))
            .unwrap();

        let mut seen = Vec::new();
        let err = traverse(
            &mut graph,
            root,
            &TraverseOptions::default(),
            |schema, visit| {
                let title = schema.as_object().and_then(|o| o.get("title")).cloned();
                seen.push(visit.path());

                if title == Some(json!("bad")) {
                    anyhow::bail!("refusing {}", visit.location);
                }
                Ok(schema)
            },
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "refusing $.anyOf[1]");
        assert_eq!(seen, vec!["$.anyOf[0]", "$.anyOf[1]"]);
    }

    #[test]
    fn test_visit_parent_schema() {
        let mut graph = SchemaGraph::new();
        let root = graph
            .from_value(&json!({"title": "root", "properties": {"a": {"title": "a"}}}))
            .unwrap();

        let mut parents = Vec::new();
        traverse(
            &mut graph,
            root,
            &TraverseOptions {
                bfs: true,
                ..Default::default()
            },
            |mut schema, visit| {
                let parent_title = visit
                    .parent_schema()
                    .and_then(Schema::as_object)
                    .and_then(|o| o.get("title"))
                    .cloned();
                parents.push(parent_title);

                if let Some(obj) = schema.as_object_mut() {
                    obj.set("title", "renamed");
                }
                Ok::<_, anyhow::Error>(schema)
            },
        )
        .unwrap();

        // In pre-order, the parent was already transformed when its child is visited.
        assert_eq!(parents, vec![None, Some(json!("renamed"))]);
        assert_eq!(
            graph.descend(root, &[Slot::prop("a")]).map(|a| graph[a].clone()),
            Some(Schema::Object(crate::SchemaObject::new().with("title", "a"))),
        );
    }

    #[traced_test]
    #[test]
    fn test_cycle_relinking_is_logged() {
        let mut graph = SchemaGraph::new();
        let root = graph.from_value(&json!({"properties": {"self": {}}})).unwrap();
        graph
            .object_mut(root)
            .unwrap()
            .set_child(&Slot::prop("self"), root);

        let out = traverse(
            &mut graph,
            root,
            &TraverseOptions::default(),
            |schema, _visit| Ok::<_, anyhow::Error>(schema),
        )
        .unwrap();

        assert_eq!(graph.descend(out, &[Slot::prop("self")]), Some(out));
        assert!(logs_contain("linked cycle"));
        assert!(logs_contain("completed schema traversal"));
    }
}
