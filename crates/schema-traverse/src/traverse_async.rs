use crate::cycle::{BackEdge, Encounter, Tracker};
use crate::traverse::{enter_node, owned_from, settle};
use crate::{NodeId, Schema, SchemaGraph, TraverseOptions};
use futures::future::{FutureExt, LocalBoxFuture};
use std::future::Future;

/// VisitInfo describes the schema being transformed by [`traverse_async`].
/// Unlike [`Visit`](crate::Visit) it's fully owned, so that it may be
/// held by the transform's future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitInfo {
    pub node: NodeId,
    pub origin: NodeId,
    pub is_cycle: bool,
    pub path: String,
    pub parent: Option<NodeId>,
}

/// Traverse all subschemas of `root` like [`traverse`](crate::traverse),
/// but with a `transform` which returns a Future.
///
/// Transforms are awaited one at a time, in the same order in which
/// the synchronous traversal would invoke them. Graph growth is the same
/// as that of the synchronous traversal.
///
/// Each level of schema nesting adds a boxed future, which is polled
/// recursively. As with [`traverse`](crate::traverse), an 8 MiB stack
/// handles tens of thousands of levels and a 2 MiB spawned thread or
/// runtime worker handles a few thousand.
pub async fn traverse_async<F, Fut, E>(
    graph: &mut SchemaGraph,
    root: NodeId,
    options: &TraverseOptions,
    transform: F,
) -> Result<NodeId, E>
where
    F: FnMut(Schema, VisitInfo) -> Fut,
    Fut: Future<Output = Result<Schema, E>>,
{
    let graph_len = graph.len();
    let mut traversal = AsyncTraversal {
        graph,
        options: *options,
        transform,
        tracker: Tracker::default(),
        owned_from: owned_from(graph_len, options),
        transforms: 0,
    };
    let result = traversal.visit(root, "$".to_string(), None).await?;

    tracing::debug!(
        %root,
        %result,
        transforms = traversal.transforms,
        "completed async schema traversal"
    );
    Ok(result)
}

struct AsyncTraversal<'g, F> {
    graph: &'g mut SchemaGraph,
    options: TraverseOptions,
    transform: F,
    tracker: Tracker,
    owned_from: Option<usize>,
    transforms: usize,
}

impl<'g, F, Fut, E> AsyncTraversal<'g, F>
where
    F: FnMut(Schema, VisitInfo) -> Fut,
    Fut: Future<Output = Result<Schema, E>>,
{
    fn visit<'s>(
        &'s mut self,
        origin: NodeId,
        path: String,
        parent: Option<NodeId>,
    ) -> LocalBoxFuture<'s, Result<NodeId, E>>
    where
        E: 's,
        Fut: 's,
    {
        async move {
            let skip = self.options.skip_first_mutation && self.tracker.depth() == 0;
            let mutated = enter_node(self.graph, origin, self.options.mutable);
            self.tracker.enter(origin, mutated);

            if self.options.bfs && !skip {
                self.apply(mutated, origin, false, path.clone(), parent)
                    .await?;
            }

            for (slot, child) in self.graph[mutated].children() {
                let child_path = format!("{path}{slot}");

                let link = match self.tracker.encounter(child) {
                    Encounter::Unvisited => self.visit(child, child_path, Some(mutated)).await?,
                    Encounter::Visited(link) => {
                        tracing::trace!(location = %child_path, %link, "linked shared schema");
                        link
                    }
                    Encounter::Ancestor(index) => {
                        match self
                            .tracker
                            .back_edge(index, self.options.skip_first_mutation)
                        {
                            BackEdge::Link(link) => {
                                tracing::trace!(location = %child_path, %link, "linked cycle");
                                link
                            }
                            BackEdge::TransformRoot(root) => {
                                self.apply(root.mutated, root.origin, true, child_path, Some(mutated))
                                    .await?;
                                root.mutated
                            }
                        }
                    }
                };
                self.graph[mutated].set_child(&slot, link);
            }

            let is_cycle = self.tracker.exit();

            if !self.options.bfs && !skip {
                self.apply(mutated, origin, is_cycle, path, parent).await?;
            }
            Ok::<_, E>(mutated)
        }
        .boxed_local()
    }

    async fn apply(
        &mut self,
        node: NodeId,
        origin: NodeId,
        is_cycle: bool,
        path: String,
        parent: Option<NodeId>,
    ) -> Result<(), E> {
        let schema = self.graph[node].clone();
        let before = self.options.merge_not_mutate.then(|| schema.clone());

        let info = VisitInfo {
            node,
            origin,
            is_cycle,
            path,
            parent,
        };
        let out = (self.transform)(schema, info).await?;

        let settled = settle(self.graph, before, out, self.owned_from);
        self.graph[node] = settled;
        self.transforms += 1;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{traverse, Slot};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fixture() -> (SchemaGraph, NodeId) {
        let mut graph = SchemaGraph::new();
        let root = graph
            .from_value(&json!({
                "title": "root",
                "properties": {
                    "foo": {"items": [{"type": "string"}, {"type": "number"}]},
                    "bar": {"anyOf": [true, {"additionalProperties": false}]},
                },
            }))
            .unwrap();

        // Close a cycle from `bar` back to the root.
        let bar = graph.descend(root, &[Slot::prop("bar")]).unwrap();
        graph.object_mut(bar).unwrap().any_of.as_mut().unwrap().push(root);

        (graph, root)
    }

    #[tokio::test]
    async fn test_matches_sync_traversal() {
        for bfs in [false, true] {
            for skip_first_mutation in [false, true] {
                let options = TraverseOptions {
                    bfs,
                    skip_first_mutation,
                    ..Default::default()
                };

                let (mut sync_graph, root) = fixture();
                let mut sync_calls = Vec::new();
                let sync_out = traverse(&mut sync_graph, root, &options, |schema, visit| {
                    sync_calls.push(VisitInfo {
                        node: visit.node,
                        origin: visit.origin,
                        is_cycle: visit.is_cycle,
                        path: visit.path(),
                        parent: visit.parent,
                    });
                    Ok::<_, anyhow::Error>(schema)
                })
                .unwrap();

                let (mut async_graph, root) = fixture();
                let mut async_calls = Vec::new();
                let async_out = traverse_async(&mut async_graph, root, &options, |schema, info| {
                    async_calls.push(info);
                    async move {
                        tokio::task::yield_now().await;
                        Ok::<_, anyhow::Error>(schema)
                    }
                })
                .await
                .unwrap();

                assert_eq!(sync_calls, async_calls);
                assert_eq!(sync_out, async_out);
                assert_eq!(sync_graph.len(), async_graph.len());
            }
        }
    }

    #[tokio::test]
    async fn test_async_transform_and_error() {
        let (mut graph, root) = fixture();

        let out = traverse_async(
            &mut graph,
            root,
            &TraverseOptions {
                mutable: true,
                merge_not_mutate: true,
                ..Default::default()
            },
            |_schema, info| async move {
                let stamp = crate::SchemaObject::new().with("$comment", info.path);
                Ok::<_, anyhow::Error>(Schema::Object(stamp))
            },
        )
        .await
        .unwrap();

        assert_eq!(out, root);
        let foo_0 = graph
            .descend(root, &[Slot::prop("foo"), Slot::item(0)])
            .unwrap();
        let obj = graph[foo_0].as_object().unwrap();
        assert_eq!(obj.get("type"), Some(&json!("string")));
        assert_eq!(obj.get("$comment"), Some(&json!("$.properties.foo.items[0]")));

        let err = traverse_async(
            &mut graph,
            root,
            &TraverseOptions::default(),
            |_schema, info| async move {
                Err::<Schema, _>(anyhow::anyhow!("failed at {}", info.path))
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "failed at $.properties.foo.items[0]");
    }
}
