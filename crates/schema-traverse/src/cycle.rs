use crate::NodeId;
use fxhash::FxHashMap;

/// Frame is an ancestor of the node currently being traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    pub origin: NodeId,
    pub mutated: NodeId,
    /// Set when a descendant of this frame was found to reference it.
    pub cycled: bool,
}

/// Encounter classifies a child node which is about to be descended into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Encounter {
    /// The node hasn't been seen, and must be traversed.
    Unvisited,
    /// The node is the ancestor at this depth of the ancestor chain.
    Ancestor(usize),
    /// The node was fully traversed through another path,
    /// and was mutated into this node.
    Visited(NodeId),
}

/// BackEdge is the resolution of a child which references an ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BackEdge {
    /// Link the child to this mutated ancestor.
    Link(NodeId),
    /// The ancestor is the root, which has skipped its transform and
    /// must be transformed now for this occurrence before being linked.
    TransformRoot(Frame),
}

/// Tracker maintains the chain of ancestors being visited and the mapping
/// of original nodes to their mutated counterparts, for one traversal.
#[derive(Debug, Default)]
pub(crate) struct Tracker {
    chain: Vec<Frame>,
    mutated: FxHashMap<NodeId, NodeId>,
    root_transformed: bool,
}

impl Tracker {
    pub fn depth(&self) -> usize {
        self.chain.len()
    }

    pub fn encounter(&self, id: NodeId) -> Encounter {
        // An ancestor may be referenced by its original node or,
        // if a transform linked to it, by its mutated counterpart.
        if let Some(index) = self
            .chain
            .iter()
            .position(|frame| frame.origin == id || frame.mutated == id)
        {
            Encounter::Ancestor(index)
        } else if let Some(mutated) = self.mutated.get(&id) {
            Encounter::Visited(*mutated)
        } else {
            Encounter::Unvisited
        }
    }

    pub fn enter(&mut self, origin: NodeId, mutated: NodeId) {
        self.mutated.insert(origin, mutated);
        self.mutated.insert(mutated, mutated);
        self.chain.push(Frame {
            origin,
            mutated,
            cycled: false,
        });
    }

    /// Pop the current frame, returning whether it was found to be the target of a cycle.
    pub fn exit(&mut self) -> bool {
        self.chain.pop().map(|frame| frame.cycled).unwrap_or_default()
    }

    /// Resolve a back-edge from the current node to the ancestor at `index`.
    pub fn back_edge(&mut self, index: usize, skip_first_mutation: bool) -> BackEdge {
        let frame = &mut self.chain[index];

        if index == 0 && skip_first_mutation && !self.root_transformed {
            self.root_transformed = true;
            BackEdge::TransformRoot(*frame)
        } else {
            frame.cycled = true;
            BackEdge::Link(frame.mutated)
        }
    }
}
