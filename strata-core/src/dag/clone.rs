//! Graph Cloning
//!
//! Deep copies of a connected subgraph, used to give each parallel chain
//! its own graph.
//!
//! # How Cloning Works
//!
//! Starting from any node, the connected subgraph is collected by walking
//! both parent and child edges. Its nodes are then cloned parents first, so
//! a clone's parent slots always point at cloned parents.
//!
//! A [`CloneMap`] from source id to clone handle guarantees each node is
//! cloned exactly once however many paths reach it. The map also lets moves
//! and proposals re-target their node handles onto the copy.
//!
//! Both walks use explicit stacks, so graph depth is bounded by memory
//! rather than by the call stack.

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tracing::debug;

use super::{Dag, NodeId, NodeRef};
use crate::error::{DagError, Result};

/// Source node to clone, for one cloning pass.
pub type CloneMap = IndexMap<NodeId, NodeRef>;

impl Dag {
    /// Clone the connected subgraph containing `root` into `target`.
    ///
    /// Nodes already present in `map` are reused and not walked through.
    /// Returns the id of `root`'s clone.
    pub fn clone_dag(&self, root: NodeId, target: &mut Dag, map: &mut CloneMap) -> Result<NodeId> {
        if let Some(clone) = map.get(&root) {
            return Ok(clone.id());
        }

        let mut component = IndexSet::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if map.contains_key(&current) || !component.insert(current) {
                continue;
            }
            let node = self.node(current)?;
            stack.extend(node.parents());
            stack.extend(node.children());
        }

        for &start in &component {
            let mut stack = vec![(start, false)];
            while let Some((current, expanded)) = stack.pop() {
                if map.contains_key(&current) {
                    continue;
                }
                if expanded {
                    self.clone_node(current, target, map)?;
                    continue;
                }
                stack.push((current, true));
                for parent in self.node(current)?.parents() {
                    if !map.contains_key(&parent) {
                        stack.push((parent, false));
                    }
                }
            }
        }

        map.get(&root)
            .map(NodeRef::id)
            .ok_or(DagError::UnknownNode(root))
    }

    /// Clone one node whose parents are all cloned already.
    fn clone_node(&self, id: NodeId, target: &mut Dag, map: &mut CloneMap) -> Result<()> {
        let node = self.node(id)?;
        let parent_ids = node
            .parents()
            .map(|parent| {
                map.get(&parent)
                    .map(NodeRef::id)
                    .ok_or(DagError::UnknownNode(parent))
            })
            .collect::<Result<SmallVec<[NodeId; 4]>>>()?;
        let handles = parent_ids
            .iter()
            .map(|&parent| target.retain(parent))
            .collect::<Result<SmallVec<[NodeRef; 4]>>>()?;

        let clone = target.insert(node.duplicate(handles));
        target.link_children(clone.id(), &parent_ids)?;
        map.insert(id, clone);
        Ok(())
    }

    /// Clone the whole graph, including disconnected components.
    ///
    /// The map holds one handle per clone; dropping it releases them.
    pub fn clone_graph(&self) -> Result<(Dag, CloneMap)> {
        let mut target = Dag::new();
        target.prior_only = self.prior_only;
        let mut map = CloneMap::with_capacity(self.len());
        for id in self.ids() {
            self.clone_dag(id, &mut target, &mut map)?;
        }
        debug!(nodes = target.len(), edges = target.edge_count(), "cloned graph");
        Ok((target, map))
    }
}
