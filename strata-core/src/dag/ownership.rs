//! Node Ownership
//!
//! Every node owns a reference counter. A [`NodeRef`] is a counted handle to
//! a node: creating or cloning one increments the node's counter, dropping
//! it decrements the counter.
//!
//! # Who Holds References
//!
//! - Parent slots. A child owns one `NodeRef` per parent slot, so a parent
//!   cannot be destroyed while a child still reads from it.
//! - Proposals and moves, for the nodes they mutate.
//! - Model-construction code, for the variables it names.
//!
//! Children are never counted. The back-edge from parent to child is a plain
//! [`NodeId`] used only for propagation.
//!
//! The counter lives with the node rather than in a global table keyed by
//! address, so a destroyed node can never lend its count to a newcomer that
//! reuses its arena slot.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::NodeId;

/// A node's own reference counter.
#[derive(Default)]
pub(crate) struct ReferenceCount(Arc<AtomicUsize>);

impl ReferenceCount {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Current number of outstanding references.
    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Create a counted handle to the node `id`.
    pub(crate) fn handle(&self, id: NodeId) -> NodeRef {
        self.0.fetch_add(1, Ordering::Relaxed);
        NodeRef {
            id,
            count: Arc::clone(&self.0),
        }
    }
}

impl fmt::Debug for ReferenceCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// A counted reference to a node.
///
/// Holding a `NodeRef` keeps the node alive: [`Dag::remove_node`] refuses to
/// destroy it and [`Dag::collect_garbage`] skips it.
///
/// [`Dag::remove_node`]: super::Dag::remove_node
/// [`Dag::collect_garbage`]: super::Dag::collect_garbage
pub struct NodeRef {
    id: NodeId,
    count: Arc<AtomicUsize>,
}

impl NodeRef {
    /// The handle of the referenced node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Number of references currently held on the node, including this one.
    pub fn reference_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

impl Clone for NodeRef {
    fn clone(&self) -> Self {
        self.count.fetch_add(1, Ordering::Relaxed);
        Self {
            id: self.id,
            count: Arc::clone(&self.count),
        }
    }
}

impl Drop for NodeRef {
    fn drop(&mut self) {
        let previous = self.count.fetch_sub(1, Ordering::Release);
        debug_assert!(previous > 0, "reference count of {} dropped below zero", self.id);
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("references", &self.reference_count())
            .finish()
    }
}

impl From<&NodeRef> for NodeId {
    fn from(node: &NodeRef) -> Self {
        node.id
    }
}
