//! Dependency Graph
//!
//! This module implements the directed acyclic graph of random variables and
//! derived quantities that the MCMC machinery mutates.
//!
//! # Overview
//!
//! - Nodes live in an arena ([`Dag`]) and are addressed by generational
//!   [`NodeId`] handles.
//! - Edges run from parent to child. A child owns its parents through counted
//!   [`NodeRef`] slots; a parent knows its children only by id.
//! - Changes are lazy: touching a node marks it and its descendants dirty,
//!   and values are recomputed only when read.
//! - Every change is transactional: a touched node is either kept (commit) or
//!   restored (rollback) to its pre-touch value.
//!
//! # Design Decisions
//!
//! 1. Node kinds are a closed enum behind one shared contract rather than a
//!    hierarchy of node types. New kinds are added as variants.
//!
//! 2. The arena owns every node. Lifetime is controlled by per-node reference
//!    counts, never by the back-edges.
//!
//! 3. The graph is single-threaded. Parallel chains each own a deep copy made
//!    with [`Dag::clone_graph`].

mod clone;
mod dump;
mod mutation;
mod node;
mod ownership;
mod state;

use std::sync::Arc;

use smallvec::SmallVec;

pub use clone::CloneMap;
pub use dump::NodeSnapshot;
pub use node::{DirtyState, Node, NodeId, NodeKind, StochasticState};
pub use ownership::NodeRef;

use crate::distribution::Distribution;
use crate::error::{DagError, Result};
use crate::function::Function;
use crate::value::{Value, ValueType};

/// An arena slot. The generation increments every time the slot is freed.
#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// The dependency graph.
#[derive(Debug, Default)]
pub struct Dag {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
    /// Clamped nodes contribute nothing to the log-probability.
    prior_only: bool,
}

impl Dag {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Look up a node.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    /// Look up a node, failing with [`DagError::UnknownNode`].
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or(DagError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
            .ok_or(DagError::UnknownNode(id))
    }

    /// Handles of all live nodes, in arena order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node
                .as_ref()
                .map(|_| NodeId::new(index as u32, slot.generation))
        })
    }

    /// Total number of parent slots across the graph.
    pub fn edge_count(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|slot| slot.node.as_ref())
            .map(|node| node.parents.len())
            .sum()
    }

    /// Find the first live node with the given name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.ids().find(|id| self.get(*id).is_some_and(|n| n.name == name))
    }

    /// Display name of a node for messages. Anonymous nodes print their id.
    pub(crate) fn name_of(&self, id: NodeId) -> String {
        match self.get(id) {
            Some(node) if !node.name.is_empty() => node.name.clone(),
            _ => format!("<{id}>"),
        }
    }

    /// Take a counted reference to a node.
    pub fn retain(&self, id: NodeId) -> Result<NodeRef> {
        Ok(self.node(id)?.references.handle(id))
    }

    pub fn reference_count(&self, id: NodeId) -> Result<usize> {
        Ok(self.node(id)?.references.get())
    }

    pub fn prior_only(&self) -> bool {
        self.prior_only
    }

    /// Move a node into the arena and hand back the first reference to it.
    fn insert(&mut self, node: Node) -> NodeRef {
        self.len += 1;
        let id = match self.free.pop() {
            Some(index) => NodeId::new(index, self.slots[index as usize].generation),
            None => {
                self.slots.push(Slot::default());
                NodeId::new(self.slots.len() as u32 - 1, 0)
            }
        };
        let handle = node.references.handle(id);
        self.slots[id.index()].node = Some(node);
        handle
    }

    fn take(&mut self, id: NodeId) -> Result<Node> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .ok_or(DagError::UnknownNode(id))?;
        let node = slot.node.take().ok_or(DagError::UnknownNode(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index() as u32);
        self.len -= 1;
        Ok(node)
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    /// Add an immutable leaf. The declared type is inferred from the value.
    pub fn add_constant(&mut self, name: &str, value: impl Into<Value>) -> NodeRef {
        let value = value.into();
        let value_type = value.natural_type();
        self.insert(Node::new(name, value_type, value, NodeKind::Constant, SmallVec::new()))
    }

    /// Add an immutable leaf with an explicit (possibly refined) type.
    pub fn add_typed_constant(
        &mut self,
        name: &str,
        value_type: ValueType,
        value: impl Into<Value>,
    ) -> Result<NodeRef> {
        let value = coerce_for(name, value_type, value.into())?;
        let node = Node::new(name, value_type, value, NodeKind::Constant, SmallVec::new());
        Ok(self.insert(node))
    }

    /// Add a node whose value is `function` applied to `parents`.
    pub fn add_deterministic(
        &mut self,
        name: &str,
        function: Arc<dyn Function>,
        parents: &[NodeId],
    ) -> Result<NodeRef> {
        let value_type = function.return_type();
        let placeholder = Value::Real(f64::NAN);
        let kind = NodeKind::Deterministic { function };
        self.add_derived(name, value_type, placeholder, kind, parents)
    }

    /// Add a random variable distributed as `distribution` over `parents`,
    /// starting at `value`.
    pub fn add_stochastic(
        &mut self,
        name: &str,
        distribution: Arc<dyn Distribution>,
        parents: &[NodeId],
        value: impl Into<Value>,
    ) -> Result<NodeRef> {
        let value_type = distribution.value_type();
        let value = coerce_for(name, value_type, value.into())?;
        let kind = NodeKind::Stochastic(node::StochasticState::new(distribution));
        let handles = self.parent_handles(name, &kind, parents)?;
        let node = self.insert(Node::new(name, value_type, value, kind, handles));
        self.link_children(node.id(), parents)?;
        self.refresh_ln_probability(node.id())?;
        Ok(node)
    }

    /// Add a vector node built from scalar parents, one element per parent.
    pub fn add_container(&mut self, name: &str, elements: &[NodeId]) -> Result<NodeRef> {
        let kind = NodeKind::Container {
            element_type: ValueType::Real,
        };
        let placeholder = Value::RealVector(Vec::new());
        self.add_derived(name, ValueType::RealVector, placeholder, kind, elements)
    }

    /// Add a node reading element `index` of a vector-valued parent.
    pub fn add_member(&mut self, name: &str, vector: NodeId, index: usize) -> Result<NodeRef> {
        let kind = NodeKind::Member { index };
        self.add_derived(name, ValueType::Real, Value::Real(f64::NAN), kind, &[vector])
    }

    /// Add a node converting `parent`'s value to `target`.
    pub fn add_converter(&mut self, name: &str, parent: NodeId, target: ValueType) -> Result<NodeRef> {
        let kind = NodeKind::Converter { target };
        self.add_derived(name, target, Value::Real(f64::NAN), kind, &[parent])
    }

    fn add_derived(
        &mut self,
        name: &str,
        value_type: ValueType,
        placeholder: Value,
        kind: NodeKind,
        parents: &[NodeId],
    ) -> Result<NodeRef> {
        let handles = self.parent_handles(name, &kind, parents)?;
        let mut node = Node::new(name, value_type, placeholder, kind, handles);
        node.needs_update = true;
        let node = self.insert(node);
        self.link_children(node.id(), parents)?;
        self.update(node.id())?;
        Ok(node)
    }

    /// Validate arity and slot types, then take one handle per slot.
    fn parent_handles(
        &self,
        name: &str,
        kind: &NodeKind,
        parents: &[NodeId],
    ) -> Result<SmallVec<[NodeRef; 4]>> {
        if !kind.accepts_arity(parents.len()) {
            return Err(DagError::Arity {
                node: name.to_owned(),
                arity: parents.len(),
            });
        }
        let mut handles = SmallVec::with_capacity(parents.len());
        for (slot, &parent) in parents.iter().enumerate() {
            let found = self.node(parent)?.value_type;
            if !kind.slot_accepts(slot, found) {
                return Err(DagError::TypeMismatch {
                    node: name.to_owned(),
                    expected: kind.expected_slot_type(slot).unwrap_or(found),
                    found,
                });
            }
            handles.push(self.retain(parent)?);
        }
        Ok(handles)
    }

    fn link_children(&mut self, child: NodeId, parents: &[NodeId]) -> Result<()> {
        for &parent in parents {
            self.node_mut(parent)?.children.insert(child);
        }
        Ok(())
    }
}

/// Convert `value` so that `value_type` admits it, or fail.
pub(crate) fn coerce_for(name: &str, value_type: ValueType, value: Value) -> Result<Value> {
    value.coerce(value_type).ok_or_else(|| DagError::InvalidValue {
        node: name.to_owned(),
        expected: value_type,
        value: value.to_string(),
    })
}
