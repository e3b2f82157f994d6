//! Graph Mutation
//!
//! Structural edits: adding and removing parent edges, swapping a parent,
//! replacing a node, changing a node's value type and destroying nodes.
//!
//! Every edit validates first and mutates second. A failed edit leaves both
//! endpoints exactly as they were.

use std::collections::HashSet;

use tracing::debug;

use super::{coerce_for, Dag, NodeId, NodeKind, NodeRef};
use crate::error::{DagError, Result};
use crate::value::ValueType;

impl Dag {
    // ------------------------------------------------------------------------
    // Cycle check
    // ------------------------------------------------------------------------

    /// Whether `ancestor` lies in the parent closure of `node`.
    ///
    /// The visited set lives for one call only.
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> Result<bool> {
        let mut visited = HashSet::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            for parent in self.node(current)?.parents() {
                if parent == ancestor {
                    return Ok(true);
                }
                if visited.insert(parent) {
                    stack.push(parent);
                }
            }
        }
        Ok(false)
    }

    /// Whether making `parent` a parent of `child` would close a cycle.
    pub fn would_create_cycle(&self, parent: NodeId, child: NodeId) -> Result<bool> {
        Ok(parent == child || self.is_ancestor_of(child, parent)?)
    }

    fn check_acyclic(&self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.would_create_cycle(parent, child)? {
            return Err(DagError::Cycle {
                parent: self.name_of(parent),
                child: self.name_of(child),
            });
        }
        Ok(())
    }

    /// Check that every slot of `child` holding `old` would accept `new`.
    fn check_slots(&self, child: NodeId, old: NodeId, new: NodeId) -> Result<()> {
        self.check_slots_accept(child, old, self.node(new)?.value_type)
    }

    fn check_slots_accept(&self, child: NodeId, old: NodeId, found: ValueType) -> Result<()> {
        let node = self.node(child)?;
        for (slot, parent) in node.parents().enumerate() {
            if parent == old && !node.kind.slot_accepts(slot, found) {
                return Err(DagError::TypeMismatch {
                    node: self.name_of(child),
                    expected: node.kind.expected_slot_type(slot).unwrap_or(found),
                    found,
                });
            }
        }
        Ok(())
    }

    /// Point every slot of `child` holding `old` at `new`, and move the
    /// back-edge along.
    fn relink(&mut self, child: NodeId, old: NodeId, new: NodeId) -> Result<()> {
        let handle = self.retain(new)?;
        for slot in self.node_mut(child)?.parents.iter_mut() {
            if slot.id() == old {
                *slot = handle.clone();
            }
        }
        self.node_mut(old)?.children.shift_remove(&child);
        self.node_mut(new)?.children.insert(child);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------------

    /// Append `parent` as a new last parent slot of `child`.
    pub fn add_parent(&mut self, child: NodeId, parent: NodeId) -> Result<()> {
        let node = self.node(child)?;
        let arity = node.parents.len() + 1;
        if !node.kind.accepts_arity(arity) {
            return Err(DagError::Arity {
                node: self.name_of(child),
                arity,
            });
        }
        let found = self.node(parent)?.value_type;
        if !node.kind.slot_accepts(arity - 1, found) {
            return Err(DagError::TypeMismatch {
                node: self.name_of(child),
                expected: node.kind.expected_slot_type(arity - 1).unwrap_or(found),
                found,
            });
        }
        self.check_acyclic(parent, child)?;

        let handle = self.retain(parent)?;
        self.node_mut(child)?.parents.push(handle);
        self.node_mut(parent)?.children.insert(child);
        debug!(child = %self.name_of(child), parent = %self.name_of(parent), "added parent");
        self.refresh(child)
    }

    /// Remove every slot of `child` that holds `parent`.
    pub fn remove_parent(&mut self, child: NodeId, parent: NodeId) -> Result<()> {
        let node = self.node(child)?;
        if !node.has_parent(parent) {
            return Err(DagError::NotAParent {
                parent: self.name_of(parent),
                child: self.name_of(child),
            });
        }
        let arity = node.parents().filter(|&p| p != parent).count();
        if !node.kind.accepts_arity(arity) {
            return Err(DagError::Arity {
                node: self.name_of(child),
                arity,
            });
        }

        self.node_mut(child)?.parents.retain(|p| p.id() != parent);
        self.node_mut(parent)?.children.shift_remove(&child);
        debug!(child = %self.name_of(child), parent = %self.name_of(parent), "removed parent");
        self.refresh(child)
    }

    /// Replace `old` by `new` in every parent slot of `child`.
    ///
    /// The child is left touched, with the touch propagated to its
    /// descendants, so the caller commits or rolls back the values as for
    /// any other change. The edge itself is not undone by `restore`.
    pub fn swap_parent(&mut self, child: NodeId, old: NodeId, new: NodeId) -> Result<()> {
        if !self.node(child)?.has_parent(old) {
            return Err(DagError::NotAParent {
                parent: self.name_of(old),
                child: self.name_of(child),
            });
        }
        self.check_slots(child, old, new)?;
        if old != new {
            self.check_acyclic(new, child)?;
            self.relink(child, old, new)?;
        }
        debug!(
            child = %self.name_of(child),
            old = %self.name_of(old),
            new = %self.name_of(new),
            "swapped parent"
        );
        self.touch(child)
    }

    /// Hand every child of `old` over to `new`.
    ///
    /// All children are validated before any edge moves.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let children: Vec<NodeId> = self.node(old)?.children().collect();
        for &child in &children {
            self.check_slots(child, old, new)?;
            self.check_acyclic(new, child)?;
        }
        for &child in &children {
            self.relink(child, old, new)?;
        }
        debug!(
            old = %self.name_of(old),
            new = %self.name_of(new),
            children = children.len(),
            "replaced node"
        );
        for child in children {
            self.refresh(child)?;
        }
        Ok(())
    }

    /// Change the declared value type of a node.
    ///
    /// A constant is converted in place and the returned handle refers to it.
    /// Any other node is left as it is and a converter node is inserted
    /// behind it, taking over all of its children. The returned handle then
    /// refers to the converter. Since such a node's value keeps changing,
    /// only widening conversions are allowed for it.
    pub fn mutate_value_type(&mut self, id: NodeId, target: ValueType) -> Result<NodeRef> {
        let node = self.node(id)?;
        let found = node.value_type;
        if found == target {
            return self.retain(id);
        }
        if !found.converts_to(target) {
            return Err(DagError::TypeMismatch {
                node: self.name_of(id),
                expected: target,
                found,
            });
        }
        let children: Vec<NodeId> = node.children().collect();
        for &child in &children {
            self.check_slots_accept(child, id, target)?;
        }

        if matches!(node.kind, NodeKind::Constant) {
            let value = coerce_for(&node.name, target, node.value.clone())?;
            let node = self.node_mut(id)?;
            node.value_type = target;
            node.value = value;
            for child in children {
                self.refresh(child)?;
            }
            debug!(node = %self.name_of(id), %target, "converted constant");
            return self.retain(id);
        }

        if !found.widens_to(target) {
            return Err(DagError::TypeMismatch {
                node: self.name_of(id),
                expected: target,
                found,
            });
        }
        let name = format!("{}<{}>", node.name, target);
        let converter = self.add_converter(&name, id, target)?;
        for &child in &children {
            self.relink(child, id, converter.id())?;
        }
        for child in children {
            self.refresh(child)?;
        }
        debug!(node = %self.name_of(id), %target, "inserted converter");
        Ok(converter)
    }

    // ------------------------------------------------------------------------
    // Destruction
    // ------------------------------------------------------------------------

    /// Destroy a node that nothing references any more.
    ///
    /// Releasing its parent slots may leave the parents unreferenced in turn.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let references = self.node(id)?.references.get();
        if references > 0 {
            return Err(DagError::StillReferenced {
                node: self.name_of(id),
                references,
            });
        }
        let name = self.name_of(id);
        let node = self.take(id)?;
        for parent in node.parents() {
            self.node_mut(parent)?.children.shift_remove(&id);
        }
        debug!(node = %name, "removed node");
        Ok(())
    }

    /// Destroy every unreferenced node, cascading through released parents.
    ///
    /// Returns the number of nodes destroyed.
    pub fn collect_garbage(&mut self) -> Result<usize> {
        let mut removed = 0;
        loop {
            let dead: Vec<NodeId> = self
                .ids()
                .filter(|id| self.get(*id).is_some_and(|n| n.references.get() == 0))
                .collect();
            if dead.is_empty() {
                break;
            }
            for id in dead {
                self.remove_node(id)?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "collected garbage");
        }
        Ok(removed)
    }
}
