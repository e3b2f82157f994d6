//! Graph Nodes
//!
//! This module defines the node record that lives in the [`Dag`] arena and
//! the closed set of node kinds.
//!
//! # Dirty State
//!
//! Each node carries two flags, `touched` and `needs_update`, which combine
//! into three states:
//!
//! | state            | touched | needs_update | stored value |
//! |------------------|---------|--------------|--------------|
//! | `Clean`          | false   | false        | absent       |
//! | `TouchedStale`   | true    | true         | present      |
//! | `TouchedUpdated` | true    | false        | present      |
//!
//! The graph-level transitions (`touch`, `update`, `keep`, `restore`) live in
//! the `state` module; this module only holds the per-node halves of them.
//!
//! [`Dag`]: super::Dag

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::ownership::{NodeRef, ReferenceCount};
use crate::distribution::Distribution;
use crate::function::Function;
use crate::value::{Value, ValueType};

/// Handle to a node in a [`Dag`](super::Dag).
///
/// The generation distinguishes successive occupants of the same arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Position of the node in the arena.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Dirty state of a node, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// Value is committed, nothing is stashed.
    Clean,

    /// Touched and the value has not been recomputed yet.
    TouchedStale,

    /// Touched and recomputed; the pre-touch value is still stashed.
    TouchedUpdated,
}

/// Probability bookkeeping of a stochastic node.
#[derive(Debug, Clone)]
pub struct StochasticState {
    pub(crate) distribution: Arc<dyn Distribution>,
    /// Cached log-probability of the current value.
    pub(crate) ln_prob: f64,
    /// Log-probability at touch time. Present only while touched.
    pub(crate) stored_ln_prob: Option<f64>,
    pub(crate) needs_probability_recalculation: bool,
    /// Observed data rather than a free variable.
    pub(crate) clamped: bool,
}

impl StochasticState {
    pub(crate) fn new(distribution: Arc<dyn Distribution>) -> Self {
        Self {
            distribution,
            ln_prob: f64::NEG_INFINITY,
            stored_ln_prob: None,
            needs_probability_recalculation: true,
            clamped: false,
        }
    }

    pub fn distribution(&self) -> &Arc<dyn Distribution> {
        &self.distribution
    }

    pub fn is_clamped(&self) -> bool {
        self.clamped
    }
}

/// The kind of node. Every kind shares the same dirty-state contract.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Immutable leaf.
    Constant,

    /// Value is a pure function of the parents.
    Deterministic { function: Arc<dyn Function> },

    /// Value is associated with a distribution over the parents.
    Stochastic(StochasticState),

    /// Vector assembled from scalar parents, one element per slot.
    Container { element_type: ValueType },

    /// One element of a vector-valued parent.
    Member { index: usize },

    /// Parent value converted to another type.
    Converter { target: ValueType },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Constant => "constant",
            NodeKind::Deterministic { .. } => "deterministic",
            NodeKind::Stochastic(_) => "stochastic",
            NodeKind::Container { .. } => "container",
            NodeKind::Member { .. } => "member",
            NodeKind::Converter { .. } => "converter",
        }
    }

    /// Whether the node may have `arity` parent slots.
    pub(crate) fn accepts_arity(&self, arity: usize) -> bool {
        match self {
            NodeKind::Constant => arity == 0,
            NodeKind::Deterministic { function } => function.accepts_arity(arity),
            NodeKind::Stochastic(state) => state.distribution.parameter_types().len() == arity,
            NodeKind::Container { .. } => true,
            NodeKind::Member { .. } | NodeKind::Converter { .. } => arity == 1,
        }
    }

    /// Whether a parent declared as `ty` may sit in parent slot `slot`.
    pub(crate) fn slot_accepts(&self, slot: usize, ty: ValueType) -> bool {
        match self {
            NodeKind::Constant => false,
            NodeKind::Deterministic { function } => function
                .parameter_type(slot)
                .is_some_and(|expected| expected.accepts(ty)),
            NodeKind::Stochastic(state) => state
                .distribution
                .parameter_types()
                .get(slot)
                .is_some_and(|expected| expected.accepts(ty)),
            NodeKind::Container { element_type } => element_type.accepts(ty),
            NodeKind::Member { .. } => slot == 0 && ty == ValueType::RealVector,
            NodeKind::Converter { target } => slot == 0 && ty.widens_to(*target),
        }
    }

    /// The type expected in `slot`, for error reporting.
    pub(crate) fn expected_slot_type(&self, slot: usize) -> Option<ValueType> {
        match self {
            NodeKind::Constant => None,
            NodeKind::Deterministic { function } => function.parameter_type(slot),
            NodeKind::Stochastic(state) => state.distribution.parameter_types().get(slot).copied(),
            NodeKind::Container { element_type } => Some(*element_type),
            NodeKind::Member { .. } => Some(ValueType::RealVector),
            NodeKind::Converter { target } => Some(*target),
        }
    }

    /// Kinds whose value is recomputed from the parents on update.
    pub(crate) fn is_derived(&self) -> bool {
        !matches!(self, NodeKind::Constant | NodeKind::Stochastic(_))
    }
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) value_type: ValueType,
    pub(crate) value: Value,
    /// Pre-touch value. Present only while touched.
    pub(crate) stored_value: Option<Value>,
    pub(crate) touched: bool,
    pub(crate) needs_update: bool,
    /// Owned, positional parent slots. A parent may fill several slots.
    pub(crate) parents: SmallVec<[NodeRef; 4]>,
    /// Weak back-edges, used only for propagation.
    pub(crate) children: IndexSet<NodeId>,
    pub(crate) references: ReferenceCount,
    pub(crate) kind: NodeKind,
    /// Number of times the value was recomputed from the parents.
    pub(crate) recompute_count: u64,
}

impl Node {
    pub(crate) fn new(
        name: impl Into<String>,
        value_type: ValueType,
        value: Value,
        kind: NodeKind,
        parents: SmallVec<[NodeRef; 4]>,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            value,
            stored_value: None,
            touched: false,
            needs_update: false,
            parents,
            children: IndexSet::new(),
            references: ReferenceCount::new(),
            kind,
            recompute_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// The current value, without triggering recomputation.
    pub fn current_value(&self) -> &Value {
        &self.value
    }

    pub fn stored_value(&self) -> Option<&Value> {
        self.stored_value.as_ref()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub fn dirty_state(&self) -> DirtyState {
        match (self.touched, self.needs_update) {
            (false, _) => DirtyState::Clean,
            (true, true) => DirtyState::TouchedStale,
            (true, false) => DirtyState::TouchedUpdated,
        }
    }

    pub fn is_stochastic(&self) -> bool {
        matches!(self.kind, NodeKind::Stochastic(_))
    }

    pub fn is_clamped(&self) -> bool {
        matches!(&self.kind, NodeKind::Stochastic(state) if state.clamped)
    }

    pub fn stochastic(&self) -> Option<&StochasticState> {
        match &self.kind {
            NodeKind::Stochastic(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn stochastic_mut(&mut self) -> Option<&mut StochasticState> {
        match &mut self.kind {
            NodeKind::Stochastic(state) => Some(state),
            _ => None,
        }
    }

    /// Parent handles in slot order. A parent filling two slots appears twice.
    pub fn parents(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.parents.iter().map(NodeRef::id)
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().copied()
    }

    pub fn reference_count(&self) -> usize {
        self.references.get()
    }

    pub fn recompute_count(&self) -> u64 {
        self.recompute_count
    }

    pub(crate) fn has_parent(&self, parent: NodeId) -> bool {
        self.parents.iter().any(|p| p.id() == parent)
    }

    /// Clean → TouchedStale for this node alone.
    pub(crate) fn touch_me(&mut self) {
        self.stored_value = Some(self.value.clone());
        self.touched = true;
        self.needs_update = true;
        if let NodeKind::Stochastic(state) = &mut self.kind {
            state.stored_ln_prob = Some(state.ln_prob);
            state.needs_probability_recalculation = true;
        }
    }

    /// Discard the stash. The caller has already brought the value up to date.
    pub(crate) fn keep_me(&mut self) {
        self.stored_value = None;
        self.touched = false;
        self.needs_update = false;
        if let NodeKind::Stochastic(state) = &mut self.kind {
            state.stored_ln_prob = None;
        }
    }

    /// Reinstate the stash without recomputing anything.
    pub(crate) fn restore_me(&mut self) {
        if let Some(stored) = self.stored_value.take() {
            self.value = stored;
        }
        self.touched = false;
        self.needs_update = false;
        if let NodeKind::Stochastic(state) = &mut self.kind {
            if let Some(stored) = state.stored_ln_prob.take() {
                state.ln_prob = stored;
            }
            state.needs_probability_recalculation = false;
        }
    }

    /// Copy this node's state onto new parent handles, with a fresh counter
    /// and no children.
    pub(crate) fn duplicate(&self, parents: SmallVec<[NodeRef; 4]>) -> Node {
        Node {
            name: self.name.clone(),
            value_type: self.value_type,
            value: self.value.clone(),
            stored_value: self.stored_value.clone(),
            touched: self.touched,
            needs_update: self.needs_update,
            parents,
            children: IndexSet::new(),
            references: ReferenceCount::new(),
            kind: self.kind.clone(),
            recompute_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: f64) -> Node {
        Node::new("c", ValueType::Real, Value::Real(value), NodeKind::Constant, SmallVec::new())
    }

    #[test]
    fn node_starts_clean() {
        let node = constant(1.0);
        assert_eq!(node.dirty_state(), DirtyState::Clean);
        assert!(node.stored_value().is_none());
        assert_eq!(node.reference_count(), 0);
    }

    #[test]
    fn touch_then_restore_reinstates_the_stash() {
        let mut node = constant(1.0);
        node.touch_me();
        assert_eq!(node.dirty_state(), DirtyState::TouchedStale);
        assert_eq!(node.stored_value(), Some(&Value::Real(1.0)));

        node.value = Value::Real(2.0);
        node.restore_me();
        assert_eq!(node.dirty_state(), DirtyState::Clean);
        assert_eq!(node.current_value(), &Value::Real(1.0));
        assert!(node.stored_value().is_none());
    }

    #[test]
    fn keep_discards_the_stash() {
        let mut node = constant(1.0);
        node.touch_me();
        node.value = Value::Real(3.0);
        node.keep_me();
        assert_eq!(node.current_value(), &Value::Real(3.0));
        assert!(node.stored_value().is_none());
        assert!(!node.is_touched());
    }

    #[test]
    fn node_ids_display_generation() {
        assert_eq!(NodeId::new(3, 1).to_string(), "#3.1");
        assert_ne!(NodeId::new(3, 1), NodeId::new(3, 2));
    }
}
