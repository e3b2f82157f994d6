//! Dirty-State Machine
//!
//! The transactional protocol every MCMC step relies on.
//!
//! # How It Works
//!
//! 1. `touch` marks a node and, transitively, every descendant. Each node
//!    stashes its current value (and log-probability) the first time it is
//!    touched. A node that is already touched keeps its stash but is marked
//!    stale again, since another of its parents may have changed. A node
//!    reachable along several paths is visited once per touch.
//!
//! 2. Reads are lazy. Reading the value or log-probability of a stale node
//!    recomputes it from its parents exactly once.
//!
//! 3. `keep` commits: it forces any pending recomputation, drops the stash
//!    and walks the touched descendants.
//!
//! 4. `restore` rolls back: it reinstates the stash and walks the touched
//!    descendants. Nothing is recomputed.
//!
//! The cost of a step is proportional to the dirty subgraph, never to the
//! whole graph.

use std::collections::HashSet;

use indexmap::IndexSet;
use rand::RngCore;
use smallvec::SmallVec;

use super::{coerce_for, Dag, NodeId, NodeKind};
use crate::error::{DagError, Result};
use crate::value::Value;

impl Dag {
    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Touch a node and its descendants.
    ///
    /// Untouched nodes stash their state. Touched nodes are marked stale
    /// again. The walk does not continue below an already touched stochastic
    /// descendant, whose own value is unaffected.
    pub fn touch(&mut self, id: NodeId) -> Result<()> {
        let mut visited = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let node = self.node(current)?;
            if node.touched {
                let node = self.node_mut(current)?;
                if node.kind.is_derived() {
                    node.needs_update = true;
                }
                if let Some(state) = node.stochastic_mut() {
                    state.needs_probability_recalculation = true;
                    if current != id {
                        continue;
                    }
                }
                stack.extend(node.children.iter().copied());
                continue;
            }
            // the stash must hold a valid log-probability
            if node
                .stochastic()
                .is_some_and(|s| s.needs_probability_recalculation)
            {
                self.refresh_ln_probability(current)?;
            }
            let node = self.node_mut(current)?;
            node.touch_me();
            stack.extend(node.children.iter().copied());
        }
        Ok(())
    }

    /// Recompute a stale node from its parents' current values.
    ///
    /// Stale ancestors are updated first, parents before children. A second
    /// call before the next touch does nothing.
    pub fn update(&mut self, id: NodeId) -> Result<()> {
        if !self.node(id)?.needs_update {
            return Ok(());
        }
        // post-order: a node is evaluated once all its stale parents are
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            let node = self.node(current)?;
            if !node.needs_update {
                continue;
            }
            if !expanded {
                stack.push((current, true));
                for parent in node.parents() {
                    if self.node(parent)?.needs_update {
                        stack.push((parent, false));
                    }
                }
                continue;
            }

            let recomputed = self.evaluate(current)?;
            let node = self.node_mut(current)?;
            if let Some(value) = recomputed {
                node.value = value;
                node.recompute_count += 1;
            }
            node.needs_update = false;
        }
        Ok(())
    }

    /// Commit a touched node and its touched descendants.
    pub fn keep(&mut self, id: NodeId) -> Result<()> {
        self.require_touched(id, "keep")?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.node(current)?.touched {
                continue;
            }
            self.update(current)?;
            if self
                .node(current)?
                .stochastic()
                .is_some_and(|s| s.needs_probability_recalculation)
            {
                self.refresh_ln_probability(current)?;
            }
            let node = self.node_mut(current)?;
            node.keep_me();
            stack.extend(node.children.iter().copied());
        }
        Ok(())
    }

    /// Roll back a touched node and its touched descendants.
    pub fn restore(&mut self, id: NodeId) -> Result<()> {
        self.require_touched(id, "restore")?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node_mut(current)?;
            if !node.touched {
                continue;
            }
            node.restore_me();
            stack.extend(node.children.iter().copied());
        }
        Ok(())
    }

    fn require_touched(&self, id: NodeId, operation: &'static str) -> Result<()> {
        if self.node(id)?.touched {
            Ok(())
        } else {
            Err(DagError::NotTouched {
                node: self.name_of(id),
                operation,
            })
        }
    }

    /// Bring a node up to date after a structural change.
    ///
    /// A clean node is touched and kept at once. A node already inside a
    /// transaction is only marked stale again so its stash survives.
    pub(crate) fn refresh(&mut self, id: NodeId) -> Result<()> {
        if self.node(id)?.touched {
            self.touch(id)
        } else {
            self.touch(id)?;
            self.keep(id)
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// The current value, recomputed first if stale.
    pub fn value(&mut self, id: NodeId) -> Result<&Value> {
        self.update(id)?;
        Ok(&self.node(id)?.value)
    }

    /// The pre-touch value, present only while the node is touched.
    pub fn stored_value(&self, id: NodeId) -> Result<Option<&Value>> {
        Ok(self.node(id)?.stored_value.as_ref())
    }

    pub fn is_touched(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.touched)
    }

    pub fn is_clamped(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.is_clamped())
    }

    /// Log-probability of the node's current value.
    ///
    /// Zero for every kind but stochastic nodes.
    pub fn ln_probability(&mut self, id: NodeId) -> Result<f64> {
        let Some(state) = self.node(id)?.stochastic() else {
            return Ok(0.0);
        };
        if state.needs_probability_recalculation {
            self.refresh_ln_probability(id)
        } else {
            Ok(state.ln_prob)
        }
    }

    /// Change in log-probability since the last commit.
    ///
    /// | self touched | parents touched | result                        |
    /// |--------------|-----------------|-------------------------------|
    /// | no           | no              | `0.0`, nothing recomputed     |
    /// | yes          | either          | `ln p(current) - stored`      |
    /// | no           | yes             | `ln p(current) - cached`      |
    ///
    /// In the last case the fresh density is not cached, because an untouched
    /// node would have nothing to restore it from.
    pub fn ln_probability_ratio(&mut self, id: NodeId) -> Result<f64> {
        let node = self.node(id)?;
        let Some(state) = node.stochastic() else {
            return Ok(0.0);
        };
        let cached = state.ln_prob;
        let stored = state.stored_ln_prob;
        let touched = node.touched;
        let parents_touched = node
            .parents
            .iter()
            .any(|p| self.get(p.id()).is_some_and(|parent| parent.touched));

        match (touched, parents_touched) {
            (false, false) => Ok(0.0),
            (true, _) => {
                let current = self.ln_probability(id)?;
                Ok(current - stored.unwrap_or(cached))
            }
            (false, true) => Ok(self.compute_ln_probability(id)? - cached),
        }
    }

    /// Sum of the log-probabilities of every stochastic node.
    pub fn ln_probability_total(&mut self) -> Result<f64> {
        let ids: Vec<NodeId> = self.ids().collect();
        let mut total = 0.0;
        for id in ids {
            total += self.ln_probability(id)?;
        }
        Ok(total)
    }

    /// Collect the stochastic nodes whose probability depends on `id`'s
    /// value: stochastic children directly, and stochastic nodes reached
    /// through deterministic intermediates.
    pub fn affected_nodes(&self, id: NodeId, affected: &mut IndexSet<NodeId>) -> Result<()> {
        let mut visited = HashSet::new();
        let mut stack: Vec<NodeId> = self.node(id)?.children().collect();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let node = self.node(current)?;
            if node.is_stochastic() {
                affected.insert(current);
            } else {
                stack.extend(node.children());
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Assign a new value to a stochastic node.
    ///
    /// The node is touched first, so the stash holds the value it had before
    /// this call. Calling again within the same transaction keeps the original
    /// stash and marks the descendants stale again.
    pub fn set_value(&mut self, id: NodeId, value: impl Into<Value>) -> Result<()> {
        let node = self.node(id)?;
        if !node.is_stochastic() {
            return Err(DagError::WrongKind {
                node: self.name_of(id),
                kind: node.kind.label(),
                expected: "stochastic",
            });
        }
        let value = coerce_for(&node.name, node.value_type, value.into())?;

        self.touch(id)?;
        let node = self.node_mut(id)?;
        node.value = value;
        if let Some(state) = node.stochastic_mut() {
            state.needs_probability_recalculation = true;
        }
        Ok(())
    }

    /// Fix a stochastic node to an observed value.
    ///
    /// Only legal on a clean node. The cached log-probability is recomputed
    /// and the children are brought up to date.
    pub fn clamp(&mut self, id: NodeId, value: impl Into<Value>) -> Result<()> {
        let node = self.node(id)?;
        if !node.is_stochastic() {
            return Err(DagError::WrongKind {
                node: self.name_of(id),
                kind: node.kind.label(),
                expected: "stochastic",
            });
        }
        if node.touched {
            return Err(DagError::ClampWhileTouched {
                node: self.name_of(id),
            });
        }
        let value = coerce_for(&node.name, node.value_type, value.into())?;
        let children: Vec<NodeId> = node.children().collect();

        let node = self.node_mut(id)?;
        node.value = value;
        if let Some(state) = node.stochastic_mut() {
            state.clamped = true;
        }
        self.refresh_ln_probability(id)?;
        for child in children {
            self.refresh(child)?;
        }
        Ok(())
    }

    /// Release a clamp. The value is left unchanged.
    pub fn unclamp(&mut self, id: NodeId) -> Result<()> {
        let node = self.node_mut(id)?;
        if let Some(state) = node.stochastic_mut() {
            state.clamped = false;
            state.needs_probability_recalculation = true;
        }
        if !self.node(id)?.touched {
            self.refresh_ln_probability(id)?;
        }
        Ok(())
    }

    /// Draw a fresh value from the node's distribution and touch the node.
    ///
    /// Clamped nodes keep their observation. The caller commits or rolls
    /// back as after any other change.
    pub fn redraw(&mut self, id: NodeId, rng: &mut dyn RngCore) -> Result<()> {
        let node = self.node(id)?;
        let Some(state) = node.stochastic() else {
            return Err(DagError::WrongKind {
                node: self.name_of(id),
                kind: node.kind.label(),
                expected: "stochastic",
            });
        };
        if state.clamped {
            return Ok(());
        }
        let distribution = state.distribution.clone();
        self.update_parents(id)?;
        let drawn = {
            let args = self.arguments(id)?;
            distribution.draw(&args, rng)
        };
        self.set_value(id, drawn)
    }

    /// Make clamped nodes contribute nothing to the log-probability.
    pub fn set_prior_only(&mut self, prior_only: bool) -> Result<()> {
        if self.prior_only == prior_only {
            return Ok(());
        }
        self.prior_only = prior_only;
        let clamped: Vec<NodeId> = self
            .ids()
            .filter(|id| self.get(*id).is_some_and(|n| n.is_clamped()))
            .collect();
        for id in clamped {
            if let Some(state) = self.node_mut(id)?.stochastic_mut() {
                state.needs_probability_recalculation = true;
            }
            if !self.node(id)?.touched {
                self.refresh_ln_probability(id)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    fn update_parents(&mut self, id: NodeId) -> Result<()> {
        let parents: SmallVec<[NodeId; 4]> = self.node(id)?.parents().collect();
        for parent in parents {
            self.update(parent)?;
        }
        Ok(())
    }

    /// Parents' current values in slot order.
    fn arguments(&self, id: NodeId) -> Result<SmallVec<[&Value; 4]>> {
        self.node(id)?
            .parents
            .iter()
            .map(|p| self.node(p.id()).map(|parent| &parent.value))
            .collect()
    }

    /// The value a derived node should hold, or `None` for kinds that are
    /// not recomputed.
    fn evaluate(&self, id: NodeId) -> Result<Option<Value>> {
        let node = self.node(id)?;
        let args = self.arguments(id)?;
        let value = match &node.kind {
            NodeKind::Constant | NodeKind::Stochastic(_) => return Ok(None),
            NodeKind::Deterministic { function } => function.compute(&args),
            NodeKind::Container { .. } => Value::RealVector(
                args.iter()
                    .map(|v| v.to_real().unwrap_or(f64::NAN))
                    .collect(),
            ),
            NodeKind::Member { index } => Value::Real(
                args.first()
                    .and_then(|v| v.as_vector())
                    .and_then(|v| v.get(*index))
                    .copied()
                    .unwrap_or(f64::NAN),
            ),
            NodeKind::Converter { target } => args
                .first()
                .and_then(|v| v.coerce(*target))
                .unwrap_or(Value::Real(f64::NAN)),
        };
        Ok(Some(value))
    }

    /// Density of the current value given up-to-date parents, not cached.
    fn density(&self, id: NodeId) -> Result<f64> {
        let node = self.node(id)?;
        let Some(state) = node.stochastic() else {
            return Ok(0.0);
        };
        if self.prior_only && state.clamped {
            return Ok(0.0);
        }
        let args = self.arguments(id)?;
        Ok(state.distribution.ln_probability(&node.value, &args))
    }

    /// Recompute the log-probability from current values without caching it.
    fn compute_ln_probability(&mut self, id: NodeId) -> Result<f64> {
        self.update_parents(id)?;
        self.density(id)
    }

    /// Recompute and cache the log-probability.
    pub(crate) fn refresh_ln_probability(&mut self, id: NodeId) -> Result<f64> {
        let ln_prob = self.compute_ln_probability(id)?;
        if let Some(state) = self.node_mut(id)?.stochastic_mut() {
            state.ln_prob = ln_prob;
            state.needs_probability_recalculation = false;
        }
        Ok(ln_prob)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dag::DirtyState;
    use crate::distribution::Normal;
    use crate::function::Add;
    use crate::value::ValueType;

    fn normal_ln_pdf(x: f64, mean: f64, sd: f64) -> f64 {
        let z = (x - mean) / sd;
        -0.5 * (2.0 * std::f64::consts::PI).ln() - sd.ln() - 0.5 * z * z
    }

    fn standard_normal(dag: &mut Dag, value: f64) -> (crate::dag::NodeRef, crate::dag::NodeRef) {
        let mu = dag.add_constant("mu", 0.0);
        let sd = dag
            .add_typed_constant("sd", ValueType::PositiveReal, 1.0)
            .unwrap();
        let x = dag
            .add_stochastic("x", Arc::new(Normal), &[mu.id(), sd.id()], value)
            .unwrap();
        (mu, x)
    }

    #[test]
    fn touch_reaches_every_descendant() {
        let mut dag = Dag::new();
        let (_, x) = standard_normal(&mut dag, 0.0);
        let one = dag.add_constant("one", 1.0);
        let y = dag.add_deterministic("y", Arc::new(Add), &[x.id(), one.id()]).unwrap();
        let z = dag.add_deterministic("z", Arc::new(Add), &[y.id(), x.id()]).unwrap();

        dag.touch(x.id()).unwrap();
        for id in [x.id(), y.id(), z.id()] {
            assert!(dag.is_touched(id).unwrap());
        }
        assert!(!dag.is_touched(one.id()).unwrap());
    }

    #[test]
    fn update_is_idempotent() {
        let mut dag = Dag::new();
        let (_, x) = standard_normal(&mut dag, 1.0);
        let one = dag.add_constant("one", 1.0);
        let y = dag.add_deterministic("y", Arc::new(Add), &[x.id(), one.id()]).unwrap();
        let before = dag.node(y.id()).unwrap().recompute_count();

        dag.set_value(x.id(), 2.0).unwrap();
        assert_eq!(dag.node(y.id()).unwrap().dirty_state(), DirtyState::TouchedStale);

        dag.update(y.id()).unwrap();
        dag.update(y.id()).unwrap();
        let node = dag.node(y.id()).unwrap();
        assert_eq!(node.current_value(), &Value::Real(3.0));
        assert_eq!(node.recompute_count(), before + 1);
        assert_eq!(node.dirty_state(), DirtyState::TouchedUpdated);
    }

    #[test]
    fn touch_then_restore_is_bit_identical() {
        let mut dag = Dag::new();
        let (_, x) = standard_normal(&mut dag, 0.2);
        let lnp = dag.ln_probability(x.id()).unwrap();

        dag.set_value(x.id(), 5.0).unwrap();
        assert_eq!(dag.stored_value(x.id()).unwrap(), Some(&Value::Real(0.2)));
        dag.ln_probability(x.id()).unwrap();
        dag.restore(x.id()).unwrap();

        assert_eq!(dag.value(x.id()).unwrap(), &Value::Real(0.2));
        assert_eq!(dag.ln_probability(x.id()).unwrap().to_bits(), lnp.to_bits());
        assert!(!dag.is_touched(x.id()).unwrap());
        assert!(dag.stored_value(x.id()).unwrap().is_none());
    }

    #[test]
    fn ratio_after_set_value() {
        let mut dag = Dag::new();
        let (_, x) = standard_normal(&mut dag, 0.2);
        assert_eq!(dag.ln_probability_ratio(x.id()).unwrap(), 0.0);

        dag.set_value(x.id(), 5.0).unwrap();
        let expected = normal_ln_pdf(5.0, 0.0, 1.0) - normal_ln_pdf(0.2, 0.0, 1.0);
        let ratio = dag.ln_probability_ratio(x.id()).unwrap();
        assert!((ratio - expected).abs() < 1e-12);
    }

    #[test]
    fn ratio_when_only_parents_are_touched() {
        let mut dag = Dag::new();
        let mu = dag.add_constant("mu", 0.0);
        let sd = dag.add_typed_constant("sd", ValueType::PositiveReal, 1.0).unwrap();
        let m = dag.add_stochastic("m", Arc::new(Normal), &[mu.id(), sd.id()], 0.0).unwrap();
        let x = dag.add_stochastic("x", Arc::new(Normal), &[m.id(), sd.id()], 1.0).unwrap();

        dag.set_value(m.id(), 1.0).unwrap();
        // commit the child alone so that only its parent stays touched
        dag.keep(x.id()).unwrap();
        dag.node_mut(x.id())
            .unwrap()
            .stochastic_mut()
            .unwrap()
            .ln_prob = normal_ln_pdf(1.0, 0.0, 1.0);

        let ratio = dag.ln_probability_ratio(x.id()).unwrap();
        assert!((ratio - (normal_ln_pdf(1.0, 1.0, 1.0) - normal_ln_pdf(1.0, 0.0, 1.0))).abs() < 1e-12);
        // the fresh density was not cached
        assert_eq!(dag.ln_probability(x.id()).unwrap(), normal_ln_pdf(1.0, 0.0, 1.0));
    }

    #[test]
    fn keep_and_restore_clear_the_stash() {
        let mut dag = Dag::new();
        let (_, x) = standard_normal(&mut dag, 0.0);
        let one = dag.add_constant("one", 1.0);
        let y = dag.add_deterministic("y", Arc::new(Add), &[x.id(), one.id()]).unwrap();

        dag.set_value(x.id(), 1.0).unwrap();
        dag.keep(x.id()).unwrap();
        for id in [x.id(), y.id()] {
            assert!(dag.stored_value(id).unwrap().is_none());
            assert!(!dag.is_touched(id).unwrap());
        }
        assert_eq!(dag.node(y.id()).unwrap().current_value(), &Value::Real(2.0));

        dag.set_value(x.id(), 3.0).unwrap();
        dag.restore(x.id()).unwrap();
        for id in [x.id(), y.id()] {
            assert!(dag.stored_value(id).unwrap().is_none());
            assert!(!dag.is_touched(id).unwrap());
        }
        assert_eq!(dag.value(y.id()).unwrap(), &Value::Real(2.0));
    }

    #[test]
    fn keep_on_untouched_node_is_a_lifecycle_error() {
        let mut dag = Dag::new();
        let (_, x) = standard_normal(&mut dag, 0.0);
        let err = dag.keep(x.id()).unwrap_err();
        assert!(matches!(err, DagError::NotTouched { operation: "keep", .. }));
        let err = dag.restore(x.id()).unwrap_err();
        assert!(matches!(err, DagError::NotTouched { operation: "restore", .. }));
    }

    #[test]
    fn set_value_twice_keeps_first_stash() {
        let mut dag = Dag::new();
        let (_, x) = standard_normal(&mut dag, 0.0);
        let one = dag.add_constant("one", 1.0);
        let y = dag.add_deterministic("y", Arc::new(Add), &[x.id(), one.id()]).unwrap();

        dag.set_value(x.id(), 1.0).unwrap();
        assert_eq!(dag.value(y.id()).unwrap(), &Value::Real(2.0));
        dag.set_value(x.id(), 4.0).unwrap();
        assert_eq!(dag.value(y.id()).unwrap(), &Value::Real(5.0));
        assert_eq!(dag.stored_value(x.id()).unwrap(), Some(&Value::Real(0.0)));
        assert_eq!(dag.stored_value(y.id()).unwrap(), Some(&Value::Real(1.0)));
    }

    #[test]
    fn clamp_requires_a_clean_node() {
        let mut dag = Dag::new();
        let (_, x) = standard_normal(&mut dag, 0.0);
        dag.set_value(x.id(), 1.0).unwrap();
        let err = dag.clamp(x.id(), 2.0).unwrap_err();
        assert!(matches!(err, DagError::ClampWhileTouched { .. }));
    }

    #[test]
    fn clamp_converts_and_refreshes() {
        let mut dag = Dag::new();
        let (_, x) = standard_normal(&mut dag, 0.0);
        let one = dag.add_constant("one", 1.0);
        let y = dag.add_deterministic("y", Arc::new(Add), &[x.id(), one.id()]).unwrap();

        dag.clamp(x.id(), 2i64).unwrap();
        assert!(dag.is_clamped(x.id()).unwrap());
        assert_eq!(dag.value(x.id()).unwrap(), &Value::Real(2.0));
        assert!((dag.ln_probability(x.id()).unwrap() - normal_ln_pdf(2.0, 0.0, 1.0)).abs() < 1e-12);
        assert!(!dag.is_touched(y.id()).unwrap());
        assert_eq!(dag.value(y.id()).unwrap(), &Value::Real(3.0));

        dag.unclamp(x.id()).unwrap();
        assert!(!dag.is_clamped(x.id()).unwrap());
        assert_eq!(dag.value(x.id()).unwrap(), &Value::Real(2.0));
    }

    #[test]
    fn prior_only_silences_observations() {
        let mut dag = Dag::new();
        let (_, x) = standard_normal(&mut dag, 0.0);
        dag.clamp(x.id(), 1.0).unwrap();
        assert!(dag.ln_probability(x.id()).unwrap() < 0.0);

        dag.set_prior_only(true).unwrap();
        assert_eq!(dag.ln_probability(x.id()).unwrap(), 0.0);
        dag.set_prior_only(false).unwrap();
        assert!((dag.ln_probability(x.id()).unwrap() - normal_ln_pdf(1.0, 0.0, 1.0)).abs() < 1e-12);
    }

    #[test]
    fn affected_nodes_stop_at_stochastic_children() {
        let mut dag = Dag::new();
        let (mu, x) = standard_normal(&mut dag, 0.0);
        let sd = dag.add_typed_constant("sd2", ValueType::PositiveReal, 1.0).unwrap();
        let y = dag.add_stochastic("y", Arc::new(Normal), &[x.id(), sd.id()], 0.0).unwrap();
        let one = dag.add_constant("one", 1.0);
        let shifted = dag.add_deterministic("shifted", Arc::new(Add), &[x.id(), one.id()]).unwrap();
        let z = dag.add_stochastic("z", Arc::new(Normal), &[shifted.id(), sd.id()], 0.0).unwrap();
        let w = dag.add_stochastic("w", Arc::new(Normal), &[y.id(), sd.id()], 0.0).unwrap();

        let mut affected = IndexSet::new();
        dag.affected_nodes(x.id(), &mut affected).unwrap();
        assert!(affected.contains(&y.id()));
        assert!(affected.contains(&z.id()));
        assert!(!affected.contains(&w.id()));
        assert!(!affected.contains(&shifted.id()));
        assert!(!affected.contains(&mu.id()));
    }

    #[test]
    fn set_value_rejects_non_stochastic_nodes() {
        let mut dag = Dag::new();
        let a = dag.add_constant("a", 1.0);
        let err = dag.set_value(a.id(), 2.0).unwrap_err();
        assert!(matches!(err, DagError::WrongKind { .. }));
    }

    #[test]
    fn redraw_touches_the_node() {
        use rand::SeedableRng;

        let mut dag = Dag::new();
        let (_, x) = standard_normal(&mut dag, 0.0);
        let mut rng = rand_pcg::Pcg64::seed_from_u64(7);
        dag.redraw(x.id(), &mut rng).unwrap();
        assert!(dag.is_touched(x.id()).unwrap());
        assert_eq!(dag.stored_value(x.id()).unwrap(), Some(&Value::Real(0.0)));
        dag.keep(x.id()).unwrap();
        assert!(dag.ln_probability(x.id()).unwrap().is_finite());
    }
}
