//! Up-down scaling proposal.

use rand::{Rng, RngCore};

use super::{map_node, real_valued_target, tune_multiplier, Proposal, DEFAULT_TUNE_TARGET};
use crate::dag::{CloneMap, Dag, NodeId, NodeRef};
use crate::error::Result;
use crate::value::Value;

/// Scales one group of nodes up and another down by the same factor
/// `exp(λ(u − 0.5))`.
///
/// Useful for parameters that trade off against each other, such as a rate
/// and a time. The log Hastings ratio is `(n_up − n_down) · ln(factor)`,
/// counting vector elements individually.
#[derive(Debug, Clone)]
pub struct UpDownScaleProposal {
    up: Vec<NodeRef>,
    down: Vec<NodeRef>,
    lambda: f64,
    target: f64,
    stored: Vec<(NodeId, Value)>,
}

impl UpDownScaleProposal {
    pub fn new(lambda: f64) -> Self {
        Self {
            up: Vec::new(),
            down: Vec::new(),
            lambda,
            target: DEFAULT_TUNE_TARGET,
            stored: Vec::new(),
        }
    }

    /// Add a node scaled by the factor (`up`) or by its inverse.
    pub fn add_variable(&mut self, dag: &Dag, node: NodeId, up: bool) -> Result<()> {
        let handle = real_valued_target(dag, node)?;
        if up {
            self.up.push(handle);
        } else {
            self.down.push(handle);
        }
        Ok(())
    }

    /// Drop a node from both groups. Its handle is released.
    pub fn remove_variable(&mut self, node: NodeId) {
        self.up.retain(|n| n.id() != node);
        self.down.retain(|n| n.id() != node);
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    fn scaled(value: &Value, factor: f64) -> (Value, usize) {
        match value {
            Value::RealVector(v) => (Value::RealVector(v.iter().map(|x| x * factor).collect()), v.len()),
            other => (Value::Real(other.to_real().unwrap_or(f64::NAN) * factor), 1),
        }
    }
}

impl Proposal for UpDownScaleProposal {
    fn name(&self) -> &str {
        "UpDownScaling"
    }

    fn nodes(&self) -> Vec<NodeId> {
        self.up.iter().chain(&self.down).map(NodeRef::id).collect()
    }

    fn propose(&mut self, dag: &mut Dag, rng: &mut dyn RngCore) -> Result<f64> {
        let u: f64 = rng.random();
        let factor = (self.lambda * (u - 0.5)).exp();

        // compute everything first so an out-of-support value changes nothing
        let mut updates = Vec::with_capacity(self.up.len() + self.down.len());
        let mut count = 0.0;
        let groups = [(&self.up, factor, 1.0), (&self.down, factor.recip(), -1.0)];
        for (group, f, sign) in groups {
            for node in group {
                let current = dag.value(node.id())?.clone();
                let (proposed, n) = Self::scaled(&current, f);
                if !dag.node(node.id())?.value_type().admits(&proposed) {
                    return Ok(f64::NEG_INFINITY);
                }
                count += sign * n as f64;
                updates.push((node.id(), current, proposed));
            }
        }

        self.stored.clear();
        for (id, current, proposed) in updates {
            self.stored.push((id, current));
            dag.set_value(id, proposed)?;
        }
        Ok(count * factor.ln())
    }

    fn undo(&mut self, dag: &mut Dag) -> Result<()> {
        for (id, value) in self.stored.drain(..) {
            dag.set_value(id, value)?;
        }
        Ok(())
    }

    fn clean(&mut self) {
        self.stored.clear();
    }

    fn tune(&mut self, acceptance_rate: f64) {
        self.lambda = tune_multiplier(self.lambda, acceptance_rate, self.target);
    }

    fn set_tune_target(&mut self, target: f64) {
        self.target = target;
    }

    fn tuning_parameter(&self) -> Option<f64> {
        Some(self.lambda)
    }

    fn replicate(&self, map: &CloneMap) -> Result<Box<dyn Proposal>> {
        let up = self.up.iter().map(|n| map_node(map, n)).collect::<Result<_>>()?;
        let down = self.down.iter().map(|n| map_node(map, n)).collect::<Result<_>>()?;
        Ok(Box::new(Self {
            up,
            down,
            lambda: self.lambda,
            target: self.target,
            stored: Vec::new(),
        }))
    }
}
