//! Scaling proposal.

use rand::{Rng, RngCore};

use super::{map_node, real_valued_target, tune_multiplier, Proposal, DEFAULT_TUNE_TARGET};
use crate::dag::{CloneMap, Dag, NodeId, NodeRef};
use crate::error::Result;
use crate::value::Value;

/// Multiplies a real value (or every element of a vector) by
/// `exp(λ(u − 0.5))` with `u ~ U(0, 1)`.
///
/// The log Hastings ratio is `n · ln(factor)` for `n` scaled elements.
#[derive(Debug, Clone)]
pub struct ScaleProposal {
    node: NodeRef,
    lambda: f64,
    target: f64,
    stored: Option<Value>,
}

impl ScaleProposal {
    pub fn new(dag: &Dag, node: NodeId, lambda: f64) -> Result<Self> {
        Ok(Self {
            node: real_valued_target(dag, node)?,
            lambda,
            target: DEFAULT_TUNE_TARGET,
            stored: None,
        })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl Proposal for ScaleProposal {
    fn name(&self) -> &str {
        "Scaling"
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.node.id()]
    }

    fn propose(&mut self, dag: &mut Dag, rng: &mut dyn RngCore) -> Result<f64> {
        let u: f64 = rng.random();
        let factor = (self.lambda * (u - 0.5)).exp();

        let current = dag.value(self.node.id())?.clone();
        let (proposed, count) = match &current {
            Value::RealVector(v) => (Value::RealVector(v.iter().map(|x| x * factor).collect()), v.len()),
            other => (Value::Real(other.to_real().unwrap_or(f64::NAN) * factor), 1),
        };
        let value_type = dag.node(self.node.id())?.value_type();
        if !value_type.admits(&proposed) {
            return Ok(f64::NEG_INFINITY);
        }

        self.stored = Some(current);
        dag.set_value(self.node.id(), proposed)?;
        Ok(count as f64 * factor.ln())
    }

    fn undo(&mut self, dag: &mut Dag) -> Result<()> {
        match self.stored.take() {
            Some(value) => dag.set_value(self.node.id(), value),
            None => Ok(()),
        }
    }

    fn clean(&mut self) {
        self.stored = None;
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
        Ok(Box::new(Self {
            node: map_node(map, &self.node)?,
            lambda: self.lambda,
            target: self.target,
            stored: None,
        }))
    }
}
