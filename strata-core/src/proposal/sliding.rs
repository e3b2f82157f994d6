//! Sliding-window proposal.

use rand::{Rng, RngCore};

use super::{map_node, real_valued_target, tune_multiplier, Proposal, DEFAULT_TUNE_TARGET};
use crate::dag::{CloneMap, Dag, NodeId, NodeRef};
use crate::error::Result;
use crate::value::{Value, ValueType};

/// Adds `δ(u − 0.5)` with `u ~ U(0, 1)` to a real value, or to every element
/// of a vector.
///
/// The window is symmetric, so the log Hastings ratio is 0. For refined
/// types the proposal reflects at the bounds, which keeps it symmetric.
#[derive(Debug, Clone)]
pub struct SlidingProposal {
    node: NodeRef,
    delta: f64,
    target: f64,
    stored: Option<Value>,
}

impl SlidingProposal {
    pub fn new(dag: &Dag, node: NodeId, delta: f64) -> Result<Self> {
        Ok(Self {
            node: real_valued_target(dag, node)?,
            delta,
            target: DEFAULT_TUNE_TARGET,
            stored: None,
        })
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }
}

/// Fold `x` back into the support of `value_type`.
fn reflect(mut x: f64, value_type: ValueType) -> f64 {
    match value_type {
        ValueType::PositiveReal => x.abs(),
        ValueType::Probability => {
            // bounded number of folds for finite inputs
            for _ in 0..64 {
                if x < 0.0 {
                    x = -x;
                } else if x > 1.0 {
                    x = 2.0 - x;
                } else {
                    break;
                }
            }
            x
        }
        _ => x,
    }
}

impl Proposal for SlidingProposal {
    fn name(&self) -> &str {
        "Sliding"
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.node.id()]
    }

    fn propose(&mut self, dag: &mut Dag, rng: &mut dyn RngCore) -> Result<f64> {
        let value_type = dag.node(self.node.id())?.value_type();
        let current = dag.value(self.node.id())?.clone();
        let proposed = match &current {
            Value::RealVector(v) => Value::RealVector(
                v.iter()
                    .map(|x| x + self.delta * (rng.random::<f64>() - 0.5))
                    .collect(),
            ),
            other => {
                let x = other.to_real().unwrap_or(f64::NAN) + self.delta * (rng.random::<f64>() - 0.5);
                Value::Real(reflect(x, value_type))
            }
        };
        if !value_type.admits(&proposed) {
            return Ok(f64::NEG_INFINITY);
        }

        self.stored = Some(current);
        dag.set_value(self.node.id(), proposed)?;
        Ok(0.0)
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
        self.delta = tune_multiplier(self.delta, acceptance_rate, self.target);
    }

    fn set_tune_target(&mut self, target: f64) {
        self.target = target;
    }

    fn tuning_parameter(&self) -> Option<f64> {
        Some(self.delta)
    }

    fn replicate(&self, map: &CloneMap) -> Result<Box<dyn Proposal>> {
        Ok(Box::new(Self {
            node: map_node(map, &self.node)?,
            delta: self.delta,
            target: self.target,
            stored: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use super::*;
    use crate::distribution::{Exponential, Normal};

    #[test]
    fn window_stays_within_delta() {
        let mut dag = Dag::new();
        let mu = dag.add_constant("mu", 0.0);
        let sd = dag.add_typed_constant("sd", ValueType::PositiveReal, 1.0).unwrap();
        let x = dag.add_stochastic("x", Arc::new(Normal), &[mu.id(), sd.id()], 1.0).unwrap();
        let mut proposal = SlidingProposal::new(&dag, x.id(), 0.5).unwrap();
        let mut rng = Pcg64::seed_from_u64(9);

        for _ in 0..20 {
            let ln_hastings = proposal.propose(&mut dag, &mut rng).unwrap();
            assert_eq!(ln_hastings, 0.0);
            let proposed = dag.value(x.id()).unwrap().to_real().unwrap();
            assert!((proposed - 1.0).abs() <= 0.25);
            proposal.undo(&mut dag).unwrap();
            dag.restore(x.id()).unwrap();
            assert_eq!(dag.value(x.id()).unwrap(), &Value::Real(1.0));
        }
    }

    #[test]
    fn positive_values_are_reflected() {
        let mut dag = Dag::new();
        let rate = dag.add_typed_constant("rate", ValueType::PositiveReal, 1.0).unwrap();
        let x = dag.add_stochastic("x", Arc::new(Exponential), &[rate.id()], 0.01).unwrap();
        let mut proposal = SlidingProposal::new(&dag, x.id(), 10.0).unwrap();
        let mut rng = Pcg64::seed_from_u64(5);

        for _ in 0..20 {
            proposal.propose(&mut dag, &mut rng).unwrap();
            assert!(dag.value(x.id()).unwrap().to_real().unwrap() > 0.0);
            proposal.clean();
            dag.keep(x.id()).unwrap();
        }
    }

    #[test]
    fn reflection_folds_into_the_unit_interval() {
        assert_eq!(reflect(-0.25, ValueType::Probability), 0.25);
        assert_eq!(reflect(1.25, ValueType::Probability), 0.75);
        assert_eq!(reflect(-2.5, ValueType::Real), -2.5);
    }
}
