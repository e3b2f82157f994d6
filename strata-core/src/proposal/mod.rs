//! Proposals
//!
//! A [`Proposal`] is a reversible mutation of one or more stochastic nodes,
//! paired with the log Hastings ratio that corrects for its asymmetry.
//!
//! # Contract
//!
//! 1. `prepare` picks whatever the next proposal acts on.
//! 2. `propose` changes node values through [`Dag::set_value`] and returns
//!    the log Hastings ratio. Values it cannot represent in the node's type
//!    are reported as a ratio of negative infinity, leaving the node as is.
//! 3. After the move decides, either `clean` (accepted) or `undo`
//!    (rejected) runs. `undo` is the exact inverse of the value change.
//!
//! A proposal holds a [`NodeRef`] for every node it mutates, so those nodes
//! cannot be destroyed while the proposal lives.

mod scale;
mod sliding;
mod up_down;

use std::fmt;

use rand::RngCore;

pub use scale::ScaleProposal;
pub use sliding::SlidingProposal;
pub use up_down::UpDownScaleProposal;

use crate::dag::{CloneMap, Dag, NodeId, NodeRef};
use crate::error::{DagError, Result};
use crate::value::ValueType;

/// Default acceptance rate that tuning steers towards.
pub const DEFAULT_TUNE_TARGET: f64 = 0.44;

/// A reversible value mutation.
pub trait Proposal: Send + fmt::Debug {
    fn name(&self) -> &str;

    /// Nodes whose values this proposal changes.
    fn nodes(&self) -> Vec<NodeId>;

    /// Choose what to change next. Most proposals need nothing here.
    fn prepare(&mut self, _dag: &mut Dag) -> Result<()> {
        Ok(())
    }

    /// Change the values and return the log Hastings ratio.
    fn propose(&mut self, dag: &mut Dag, rng: &mut dyn RngCore) -> Result<f64>;

    /// Revert the values changed by the last `propose`.
    fn undo(&mut self, dag: &mut Dag) -> Result<()>;

    /// Forget the state kept for `undo` after an accepted step.
    fn clean(&mut self);

    /// Adjust the step size from an observed acceptance rate.
    fn tune(&mut self, acceptance_rate: f64);

    fn set_tune_target(&mut self, target: f64);

    /// Current step size, if the proposal has one.
    fn tuning_parameter(&self) -> Option<f64>;

    /// The same proposal acting on the clones of its nodes.
    fn replicate(&self, map: &CloneMap) -> Result<Box<dyn Proposal>>;
}

/// Multiplicative tuning rule shared by the scaling proposals.
///
/// Grows the parameter when the acceptance rate is above target and shrinks
/// it otherwise. Both branches equal 1 at the target.
pub fn tune_multiplier(parameter: f64, acceptance_rate: f64, target: f64) -> f64 {
    if acceptance_rate > target {
        parameter * (1.0 + (acceptance_rate - target) / (1.0 - target))
    } else {
        parameter / (2.0 - acceptance_rate / target)
    }
}

/// Look up the clone of `node` in `map`.
pub(crate) fn map_node(map: &CloneMap, node: &NodeRef) -> Result<NodeRef> {
    map.get(&node.id())
        .cloned()
        .ok_or(DagError::UnknownNode(node.id()))
}

/// Take a handle to a stochastic node of a real-valued type.
pub(crate) fn real_valued_target(dag: &Dag, id: NodeId) -> Result<NodeRef> {
    let node = dag.node(id)?;
    if !node.is_stochastic() {
        return Err(DagError::WrongKind {
            node: node.name().to_owned(),
            kind: node.kind().label(),
            expected: "stochastic",
        });
    }
    match node.value_type() {
        ValueType::Real | ValueType::PositiveReal | ValueType::Probability | ValueType::RealVector => {
            dag.retain(id)
        }
        found => Err(DagError::TypeMismatch {
            node: node.name().to_owned(),
            expected: ValueType::Real,
            found,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuning_moves_towards_target() {
        assert_eq!(tune_multiplier(1.0, 0.44, 0.44), 1.0);
        assert!(tune_multiplier(1.0, 0.9, 0.44) > 1.0);
        assert!(tune_multiplier(1.0, 0.1, 0.44) < 1.0);
        // a full acceptance rate doubles the parameter
        assert!((tune_multiplier(1.0, 1.0, 0.44) - 2.0).abs() < 1e-12);
        // a zero acceptance rate halves it
        assert_eq!(tune_multiplier(1.0, 0.0, 0.44), 0.5);
    }
}
