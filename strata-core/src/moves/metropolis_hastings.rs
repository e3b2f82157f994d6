//! Metropolis-Hastings Move
//!
//! # How a Step Works
//!
//! 1. The proposal prepares and then changes its nodes, returning the log
//!    Hastings ratio.
//! 2. The move touches its nodes, which stashes their pre-step state and
//!    propagates the touch through the graph.
//! 3. The log-probability ratio is summed over the changed nodes and every
//!    stochastic node whose density depends on them. Clamped nodes count
//!    towards the likelihood, free ones towards the prior. Summation stops
//!    as soon as a partial sum is non-finite.
//! 4. The heated posterior ratio plus the Hastings ratio decides acceptance.
//! 5. Accepted: every touched node is kept. Rejected: the proposal is undone
//!    and every touched node restored, leaving the graph value-identical to
//!    its state before the step.
//!
//! Non-finite ratios are never errors. They are an ordinary rejection.

use indexmap::IndexSet;
use rand::{Rng, RngCore};
use tracing::{debug, trace, warn};

use super::LN_ACCEPTANCE_FLOOR;
use crate::config::MoveConfig;
use crate::dag::{CloneMap, Dag, NodeId, NodeRef};
use crate::error::Result;
use crate::proposal::{map_node, Proposal};

/// What happened during one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    pub accepted: bool,
    pub ln_hastings_ratio: f64,
    pub ln_prior_ratio: f64,
    pub ln_likelihood_ratio: f64,
    /// Heated posterior ratio.
    pub ln_posterior_ratio: f64,
}

/// A Metropolis-Hastings move wrapping a proposal.
#[derive(Debug)]
pub struct MetropolisHastingsMove {
    proposal: Box<dyn Proposal>,
    /// Handles to the nodes the proposal changes.
    nodes: Vec<NodeRef>,
    config: MoveConfig,
    num_tried_total: u64,
    num_accepted_total: u64,
    num_tried_current_period: u64,
    num_accepted_current_period: u64,
}

impl MetropolisHastingsMove {
    /// Wrap `proposal`, taking a handle to each node it changes.
    pub fn new(dag: &Dag, mut proposal: Box<dyn Proposal>, config: MoveConfig) -> Result<Self> {
        let nodes = proposal
            .nodes()
            .into_iter()
            .map(|id| dag.retain(id))
            .collect::<Result<Vec<_>>>()?;
        proposal.set_tune_target(config.tune_target);
        Ok(Self {
            proposal,
            nodes,
            config,
            num_tried_total: 0,
            num_accepted_total: 0,
            num_tried_current_period: 0,
            num_accepted_current_period: 0,
        })
    }

    pub fn proposal(&self) -> &dyn Proposal {
        self.proposal.as_ref()
    }

    pub fn config(&self) -> &MoveConfig {
        &self.config
    }

    pub fn weight(&self) -> f64 {
        self.config.weight
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(NodeRef::id)
    }

    pub fn num_tried(&self) -> u64 {
        self.num_tried_total
    }

    pub fn num_accepted(&self) -> u64 {
        self.num_accepted_total
    }

    pub fn num_tried_current_period(&self) -> u64 {
        self.num_tried_current_period
    }

    pub fn num_accepted_current_period(&self) -> u64 {
        self.num_accepted_current_period
    }

    /// Acceptance rate over the current tuning period, if anything was tried.
    pub fn acceptance_rate(&self) -> Option<f64> {
        (self.num_tried_current_period > 0)
            .then(|| self.num_accepted_current_period as f64 / self.num_tried_current_period as f64)
    }

    /// Start a new tuning period.
    pub fn reset_period(&mut self) {
        self.num_tried_current_period = 0;
        self.num_accepted_current_period = 0;
    }

    /// Tune the proposal from the current period and start a new one.
    ///
    /// Does nothing when auto-tuning is off or nothing was tried.
    pub fn auto_tune(&mut self) {
        if !self.config.auto_tune {
            return;
        }
        let Some(rate) = self.acceptance_rate() else {
            return;
        };
        let before = self.proposal.tuning_parameter();
        self.proposal.tune(rate);
        debug!(
            proposal = self.proposal.name(),
            rate,
            ?before,
            after = ?self.proposal.tuning_parameter(),
            "tuned proposal"
        );
        self.reset_period();
    }

    /// Perform one Metropolis-Hastings step.
    pub fn perform_mcmc_step(&mut self, dag: &mut Dag, rng: &mut dyn RngCore) -> Result<MoveOutcome> {
        let (ln_hastings_ratio, evaluated) = self.propose(dag, rng)?;
        let (ln_prior_ratio, ln_likelihood_ratio) = ratios(dag, &evaluated)?;
        let ln_posterior_ratio = self
            .config
            .heats
            .ln_posterior_ratio(ln_prior_ratio, ln_likelihood_ratio);

        let accepted = if !ln_hastings_ratio.is_finite() {
            warn!(
                proposal = self.proposal.name(),
                ln_hastings_ratio, "non-finite Hastings ratio"
            );
            false
        } else if !ln_posterior_ratio.is_finite() {
            false
        } else {
            let ln_acceptance_ratio = ln_posterior_ratio + ln_hastings_ratio;
            if ln_acceptance_ratio >= 0.0 {
                true
            } else if ln_acceptance_ratio < LN_ACCEPTANCE_FLOOR {
                false
            } else {
                rng.random::<f64>() < ln_acceptance_ratio.exp()
            }
        };

        let outcome = MoveOutcome {
            accepted,
            ln_hastings_ratio,
            ln_prior_ratio,
            ln_likelihood_ratio,
            ln_posterior_ratio,
        };
        self.finish(dag, &evaluated, outcome)
    }

    /// Perform one greedy step: accept only if the heated posterior does not
    /// decrease. The Hastings ratio is ignored.
    pub fn perform_hill_climbing_step(
        &mut self,
        dag: &mut Dag,
        rng: &mut dyn RngCore,
    ) -> Result<MoveOutcome> {
        let (ln_hastings_ratio, evaluated) = self.propose(dag, rng)?;
        let (ln_prior_ratio, ln_likelihood_ratio) = ratios(dag, &evaluated)?;
        let ln_posterior_ratio = self
            .config
            .heats
            .ln_posterior_ratio(ln_prior_ratio, ln_likelihood_ratio);

        let outcome = MoveOutcome {
            accepted: ln_posterior_ratio.is_finite() && ln_posterior_ratio >= 0.0,
            ln_hastings_ratio,
            ln_prior_ratio,
            ln_likelihood_ratio,
            ln_posterior_ratio,
        };
        self.finish(dag, &evaluated, outcome)
    }

    /// The same move on a cloned graph, with fresh counters.
    pub fn replicate(&self, map: &CloneMap) -> Result<Self> {
        let nodes = self
            .nodes
            .iter()
            .map(|n| map_node(map, n))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            proposal: self.proposal.replicate(map)?,
            nodes,
            config: self.config.clone(),
            num_tried_total: 0,
            num_accepted_total: 0,
            num_tried_current_period: 0,
            num_accepted_current_period: 0,
        })
    }

    // ------------------------------------------------------------------------
    // Step internals
    // ------------------------------------------------------------------------

    /// Run the proposal, touch the move's nodes and collect every stochastic
    /// node whose ratio must be evaluated.
    fn propose(&mut self, dag: &mut Dag, rng: &mut dyn RngCore) -> Result<(f64, IndexSet<NodeId>)> {
        self.proposal.prepare(dag)?;
        let ln_hastings_ratio = self.proposal.propose(dag, rng)?;

        let mut evaluated = IndexSet::new();
        for node in &self.nodes {
            let id = node.id();
            if !dag.is_touched(id)? {
                dag.touch(id)?;
            }
            if dag.node(id)?.is_stochastic() {
                evaluated.insert(id);
            }
        }
        for node in &self.nodes {
            dag.affected_nodes(node.id(), &mut evaluated)?;
        }
        Ok((ln_hastings_ratio, evaluated))
    }

    /// Commit or roll back, then count the step.
    fn finish(
        &mut self,
        dag: &mut Dag,
        evaluated: &IndexSet<NodeId>,
        outcome: MoveOutcome,
    ) -> Result<MoveOutcome> {
        let touched = self.nodes.iter().map(NodeRef::id).chain(evaluated.iter().copied());
        let touched: Vec<NodeId> = touched.collect();

        if outcome.accepted {
            for id in touched {
                if dag.is_touched(id)? {
                    dag.keep(id)?;
                }
            }
            self.proposal.clean();
            self.num_accepted_total += 1;
            self.num_accepted_current_period += 1;
        } else {
            self.proposal.undo(dag)?;
            for id in touched {
                if dag.is_touched(id)? {
                    dag.restore(id)?;
                }
            }
        }
        self.num_tried_total += 1;
        self.num_tried_current_period += 1;

        trace!(
            proposal = self.proposal.name(),
            ln_hastings = outcome.ln_hastings_ratio,
            ln_posterior = outcome.ln_posterior_ratio,
            accepted = outcome.accepted,
            "mh step"
        );
        Ok(outcome)
    }
}

/// Sum the probability ratios into prior and likelihood parts.
///
/// Stops at the first non-finite partial sum.
fn ratios(dag: &mut Dag, evaluated: &IndexSet<NodeId>) -> Result<(f64, f64)> {
    let mut ln_prior_ratio = 0.0;
    let mut ln_likelihood_ratio = 0.0;
    for &id in evaluated {
        let ratio = dag.ln_probability_ratio(id)?;
        if dag.is_clamped(id)? {
            ln_likelihood_ratio += ratio;
        } else {
            ln_prior_ratio += ratio;
        }
        if !ln_prior_ratio.is_finite() || !ln_likelihood_ratio.is_finite() {
            break;
        }
    }
    Ok((ln_prior_ratio, ln_likelihood_ratio))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use super::*;
    use crate::config::Heats;
    use crate::distribution::{Exponential, Normal};
    use crate::proposal::{ScaleProposal, SlidingProposal};
    use crate::value::{Value, ValueType};

    /// mu ~ Normal(0, 1), one observation y ~ Normal(mu, 1) clamped at 2.
    fn model() -> (Dag, NodeRef, NodeRef) {
        let mut dag = Dag::new();
        let zero = dag.add_constant("zero", 0.0);
        let one = dag.add_typed_constant("one", ValueType::PositiveReal, 1.0).unwrap();
        let mu = dag.add_stochastic("mu", Arc::new(Normal), &[zero.id(), one.id()], 0.0).unwrap();
        let y = dag.add_stochastic("y", Arc::new(Normal), &[mu.id(), one.id()], 0.0).unwrap();
        dag.clamp(y.id(), 2.0).unwrap();
        (dag, mu, y)
    }

    #[test]
    fn ratios_are_partitioned_by_clamping() {
        let (mut dag, mu, _y) = model();
        let proposal = SlidingProposal::new(&dag, mu.id(), 1.0).unwrap();
        let mut mv = MetropolisHastingsMove::new(&dag, Box::new(proposal), MoveConfig::default()).unwrap();
        let mut rng = Pcg64::seed_from_u64(17);

        let outcome = mv.perform_mcmc_step(&mut dag, &mut rng).unwrap();
        let expected_sum = outcome.ln_prior_ratio + outcome.ln_likelihood_ratio;
        assert!((outcome.ln_posterior_ratio - expected_sum).abs() < 1e-12);
        assert_eq!(outcome.ln_hastings_ratio, 0.0);
        assert_eq!(mv.num_tried(), 1);
        assert!(!dag.is_touched(mu.id()).unwrap());
    }

    #[test]
    fn hill_climbing_only_goes_up() {
        let (mut dag, mu, _y) = model();
        let proposal = SlidingProposal::new(&dag, mu.id(), 0.5).unwrap();
        let mut mv = MetropolisHastingsMove::new(&dag, Box::new(proposal), MoveConfig::default()).unwrap();
        let mut rng = Pcg64::seed_from_u64(23);

        let mut best = dag.ln_probability_total().unwrap();
        for _ in 0..50 {
            mv.perform_hill_climbing_step(&mut dag, &mut rng).unwrap();
            let current = dag.ln_probability_total().unwrap();
            assert!(current >= best - 1e-9);
            best = current;
        }
        // the posterior mode of this model is at 1
        let m = dag.value(mu.id()).unwrap().to_real().unwrap();
        assert!((m - 1.0).abs() < 0.5);
    }

    #[test]
    fn zero_likelihood_heat_ignores_the_data() {
        let (mut dag, mu, _y) = model();
        let proposal = ScaleProposal::new(&dag, mu.id(), 1.0).unwrap();
        let config = MoveConfig {
            heats: Heats {
                likelihood: 0.0,
                ..Heats::default()
            },
            ..MoveConfig::default()
        };
        let mut mv = MetropolisHastingsMove::new(&dag, Box::new(proposal), config).unwrap();
        dag.set_value(mu.id(), 0.5).unwrap();
        dag.keep(mu.id()).unwrap();
        let mut rng = Pcg64::seed_from_u64(2);

        let outcome = mv.perform_mcmc_step(&mut dag, &mut rng).unwrap();
        assert!((outcome.ln_posterior_ratio - outcome.ln_prior_ratio).abs() < 1e-12);
    }

    #[test]
    fn extreme_proposals_are_rejected() {
        let mut dag = Dag::new();
        let rate = dag.add_typed_constant("rate", ValueType::PositiveReal, 1.0).unwrap();
        let x = dag.add_stochastic("x", Arc::new(Exponential), &[rate.id()], 0.5).unwrap();

        // factors overflow to infinity or underflow to zero for most draws
        let proposal = ScaleProposal::new(&dag, x.id(), 2000.0).unwrap();
        let mut mv = MetropolisHastingsMove::new(&dag, Box::new(proposal), MoveConfig::default()).unwrap();
        let mut rng = Pcg64::seed_from_u64(4);
        for _ in 0..20 {
            mv.perform_mcmc_step(&mut dag, &mut rng).unwrap();
            assert!(!dag.is_touched(x.id()).unwrap());
            assert!(dag.ln_probability(x.id()).unwrap().is_finite());
        }
        assert_eq!(mv.num_tried(), 20);
    }

    #[test]
    fn auto_tune_resets_the_period() {
        let (mut dag, mu, _y) = model();
        let proposal = SlidingProposal::new(&dag, mu.id(), 1.0).unwrap();
        let mut mv = MetropolisHastingsMove::new(&dag, Box::new(proposal), MoveConfig::default()).unwrap();
        let mut rng = Pcg64::seed_from_u64(8);

        assert_eq!(mv.acceptance_rate(), None);
        for _ in 0..10 {
            mv.perform_mcmc_step(&mut dag, &mut rng).unwrap();
        }
        let rate = mv.acceptance_rate().unwrap();
        let expected = crate::proposal::tune_multiplier(1.0, rate, 0.44);
        mv.auto_tune();
        assert_eq!(mv.proposal().tuning_parameter(), Some(expected));
        assert_eq!(mv.num_tried_current_period(), 0);
        assert_eq!(mv.num_tried(), 10);

        let mut fixed = MetropolisHastingsMove::new(
            &dag,
            Box::new(SlidingProposal::new(&dag, mu.id(), 1.0).unwrap()),
            MoveConfig {
                auto_tune: false,
                ..MoveConfig::default()
            },
        )
        .unwrap();
        fixed.perform_mcmc_step(&mut dag, &mut rng).unwrap();
        fixed.auto_tune();
        assert_eq!(fixed.proposal().tuning_parameter(), Some(1.0));
        assert_eq!(fixed.num_tried_current_period(), 1);
    }

    #[test]
    fn moves_hold_their_nodes() {
        let (dag, mu, _y) = model();
        let before = dag.reference_count(mu.id()).unwrap();
        let proposal = ScaleProposal::new(&dag, mu.id(), 1.0).unwrap();
        let mv = MetropolisHastingsMove::new(&dag, Box::new(proposal), MoveConfig::default()).unwrap();
        assert_eq!(dag.reference_count(mu.id()).unwrap(), before + 2);
        assert_eq!(mv.nodes().collect::<Vec<_>>(), vec![mu.id()]);
        drop(mv);
        assert_eq!(dag.reference_count(mu.id()).unwrap(), before);
        assert_eq!(dag.node(mu.id()).unwrap().current_value(), &Value::Real(0.0));
    }
}
