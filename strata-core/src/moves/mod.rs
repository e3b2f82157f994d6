//! Moves
//!
//! A move is one complete update step of a Markov chain. The
//! [`MetropolisHastingsMove`] drives a [`Proposal`](crate::proposal::Proposal)
//! through the graph's touch/keep/restore protocol and decides acceptance.

mod metropolis_hastings;

pub use metropolis_hastings::{MetropolisHastingsMove, MoveOutcome};

/// Acceptance ratios below this are rejected without drawing, since their
/// exponent underflows.
pub const LN_ACCEPTANCE_FLOOR: f64 = -300.0;
