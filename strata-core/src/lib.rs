//! Strata Core
//!
//! This crate provides the evaluation engine behind a Bayesian model: a
//! directed acyclic graph of random variables and derived quantities, and
//! the Metropolis-Hastings machinery that samples from it.
//! It implements:
//!
//! - Lazy, transactional dependency tracking (touch, update, keep, restore)
//! - Per-node reference counting with generational handles
//! - Cycle-checked graph mutation and deep cloning for parallel chains
//! - Cached log-probability ratios for stochastic nodes
//! - Proposals and the Metropolis-Hastings move engine
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `dag`: The node arena, dirty-state machine and graph mutation
//! - `value`: Node values and the type lattice
//! - `function`: Deterministic functions computed from parent values
//! - `distribution`: Densities and samplers for stochastic nodes
//! - `proposal`: Reversible value mutations with Hastings ratios
//! - `moves`: The Metropolis-Hastings step
//! - `config`: Serde-loadable move configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strata_core::prelude::*;
//!
//! let mut dag = Dag::new();
//! let zero = dag.add_constant("zero", 0.0);
//! let one = dag.add_typed_constant("one", ValueType::PositiveReal, 1.0)?;
//!
//! // mu ~ Normal(0, 1), y ~ Normal(mu, 1) observed at 2
//! let mu = dag.add_stochastic("mu", Arc::new(Normal), &[zero.id(), one.id()], 0.0)?;
//! let y = dag.add_stochastic("y", Arc::new(Normal), &[mu.id(), one.id()], 0.0)?;
//! dag.clamp(y.id(), 2.0)?;
//!
//! let proposal = SlidingProposal::new(&dag, mu.id(), 1.0)?;
//! let mut mv = MetropolisHastingsMove::new(&dag, Box::new(proposal), MoveConfig::default())?;
//!
//! let mut rng = rand::rng();
//! for _ in 0..1000 {
//!     mv.perform_mcmc_step(&mut dag, &mut rng)?;
//! }
//! println!("mu = {}", dag.value(mu.id())?);
//! ```

pub mod config;
pub mod dag;
pub mod distribution;
pub mod error;
pub mod function;
pub mod moves;
pub mod proposal;
pub mod value;

/// The types needed to build and sample a model.
pub mod prelude {
    pub use crate::config::{Heats, MoveConfig};
    pub use crate::dag::{Dag, NodeId, NodeRef};
    pub use crate::distribution::{Distribution, Exponential, LogNormal, Normal, Poisson, Uniform};
    pub use crate::error::{DagError, ErrorKind};
    pub use crate::function::{Add, ClosureFunction, Exp, Function, Log, Multiply, Sum};
    pub use crate::moves::{MetropolisHastingsMove, MoveOutcome};
    pub use crate::proposal::{Proposal, ScaleProposal, SlidingProposal, UpDownScaleProposal};
    pub use crate::value::{Value, ValueType};
}
