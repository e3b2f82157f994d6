//! Probability Distributions
//!
//! A [`Distribution`] gives a stochastic node its density and a way to draw
//! fresh values. Parameters are the node's parents' values, in slot order.
//!
//! # Numerical Failures
//!
//! Densities never fail. A value outside the support, or a parameter outside
//! its domain, yields `f64::NEG_INFINITY` (or NaN), and the move engine
//! treats any non-finite ratio as a certain rejection.

mod continuous;
mod discrete;

use std::fmt;

use rand::RngCore;

pub use continuous::{Exponential, LogNormal, Normal, Uniform};
pub use discrete::Poisson;

use crate::value::{Value, ValueType};

/// A distribution over a node's value, conditioned on its parents.
pub trait Distribution: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Declared type of the random variable.
    fn value_type(&self) -> ValueType;

    /// Expected type of each parameter slot. The length is the arity.
    fn parameter_types(&self) -> &[ValueType];

    /// Log density (or log mass) of `value` given `params`.
    fn ln_probability(&self, value: &Value, params: &[&Value]) -> f64;

    /// Draw a value given `params`.
    fn draw(&self, params: &[&Value], rng: &mut dyn RngCore) -> Value;
}

/// `ln(sqrt(2π))`
pub(crate) const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;
