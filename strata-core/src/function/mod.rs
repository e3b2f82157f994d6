//! Deterministic Functions
//!
//! A [`Function`] computes a deterministic node's value from its parents'
//! values. Functions are pure: the same arguments always give the same
//! result, which is what lets the graph skip recomputation of clean nodes.
//!
//! # Type Contract
//!
//! A function declares its return type and the type expected in each
//! parameter slot. The graph checks parent types against the slots when
//! edges are created, so [`Function::compute`] may assume well-typed
//! arguments and only has to handle numerical edge cases.

mod arithmetic;

use std::fmt;

pub use arithmetic::{Add, Exp, Log, Multiply, Sum};

use crate::value::{Value, ValueType};

/// A pure computation over parent values.
pub trait Function: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Declared type of the computed value.
    fn return_type(&self) -> ValueType;

    /// Type expected in parameter slot `slot`, or `None` past the last slot.
    fn parameter_type(&self, slot: usize) -> Option<ValueType>;

    /// Whether the function takes `arity` arguments.
    fn accepts_arity(&self, arity: usize) -> bool;

    /// Compute the value. Arguments arrive in slot order.
    fn compute(&self, args: &[&Value]) -> Value;
}

type Compute = dyn Fn(&[&Value]) -> Value + Send + Sync;

/// A function backed by a closure, for one-off model pieces.
pub struct ClosureFunction {
    name: String,
    return_type: ValueType,
    parameters: Vec<ValueType>,
    compute: Box<Compute>,
}

impl ClosureFunction {
    /// Wrap `compute` as a function of `parameters.len()` arguments.
    pub fn new<F>(name: impl Into<String>, parameters: Vec<ValueType>, return_type: ValueType, compute: F) -> Self
    where
        F: Fn(&[&Value]) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            return_type,
            parameters,
            compute: Box::new(compute),
        }
    }
}

impl fmt::Debug for ClosureFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureFunction")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

impl Function for ClosureFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn return_type(&self) -> ValueType {
        self.return_type
    }

    fn parameter_type(&self, slot: usize) -> Option<ValueType> {
        self.parameters.get(slot).copied()
    }

    fn accepts_arity(&self, arity: usize) -> bool {
        arity == self.parameters.len()
    }

    fn compute(&self, args: &[&Value]) -> Value {
        (self.compute)(args)
    }
}

/// Read argument `index` as a real, NaN when missing or non-numeric.
pub(crate) fn real_arg(args: &[&Value], index: usize) -> f64 {
    args.get(index).and_then(|v| v.to_real()).unwrap_or(f64::NAN)
}
