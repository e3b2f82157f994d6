//! Node Values
//!
//! Every node in the graph holds a [`Value`] and declares a [`ValueType`].
//! The value is the runtime payload; the type is the contract the node makes
//! with its children.
//!
//! # Type Lattice
//!
//! Types form a small subtype lattice. A slot that expects a type accepts any
//! of its subtypes:
//!
//! ```text
//! Boolean
//! Natural  ⊂ Integer ⊂ Real
//! Probability ⊂ PositiveReal ⊂ Real
//! RealVector
//! ```
//!
//! `Natural`, `Probability` and `PositiveReal` are refinements: they share a
//! runtime representation with their supertype and are checked by range.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The declared type of a node's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Boolean,
    Natural,
    Integer,
    Probability,
    PositiveReal,
    Real,
    RealVector,
}

impl ValueType {
    /// Whether a slot of this type accepts a value declared as `other`.
    pub fn accepts(self, other: ValueType) -> bool {
        use ValueType::*;
        match (self, other) {
            (a, b) if a == b => true,
            (Integer, Natural) => true,
            (Real, Natural | Integer | Probability | PositiveReal) => true,
            (PositiveReal, Probability) => true,
            _ => false,
        }
    }

    /// Whether a value declared as `self` may be converted to `target`.
    ///
    /// Covers widening plus the numeric conversions [`Value::coerce`] attempts.
    pub fn converts_to(self, target: ValueType) -> bool {
        use ValueType::*;
        target.accepts(self)
            || matches!(
                (self, target),
                (Natural | Integer, PositiveReal | Probability)
                    | (Real | PositiveReal | Probability, Integer | Natural)
                    | (Integer, Natural)
                    | (Real, PositiveReal | Probability)
                    | (Boolean, Integer | Natural)
            )
    }

    /// Whether every value of type `self` converts to a value `target` admits.
    ///
    /// Narrower than [`converts_to`](Self::converts_to), which also allows
    /// conversions that succeed only for some values.
    pub fn widens_to(self, target: ValueType) -> bool {
        target.accepts(self) && !matches!((self, target), (ValueType::Probability, ValueType::PositiveReal))
    }

    /// Whether the runtime value satisfies this type, including range checks.
    pub fn admits(self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Boolean, Value::Boolean(_)) => true,
            (ValueType::Integer, Value::Integer(_)) => true,
            (ValueType::Natural, Value::Integer(n)) => *n >= 0,
            (ValueType::Real, Value::Real(_)) => true,
            (ValueType::PositiveReal, Value::Real(x)) => *x > 0.0,
            (ValueType::Probability, Value::Real(x)) => (0.0..=1.0).contains(x),
            (ValueType::RealVector, Value::RealVector(_)) => true,
            _ => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Boolean => "Bool",
            ValueType::Natural => "Natural",
            ValueType::Integer => "Integer",
            ValueType::Probability => "Probability",
            ValueType::PositiveReal => "RealPos",
            ValueType::Real => "Real",
            ValueType::RealVector => "Real[]",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reals in `[-2^63, 2^63)` convert to `i64` without saturating.
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// A node value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    RealVector(Vec<f64>),
}

impl Value {
    /// The most specific type this value can be declared as without
    /// range information.
    pub fn natural_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Real(_) => ValueType::Real,
            Value::RealVector(_) => ValueType::RealVector,
        }
    }

    /// Read the value as a real number. Integers widen.
    pub fn to_real(&self) -> Option<f64> {
        match self {
            Value::Real(x) => Some(*x),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn to_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Value::RealVector(v) => Some(v),
            _ => None,
        }
    }

    /// Convert this value so that `target` admits it.
    ///
    /// Only widening conversions and integral reals are permitted.
    /// Returns `None` if the conversion is not allowed.
    pub fn coerce(&self, target: ValueType) -> Option<Value> {
        if target.admits(self) {
            return Some(self.clone());
        }
        let converted = match (target, self) {
            (ValueType::Real | ValueType::PositiveReal | ValueType::Probability, Value::Integer(n)) => {
                Value::Real(*n as f64)
            }
            (ValueType::Integer | ValueType::Natural, Value::Real(x))
                if x.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(x) =>
            {
                Value::Integer(*x as i64)
            }
            (ValueType::Integer | ValueType::Natural, Value::Boolean(b)) => Value::Integer(i64::from(*b)),
            _ => return None,
        };
        target.admits(&converted).then_some(converted)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::RealVector(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Real(x) => write!(f, "{x}"),
            Value::RealVector(v) => {
                f.write_str("[ ")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{x}")?;
                }
                f.write_str(" ]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_extend_acceptance() {
        assert!(ValueType::Integer.converts_to(ValueType::Real));
        assert!(ValueType::Real.converts_to(ValueType::Integer));
        assert!(!ValueType::RealVector.converts_to(ValueType::Real));
    }

    #[test]
    fn subtypes_are_accepted() {
        assert!(ValueType::Real.accepts(ValueType::Integer));
        assert!(ValueType::Real.accepts(ValueType::Probability));
        assert!(ValueType::Integer.accepts(ValueType::Natural));
        assert!(!ValueType::Integer.accepts(ValueType::Real));
        assert!(!ValueType::RealVector.accepts(ValueType::Real));
    }

    #[test]
    fn refinements_check_range() {
        assert!(ValueType::PositiveReal.admits(&Value::Real(0.5)));
        assert!(!ValueType::PositiveReal.admits(&Value::Real(-0.5)));
        assert!(ValueType::Probability.admits(&Value::Real(1.0)));
        assert!(!ValueType::Natural.admits(&Value::Integer(-1)));
    }

    #[test]
    fn coercion_widens_integers() {
        assert_eq!(Value::Integer(3).coerce(ValueType::Real), Some(Value::Real(3.0)));
        assert_eq!(Value::Real(2.0).coerce(ValueType::Natural), Some(Value::Integer(2)));
        assert_eq!(Value::Real(2.5).coerce(ValueType::Integer), None);
        assert_eq!(Value::Integer(-2).coerce(ValueType::PositiveReal), None);
    }

    #[test]
    fn out_of_range_reals_do_not_saturate() {
        assert_eq!(Value::Real(1e19).coerce(ValueType::Integer), None);
        assert_eq!(Value::Real(-1e19).coerce(ValueType::Integer), None);
        assert_eq!(Value::Real(9_223_372_036_854_775_808.0).coerce(ValueType::Integer), None);
        assert_eq!(
            Value::Real(-9_223_372_036_854_775_808.0).coerce(ValueType::Integer),
            Some(Value::Integer(i64::MIN))
        );
        assert_eq!(Value::Real(f64::INFINITY).coerce(ValueType::Natural), None);
    }

    #[test]
    fn widening_is_lossless() {
        assert!(ValueType::Natural.widens_to(ValueType::Real));
        assert!(ValueType::Integer.widens_to(ValueType::Real));
        assert!(ValueType::PositiveReal.widens_to(ValueType::Real));
        assert!(!ValueType::Real.widens_to(ValueType::Integer));
        assert!(!ValueType::Real.widens_to(ValueType::PositiveReal));
        // zero is a probability but not a positive real
        assert!(!ValueType::Probability.widens_to(ValueType::PositiveReal));
    }

    #[test]
    fn vector_display() {
        let v = Value::RealVector(vec![1.0, 2.5]);
        assert_eq!(v.to_string(), "[ 1, 2.5 ]");
    }
}
