//! Arithmetic built-ins.

use super::{real_arg, Function};
use crate::value::{Value, ValueType};

/// `a + b`
#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

impl Function for Add {
    fn name(&self) -> &str {
        "add"
    }

    fn return_type(&self) -> ValueType {
        ValueType::Real
    }

    fn parameter_type(&self, slot: usize) -> Option<ValueType> {
        (slot < 2).then_some(ValueType::Real)
    }

    fn accepts_arity(&self, arity: usize) -> bool {
        arity == 2
    }

    fn compute(&self, args: &[&Value]) -> Value {
        Value::Real(real_arg(args, 0) + real_arg(args, 1))
    }
}

/// `a * b`
#[derive(Debug, Clone, Copy, Default)]
pub struct Multiply;

impl Function for Multiply {
    fn name(&self) -> &str {
        "mul"
    }

    fn return_type(&self) -> ValueType {
        ValueType::Real
    }

    fn parameter_type(&self, slot: usize) -> Option<ValueType> {
        (slot < 2).then_some(ValueType::Real)
    }

    fn accepts_arity(&self, arity: usize) -> bool {
        arity == 2
    }

    fn compute(&self, args: &[&Value]) -> Value {
        Value::Real(real_arg(args, 0) * real_arg(args, 1))
    }
}

/// `e^x`
#[derive(Debug, Clone, Copy, Default)]
pub struct Exp;

impl Function for Exp {
    fn name(&self) -> &str {
        "exp"
    }

    fn return_type(&self) -> ValueType {
        ValueType::PositiveReal
    }

    fn parameter_type(&self, slot: usize) -> Option<ValueType> {
        (slot == 0).then_some(ValueType::Real)
    }

    fn accepts_arity(&self, arity: usize) -> bool {
        arity == 1
    }

    fn compute(&self, args: &[&Value]) -> Value {
        Value::Real(real_arg(args, 0).exp())
    }
}

/// Natural logarithm of a positive real.
#[derive(Debug, Clone, Copy, Default)]
pub struct Log;

impl Function for Log {
    fn name(&self) -> &str {
        "ln"
    }

    fn return_type(&self) -> ValueType {
        ValueType::Real
    }

    fn parameter_type(&self, slot: usize) -> Option<ValueType> {
        (slot == 0).then_some(ValueType::PositiveReal)
    }

    fn accepts_arity(&self, arity: usize) -> bool {
        arity == 1
    }

    fn compute(&self, args: &[&Value]) -> Value {
        Value::Real(real_arg(args, 0).ln())
    }
}

/// Sum of one or more reals.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Function for Sum {
    fn name(&self) -> &str {
        "sum"
    }

    fn return_type(&self) -> ValueType {
        ValueType::Real
    }

    fn parameter_type(&self, _slot: usize) -> Option<ValueType> {
        Some(ValueType::Real)
    }

    fn accepts_arity(&self, arity: usize) -> bool {
        arity >= 1
    }

    fn compute(&self, args: &[&Value]) -> Value {
        Value::Real((0..args.len()).map(|i| real_arg(args, i)).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_operators() {
        let (a, b) = (Value::Real(1.5), Value::Integer(2));
        assert_eq!(Add.compute(&[&a, &b]), Value::Real(3.5));
        assert_eq!(Multiply.compute(&[&a, &b]), Value::Real(3.0));
        assert!(Add.parameter_type(2).is_none());
    }

    #[test]
    fn exp_and_log() {
        let zero = Value::Real(0.0);
        assert_eq!(Exp.compute(&[&zero]), Value::Real(1.0));
        assert_eq!(Exp.return_type(), ValueType::PositiveReal);
        let one = Value::Real(1.0);
        assert_eq!(Log.compute(&[&one]), Value::Real(0.0));
        assert!(!Log.parameter_type(0).is_some_and(|t| t.accepts(ValueType::Real)));
    }

    #[test]
    fn sum_is_variadic() {
        let values = [Value::Real(1.0), Value::Real(2.0), Value::Integer(3)];
        let args: Vec<&Value> = values.iter().collect();
        assert_eq!(Sum.compute(&args), Value::Real(6.0));
        assert!(!Sum.accepts_arity(0));
        assert!(Sum.accepts_arity(5));
    }
}
