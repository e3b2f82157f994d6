//! Continuous distributions.

use rand::RngCore;
use rand_distr::Distribution as _;

use super::{Distribution, LN_SQRT_2PI};
use crate::function::real_arg;
use crate::value::{Value, ValueType};

fn positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

/// Normal distribution with parameters `mean` and `sd`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normal;

impl Distribution for Normal {
    fn name(&self) -> &str {
        "dnNormal"
    }

    fn value_type(&self) -> ValueType {
        ValueType::Real
    }

    fn parameter_types(&self) -> &[ValueType] {
        &[ValueType::Real, ValueType::PositiveReal]
    }

    fn ln_probability(&self, value: &Value, params: &[&Value]) -> f64 {
        let (mean, sd) = (real_arg(params, 0), real_arg(params, 1));
        let x = value.to_real().unwrap_or(f64::NAN);
        if !positive(sd) {
            return f64::NEG_INFINITY;
        }
        let z = (x - mean) / sd;
        -LN_SQRT_2PI - sd.ln() - 0.5 * z * z
    }

    fn draw(&self, params: &[&Value], rng: &mut dyn RngCore) -> Value {
        let drawn = rand_distr::Normal::new(real_arg(params, 0), real_arg(params, 1))
            .map(|d| d.sample(rng))
            .unwrap_or(f64::NAN);
        Value::Real(drawn)
    }
}

/// Log-normal distribution. `mean` and `sd` are on the log scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNormal;

impl Distribution for LogNormal {
    fn name(&self) -> &str {
        "dnLognormal"
    }

    fn value_type(&self) -> ValueType {
        ValueType::PositiveReal
    }

    fn parameter_types(&self) -> &[ValueType] {
        &[ValueType::Real, ValueType::PositiveReal]
    }

    fn ln_probability(&self, value: &Value, params: &[&Value]) -> f64 {
        let (mean, sd) = (real_arg(params, 0), real_arg(params, 1));
        let x = value.to_real().unwrap_or(f64::NAN);
        if !positive(sd) || !positive(x) {
            return f64::NEG_INFINITY;
        }
        let z = (x.ln() - mean) / sd;
        -x.ln() - LN_SQRT_2PI - sd.ln() - 0.5 * z * z
    }

    fn draw(&self, params: &[&Value], rng: &mut dyn RngCore) -> Value {
        let drawn = rand_distr::LogNormal::new(real_arg(params, 0), real_arg(params, 1))
            .map(|d| d.sample(rng))
            .unwrap_or(f64::NAN);
        Value::Real(drawn)
    }
}

/// Exponential distribution with parameter `rate`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exponential;

impl Distribution for Exponential {
    fn name(&self) -> &str {
        "dnExponential"
    }

    fn value_type(&self) -> ValueType {
        ValueType::PositiveReal
    }

    fn parameter_types(&self) -> &[ValueType] {
        &[ValueType::PositiveReal]
    }

    fn ln_probability(&self, value: &Value, params: &[&Value]) -> f64 {
        let rate = real_arg(params, 0);
        let x = value.to_real().unwrap_or(f64::NAN);
        if !positive(rate) || x.is_nan() || x < 0.0 {
            return f64::NEG_INFINITY;
        }
        rate.ln() - rate * x
    }

    fn draw(&self, params: &[&Value], rng: &mut dyn RngCore) -> Value {
        let drawn = rand_distr::Exp::new(real_arg(params, 0))
            .map(|d| d.sample(rng))
            .unwrap_or(f64::NAN);
        Value::Real(drawn)
    }
}

/// Uniform distribution on `[lower, upper]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uniform;

impl Distribution for Uniform {
    fn name(&self) -> &str {
        "dnUniform"
    }

    fn value_type(&self) -> ValueType {
        ValueType::Real
    }

    fn parameter_types(&self) -> &[ValueType] {
        &[ValueType::Real, ValueType::Real]
    }

    fn ln_probability(&self, value: &Value, params: &[&Value]) -> f64 {
        let (lower, upper) = (real_arg(params, 0), real_arg(params, 1));
        let x = value.to_real().unwrap_or(f64::NAN);
        if lower < upper && (lower..=upper).contains(&x) {
            -(upper - lower).ln()
        } else {
            f64::NEG_INFINITY
        }
    }

    fn draw(&self, params: &[&Value], rng: &mut dyn RngCore) -> Value {
        let drawn = rand_distr::Uniform::new_inclusive(real_arg(params, 0), real_arg(params, 1))
            .map(|d| d.sample(rng))
            .unwrap_or(f64::NAN);
        Value::Real(drawn)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use super::*;

    fn real(x: f64) -> Value {
        Value::Real(x)
    }

    #[test]
    fn normal_density() {
        let (mean, sd) = (real(0.0), real(1.0));
        let at_zero = Normal.ln_probability(&real(0.0), &[&mean, &sd]);
        assert!((at_zero + LN_SQRT_2PI).abs() < 1e-15);
        let at_two = Normal.ln_probability(&real(2.0), &[&mean, &sd]);
        assert!((at_zero - at_two - 2.0).abs() < 1e-12);
        assert_eq!(Normal.ln_probability(&real(0.0), &[&mean, &real(0.0)]), f64::NEG_INFINITY);
    }

    #[test]
    fn lognormal_support() {
        let (mean, sd) = (real(0.0), real(1.0));
        assert_eq!(LogNormal.ln_probability(&real(-1.0), &[&mean, &sd]), f64::NEG_INFINITY);
        let at_one = LogNormal.ln_probability(&real(1.0), &[&mean, &sd]);
        assert!((at_one + LN_SQRT_2PI).abs() < 1e-15);
    }

    #[test]
    fn exponential_density() {
        let rate = real(2.0);
        let lnp = Exponential.ln_probability(&real(1.5), &[&rate]);
        assert!((lnp - (2.0f64.ln() - 3.0)).abs() < 1e-12);
        assert_eq!(Exponential.ln_probability(&real(-0.1), &[&rate]), f64::NEG_INFINITY);
    }

    #[test]
    fn uniform_density() {
        let (lower, upper) = (real(-1.0), real(3.0));
        let lnp = Uniform.ln_probability(&real(0.0), &[&lower, &upper]);
        assert!((lnp + 4.0f64.ln()).abs() < 1e-12);
        assert_eq!(Uniform.ln_probability(&real(3.5), &[&lower, &upper]), f64::NEG_INFINITY);
    }

    #[test]
    fn draws_land_in_the_support() {
        let mut rng = Pcg64::seed_from_u64(42);
        let (lower, upper) = (real(-1.0), real(3.0));
        let (mean, sd) = (real(0.0), real(1.0));
        for _ in 0..100 {
            let u = Uniform.draw(&[&lower, &upper], &mut rng);
            assert!(Uniform.ln_probability(&u, &[&lower, &upper]).is_finite());
            let x = LogNormal.draw(&[&mean, &sd], &mut rng);
            assert!(x.to_real().is_some_and(|x| x > 0.0));
            let e = Exponential.draw(&[&sd], &mut rng);
            assert!(e.to_real().is_some_and(|x| x >= 0.0));
        }
        assert!(Normal.draw(&[&mean, &sd], &mut rng).to_real().is_some_and(f64::is_finite));
    }
}
