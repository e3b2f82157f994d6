//! Discrete distributions.

use rand::RngCore;
use rand_distr::Distribution as _;

use super::Distribution;
use crate::function::real_arg;
use crate::value::{Value, ValueType};

/// Poisson distribution with parameter `rate`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Poisson;

/// Below this the direct sum is exact enough and cheap.
const STIRLING_CUTOFF: i64 = 32;

/// `ln(k!)`, summed directly for small `k` and by the Stirling series above.
fn ln_factorial(k: i64) -> f64 {
    if k < STIRLING_CUTOFF {
        return (2..=k).map(|i| (i as f64).ln()).sum();
    }
    let k = k as f64;
    let inv = k.recip();
    let inv2 = inv * inv;
    k * k.ln() - k + 0.5 * (2.0 * std::f64::consts::PI * k).ln()
        + inv * (1.0 / 12.0 - inv2 * (1.0 / 360.0 - inv2 / 1260.0))
}

impl Distribution for Poisson {
    fn name(&self) -> &str {
        "dnPoisson"
    }

    fn value_type(&self) -> ValueType {
        ValueType::Natural
    }

    fn parameter_types(&self) -> &[ValueType] {
        &[ValueType::PositiveReal]
    }

    fn ln_probability(&self, value: &Value, params: &[&Value]) -> f64 {
        let rate = real_arg(params, 0);
        let Some(k) = value.to_integer() else {
            return f64::NEG_INFINITY;
        };
        if k < 0 || !rate.is_finite() || rate <= 0.0 {
            return f64::NEG_INFINITY;
        }
        k as f64 * rate.ln() - rate - ln_factorial(k)
    }

    fn draw(&self, params: &[&Value], rng: &mut dyn RngCore) -> Value {
        // the sampler yields whole numbers as floats
        let drawn: f64 = rand_distr::Poisson::new(real_arg(params, 0))
            .map(|d| d.sample(rng))
            .unwrap_or(0.0);
        Value::Integer(drawn as i64)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use super::*;

    #[test]
    fn poisson_mass() {
        let rate = Value::Real(3.0);
        let lnp = Poisson.ln_probability(&Value::Integer(2), &[&rate]);
        assert!((lnp - (2.0 * 3.0f64.ln() - 3.0 - 2.0f64.ln())).abs() < 1e-12);
        assert_eq!(Poisson.ln_probability(&Value::Integer(-1), &[&rate]), f64::NEG_INFINITY);
        assert_eq!(Poisson.ln_probability(&Value::Real(1.5), &[&rate]), f64::NEG_INFINITY);
    }

    #[test]
    fn large_factorials_use_the_series() {
        let direct: f64 = (2..=40).map(|i| (i as f64).ln()).sum();
        assert!(((ln_factorial(40) - direct) / direct).abs() < 1e-12);
        assert_eq!(ln_factorial(0), 0.0);
        assert_eq!(ln_factorial(1), 0.0);

        let huge = ln_factorial(i64::MAX);
        assert!(huge.is_finite() && huge > 0.0);
        let rate = Value::Real(1e6);
        assert!(Poisson.ln_probability(&Value::Integer(1_000_000), &[&rate]).is_finite());
    }

    #[test]
    fn poisson_draws_are_natural() {
        let mut rng = Pcg64::seed_from_u64(3);
        let rate = Value::Real(4.0);
        for _ in 0..50 {
            let k = Poisson.draw(&[&rate], &mut rng);
            assert!(ValueType::Natural.admits(&k));
        }
    }
}
