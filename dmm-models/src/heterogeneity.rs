//! Heterogeneity in exposure to mosquito bites
//!
//! Individual biting rates are log-normally distributed with variance `sigma2` on the log scale.
//! The distribution is discretised into brackets using Gauss-Hermite quadrature so that
//! each bracket has a relative biting rate `zeta` and a population weight `het_wt`.

use dmm_core::errors::{DmmError, DmmResult};
use dmm_core::timeseries::FloatValue;
use ndarray::Array1;
use std::f64::consts::PI;

const EPS: FloatValue = 3.0e-14;
/// pi^(-1/4)
const PIM4: FloatValue = 0.751_125_544_464_942_5;
const MAX_ITERATIONS: usize = 10;

/// Nodes and weights of an `n` point Gauss-Hermite rule.
///
/// Nodes are returned in descending order.
/// The weights integrate against `exp(-x^2)` so they sum to `sqrt(pi)`.
pub fn gauss_hermite(n: usize) -> DmmResult<(Array1<FloatValue>, Array1<FloatValue>)> {
    if n == 0 {
        return Err(DmmError::InvalidParameter {
            name: "het_brackets".to_string(),
            reason: "at least one heterogeneity bracket is required".to_string(),
        });
    }

    let mut nodes = Array1::zeros(n);
    let mut weights = Array1::zeros(n);
    let m = (n + 1) / 2;
    let nf = n as FloatValue;
    let mut z = (2.0 * nf + 1.0).sqrt() - 1.85575 * (2.0 * nf + 1.0).powf(-0.16667);

    for i in 0..m {
        // Initial guesses for the largest roots, then extrapolate from the previous ones
        z = match i {
            0 => z,
            1 => z - 1.14 * nf.powf(0.426) / z,
            2 => 1.86 * z - 0.86 * nodes[0],
            3 => 1.91 * z - 0.91 * nodes[1],
            _ => 2.0 * z - nodes[i - 2],
        };

        let mut derivative = 0.0;
        let mut converged = false;
        for _ in 0..MAX_ITERATIONS {
            let mut p1 = PIM4;
            let mut p2 = 0.0;
            for j in 1..=n {
                let p3 = p2;
                p2 = p1;
                let jf = j as FloatValue;
                p1 = z * (2.0 / jf).sqrt() * p2 - ((jf - 1.0) / jf).sqrt() * p3;
            }
            derivative = (2.0 * nf).sqrt() * p2;
            let previous = z;
            z = previous - p1 / derivative;
            if (z - previous).abs() <= EPS {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(DmmError::EquilibriumSolve(format!(
                "Gauss-Hermite root {} of {} did not converge",
                i + 1,
                n
            )));
        }

        nodes[i] = z;
        nodes[n - 1 - i] = -z;
        weights[i] = 2.0 / (derivative * derivative);
        weights[n - 1 - i] = weights[i];
    }

    Ok((nodes, weights))
}

/// Discretised biting heterogeneity
#[derive(Debug, Clone, PartialEq)]
pub struct Heterogeneity {
    /// Relative biting rate of each bracket
    pub zeta: Array1<FloatValue>,
    /// Fraction of the population in each bracket, summing to one
    pub het_wt: Array1<FloatValue>,
}

impl Heterogeneity {
    pub fn new(brackets: usize, sigma2: FloatValue) -> DmmResult<Self> {
        if !(sigma2.is_finite() && sigma2 >= 0.0) {
            return Err(DmmError::InvalidParameter {
                name: "sigma2".to_string(),
                reason: format!("must be non-negative, got {}", sigma2),
            });
        }
        let (nodes, weights) = gauss_hermite(brackets)?;
        let zeta = nodes.mapv(|x| (-sigma2 / 2.0 + (2.0 * sigma2).sqrt() * x).exp());
        let het_wt = weights / PI.sqrt();
        let total = het_wt.sum();
        Ok(Self {
            zeta,
            het_wt: het_wt / total,
        })
    }

    pub fn len(&self) -> usize {
        self.zeta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zeta.is_empty()
    }
}

/// Relative biting rate by age: younger (smaller) people are bitten less.
///
/// `age_days` is the representative age of each class in days.
pub fn age_biting(
    age_days: &Array1<FloatValue>,
    rho: FloatValue,
    a0: FloatValue,
) -> Array1<FloatValue> {
    age_days.mapv(|a| 1.0 - rho * (-a / a0).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use is_close::is_close;

    #[test]
    fn two_point_rule() {
        let (nodes, weights) = gauss_hermite(2).unwrap();
        assert_relative_eq!(nodes[0], 0.5_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(nodes[1], -(0.5_f64.sqrt()), epsilon = 1e-12);
        assert_relative_eq!(weights[0], PI.sqrt() / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn weights_integrate_polynomials() {
        let (nodes, weights) = gauss_hermite(5).unwrap();
        assert!(is_close!(weights.sum(), PI.sqrt()));
        // int x^2 exp(-x^2) dx = sqrt(pi) / 2
        let second_moment: f64 = nodes.iter().zip(weights.iter()).map(|(x, w)| w * x * x).sum();
        assert_relative_eq!(second_moment, PI.sqrt() / 2.0, epsilon = 1e-12);
        // Odd rules have a node at zero
        assert_relative_eq!(nodes[2], 0.0, epsilon = 1e-14);
    }

    #[test]
    fn bracket_weights_sum_to_one() {
        let het = Heterogeneity::new(9, 1.67).unwrap();
        assert_eq!(het.len(), 9);
        assert_relative_eq!(het.het_wt.sum(), 1.0, epsilon = 1e-12);
        // Mean relative biting rate is one
        let mean: f64 = het.zeta.iter().zip(het.het_wt.iter()).map(|(z, w)| z * w).sum();
        assert_relative_eq!(mean, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn no_variance_means_no_heterogeneity() {
        let het = Heterogeneity::new(3, 0.0).unwrap();
        assert!(het.zeta.iter().all(|z| *z == 1.0));
    }

    #[test]
    fn zero_brackets_are_rejected() {
        assert!(Heterogeneity::new(0, 1.67).is_err());
    }

    #[test]
    fn biting_increases_with_age() {
        let psi = age_biting(&Array1::from_vec(vec![0.0, 365.0, 3650.0]), 0.85, 2920.0);
        assert_relative_eq!(psi[0], 0.15, epsilon = 1e-12);
        assert!(psi[1] > psi[0] && psi[2] > psi[1]);
    }
}
