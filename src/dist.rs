//! Gaussian temperature distribution
//!
//! Density and distribution functions for the daily-temperature model, plus
//! the degenerate-variance check that routes callers onto the fixed-
//! temperature paths.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erf;

const SQRT_2: f64 = std::f64::consts::SQRT_2;
const SQRT_2PI: f64 = 2.506628274631000502;

/// Daily temperature: either a fixed value or a Gaussian draw.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TemperatureModel {
    Fixed(f64),
    Gaussian { mu_t: f64, sigma_t: f64 },
}

impl TemperatureModel {
    /// The fixed temperature this model degenerates to, if any: an explicit
    /// `Fixed`, or a Gaussian whose variance is numerically zero.
    pub fn fixed_value(&self) -> Option<f64> {
        match *self {
            TemperatureModel::Fixed(t) => Some(t),
            TemperatureModel::Gaussian { mu_t, sigma_t } => {
                variance_is_degenerate(sigma_t).then_some(mu_t)
            }
        }
    }
}

/// Strict less-than against the smallest representable positive f64 (the
/// minimum subnormal): this gates the divide-by-sigma paths, so the
/// threshold must not be widened.
pub fn variance_is_degenerate(sigma_t: f64) -> bool {
    sigma_t < f64::from_bits(1)
}

pub fn normal_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    (-0.5 * z * z).exp() / (sigma * SQRT_2PI)
}

pub fn normal_cdf(x: f64, mu: f64, sigma: f64) -> f64 {
    0.5 * (1.0 + erf((x - mu) / (sigma * SQRT_2)))
}
