//! Expected fitness under stochastic temperature
//!
//! Integrates instantaneous fitness against the Gaussian temperature
//! density, per (CTmin, B) cell. Two variants: "recovery" (reproduction
//! resumes after a lethal excursion) and "no-recovery" (the first day above
//! CTmax truncates reproduction for the remainder of the generation, which
//! introduces a combinatorial survival-weighting constant).

use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::curve::{ConstraintParams, TraitPoint};
use crate::dist::{normal_cdf, normal_pdf, variance_is_degenerate};
use crate::quadrature::{quad, QuadTol};

/// Whether reproduction resumes after a lethal-temperature day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryMode {
    Recovery,
    NoRecovery,
}

impl FromStr for RecoveryMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "recovery" => Ok(RecoveryMode::Recovery),
            "no-recovery" | "no_recovery" => Ok(RecoveryMode::NoRecovery),
            other => bail!("unknown recovery mode: {other} (use 'recovery' or 'no-recovery')"),
        }
    }
}

/// Integration bounds for a single cell: the fitness band [CTmin, CTmax]
/// clipped against the bulk of the temperature density. Outside ten standard
/// deviations the integrand underflows, and clipping keeps the adaptive rule
/// from hunting for a narrow density peak inside a wide band.
fn cell_bounds(point: &TraitPoint, mu_t: f64, sigma_t: f64) -> (f64, f64) {
    let lo = point.ctmin.max(mu_t - 10.0 * sigma_t);
    let hi = point.ctmax().min(mu_t + 10.0 * sigma_t);
    (lo, hi)
}

/// Single-day expected fitness: quadrature of fitness times the Gaussian
/// density over the cell's fitness band. The quadrature error estimate is
/// discarded; only the value is retained.
pub fn expected_fitness_recovery(
    params: &ConstraintParams,
    mu_t: f64,
    sigma_t: f64,
    point: TraitPoint,
    tol: QuadTol,
) -> f64 {
    let (lo, hi) = cell_bounds(&point, mu_t, sigma_t);
    let (value, _err) = quad(
        |t| params.instantaneous_fitness(point.ctmin, point.b, t) * normal_pdf(t, mu_t, sigma_t),
        lo,
        hi,
        tol,
    );
    value
}

/// Survival-weighting constant for the no-recovery model.
///
/// `r` is the probability a single day stays at or below CTmax; over `nr`
/// independent days the constant is the expected fraction of the generation
/// spent reproducing before the first lethal exposure. When `1 - r`
/// underflows below the smallest positive normal f64 the closed form
/// divides by zero, so that branch collapses to C = 1 exactly.
pub fn survival_weight(nr: u32, r: f64) -> f64 {
    let nr = nr as f64;
    if (1.0 - r) < f64::MIN_POSITIVE {
        1.0
    } else {
        (1.0 - nr * r.powf(nr - 1.0) + (nr - 1.0) * r.powf(nr)) / (nr * (1.0 - r))
            + r.powf(nr - 1.0)
    }
}

/// Expected fitness when a single lethal day ends reproduction for the
/// generation: the recovery integral scaled by the survival weighting.
pub fn expected_fitness_no_recovery(
    params: &ConstraintParams,
    mu_t: f64,
    sigma_t: f64,
    point: TraitPoint,
    tol: QuadTol,
) -> f64 {
    let integral = expected_fitness_recovery(params, mu_t, sigma_t, point, tol);
    let r = normal_cdf(point.ctmax(), mu_t, sigma_t);
    survival_weight(params.days_per_gen, r) * integral
}

/// Expected fitness for one cell under the selected model. Degenerate
/// temperature variance short-circuits to the instantaneous fitness at the
/// mean temperature; no quadrature runs on that path.
pub fn expected_fitness(
    params: &ConstraintParams,
    mode: RecoveryMode,
    mu_t: f64,
    sigma_t: f64,
    point: TraitPoint,
    tol: QuadTol,
) -> f64 {
    if variance_is_degenerate(sigma_t) {
        return params.instantaneous_fitness(point.ctmin, point.b, mu_t);
    }
    match mode {
        RecoveryMode::Recovery => expected_fitness_recovery(params, mu_t, sigma_t, point, tol),
        RecoveryMode::NoRecovery => {
            expected_fitness_no_recovery(params, mu_t, sigma_t, point, tol)
        }
    }
}

/// Dense expected-fitness field over a (CTmin, B) grid. Rows iterate B,
/// columns iterate CTmin. Built once per (temperature model, constraints,
/// recovery mode) combination and read-only afterwards.
#[derive(Clone, Debug, Serialize)]
pub struct Landscape {
    pub ctmin_axis: Vec<f64>,
    pub b_axis: Vec<f64>,
    /// Row-major: `values[i * ctmin_axis.len() + j]` for B index i, CTmin index j.
    pub values: Vec<f64>,
}

impl Landscape {
    pub fn compute(
        params: &ConstraintParams,
        mode: RecoveryMode,
        mu_t: f64,
        sigma_t: f64,
        ctmin_axis: Vec<f64>,
        b_axis: Vec<f64>,
        tol: QuadTol,
    ) -> Self {
        let mut values = Vec::with_capacity(b_axis.len() * ctmin_axis.len());
        for &b in &b_axis {
            for &ctmin in &ctmin_axis {
                values.push(expected_fitness(
                    params,
                    mode,
                    mu_t,
                    sigma_t,
                    TraitPoint::new(ctmin, b),
                    tol,
                ));
            }
        }
        Self { ctmin_axis, b_axis, values }
    }

    pub fn get(&self, b_idx: usize, ctmin_idx: usize) -> f64 {
        self.values[b_idx * self.ctmin_axis.len() + ctmin_idx]
    }

    /// Trait pair at the cell with the highest expected fitness; seeds the
    /// optimizer's local search.
    pub fn argmax(&self) -> TraitPoint {
        let mut best = 0;
        for (idx, v) in self.values.iter().enumerate() {
            if *v > self.values[best] {
                best = idx;
            }
        }
        let ncol = self.ctmin_axis.len();
        TraitPoint::new(self.ctmin_axis[best % ncol], self.b_axis[best / ncol])
    }

    pub fn max_value(&self) -> f64 {
        self.values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// `n` evenly spaced values from `lo` to `hi` inclusive.
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![lo];
    }
    (0..n)
        .map(|i| lo + (hi - lo) * (i as f64) / ((n - 1) as f64))
        .collect()
}
