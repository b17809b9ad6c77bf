//! Analytic gradient layer
//!
//! Partial derivatives of every fitness component with respect to the two
//! evolvable traits, assembled strictly by sum/product/chain rule: each
//! derivative of a product expands into sum-of-products form with exactly
//! one factor differentiated at a time. The landscape optimizer and the
//! trajectory integrator both consume these instead of finite differences.
//!
//! Gradient vectors follow the trait-state ordering `[d/dCTmin, d/dB]`.

use crate::curve::{classify, enzymatic_response, ConstraintParams, ThermalRegion, TraitPoint};
use crate::dist::{normal_cdf, normal_pdf};
use crate::expectation::{expected_fitness_recovery, survival_weight};
use crate::quadrature::{quad, QuadTol};

impl ConstraintParams {
    /// d(breadth penalty)/dB, via the sigmoid identity s' = s(1-s).
    pub fn d_breadth_penalty_db(&self, b: f64) -> f64 {
        let s = self.breadth_penalty(b);
        -1.0 / self.delta_b * s * (1.0 - s)
    }

    /// d(cold penalty)/dCTmin.
    pub fn d_cold_penalty_dctmin(&self, ctmin: f64) -> f64 {
        let s = self.cold_penalty(ctmin);
        1.0 / self.delta_ctmin * s * (1.0 - s)
    }

    /// d(heat penalty)/dB = d(heat penalty)/dCTmin, since CTmax = CTmin + B
    /// moves one-for-one with either trait.
    pub fn d_heat_penalty(&self, ctmax: f64) -> f64 {
        let s = self.heat_penalty(ctmax);
        -1.0 / self.delta_ctmax * s * (1.0 - s)
    }
}

/// d(enzymatic response)/dB, piecewise on the same three temperature
/// regions as the response itself; the Beyond arm is exactly zero.
pub fn d_enzymatic_db(ctmin: f64, b: f64, t: f64) -> f64 {
    let q = 3.0 * t - 3.0 * ctmin - 2.0 * b;
    match classify(ctmin, b, t) {
        ThermalRegion::Rising => {
            (-(q / b) * (q / b)).exp() * 6.0 * q * (t - ctmin) / (b * b * b)
        }
        ThermalRegion::Falling => 6.0 * (t - ctmin) * q / (b * b * b),
        ThermalRegion::Beyond => 0.0,
    }
}

/// d(enzymatic response)/dCTmin, same three-region case analysis.
pub fn d_enzymatic_dctmin(ctmin: f64, b: f64, t: f64) -> f64 {
    let q = 3.0 * t - 3.0 * ctmin - 2.0 * b;
    match classify(ctmin, b, t) {
        ThermalRegion::Rising => 6.0 * (-(q * q) / (b * b)).exp() * q / (b * b),
        ThermalRegion::Falling => 6.0 * q / (b * b),
        ThermalRegion::Beyond => 0.0,
    }
}

/// d(instantaneous fitness)/dB. The cold penalty does not depend on B and
/// is pulled out of the three-term product-rule expansion.
pub fn d_fitness_db(params: &ConstraintParams, ctmin: f64, b: f64, t: f64) -> f64 {
    let ctmax = ctmin + b;
    let enz = enzymatic_response(ctmin, b, t);
    let w_b = params.breadth_penalty(b);
    let w_heat = params.heat_penalty(ctmax);
    (d_enzymatic_db(ctmin, b, t) * w_b * w_heat
        + enz * params.d_breadth_penalty_db(b) * w_heat
        + enz * w_b * params.d_heat_penalty(ctmax))
        * params.cold_penalty(ctmin)
}

/// d(instantaneous fitness)/dCTmin, with the breadth penalty pulled out.
pub fn d_fitness_dctmin(params: &ConstraintParams, ctmin: f64, b: f64, t: f64) -> f64 {
    let ctmax = ctmin + b;
    let enz = enzymatic_response(ctmin, b, t);
    let w_cold = params.cold_penalty(ctmin);
    let w_heat = params.heat_penalty(ctmax);
    (d_enzymatic_dctmin(ctmin, b, t) * w_cold * w_heat
        + enz * params.d_cold_penalty_dctmin(ctmin) * w_heat
        + enz * w_cold * params.d_heat_penalty(ctmax))
        * params.breadth_penalty(b)
}

/// Gradient of instantaneous fitness at a fixed temperature; the right-hand
/// side of the degenerate-variance trajectory.
pub fn fixed_gradient(params: &ConstraintParams, point: TraitPoint, t: f64) -> [f64; 2] {
    [
        d_fitness_dctmin(params, point.ctmin, point.b, t),
        d_fitness_db(params, point.ctmin, point.b, t),
    ]
}

/// Gradient of recovery-model expected fitness: the derivative is pushed
/// inside the integral, from five standard deviations below the mean up to
/// CTmax (the density makes everything further out vanish).
pub fn expected_gradient_recovery(
    params: &ConstraintParams,
    mu_t: f64,
    sigma_t: f64,
    point: TraitPoint,
    tol: QuadTol,
) -> [f64; 2] {
    let lo = mu_t - 5.0 * sigma_t;
    let hi = point.ctmax().min(mu_t + 10.0 * sigma_t);
    let (d_ctmin, _) = quad(
        |t| d_fitness_dctmin(params, point.ctmin, point.b, t) * normal_pdf(t, mu_t, sigma_t),
        lo,
        hi,
        tol,
    );
    let (d_b, _) = quad(
        |t| d_fitness_db(params, point.ctmin, point.b, t) * normal_pdf(t, mu_t, sigma_t),
        lo,
        hi,
        tol,
    );
    [d_ctmin, d_b]
}

/// d(survival weight)/dCTmax. Shared by both trait partials, since CTmax
/// moves one-for-one with either trait. Mirrors the r ~ 1 fallback of the
/// weight itself.
fn d_survival_weight(nr: u32, r: f64, pdf_at_ctmax: f64) -> f64 {
    let nr = nr as f64;
    if (1.0 - r) < f64::MIN_POSITIVE {
        0.5 * (nr - 1.0) * pdf_at_ctmax
    } else {
        ((nr - 1.0) * r.powf(nr) - nr * r.powf(nr - 1.0) + 1.0) / (nr * (1.0 - r) * (1.0 - r))
            * pdf_at_ctmax
    }
}

/// Gradient of no-recovery expected fitness: product rule over the
/// survival weighting and the recovery integral, each differentiated once.
pub fn expected_gradient_no_recovery(
    params: &ConstraintParams,
    mu_t: f64,
    sigma_t: f64,
    point: TraitPoint,
    tol: QuadTol,
) -> [f64; 2] {
    let ctmax = point.ctmax();
    let nr = params.days_per_gen;
    let r = normal_cdf(ctmax, mu_t, sigma_t);
    let c = survival_weight(nr, r);
    let dc = d_survival_weight(nr, r, normal_pdf(ctmax, mu_t, sigma_t));

    let integral = expected_fitness_recovery(params, mu_t, sigma_t, point, tol);
    let [di_dctmin, di_db] = expected_gradient_recovery(params, mu_t, sigma_t, point, tol);

    [dc * integral + c * di_dctmin, dc * integral + c * di_db]
}
