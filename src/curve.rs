//! Thermal performance curve
//!
//! The instantaneous fitness of a trait pair (CTmin, B) at temperature T:
//! a piecewise enzymatic response (Gaussian rise, parabolic fall) damped by
//! three logistic penalties on B, CTmin and the derived CTmax = CTmin + B.
//!
//! References:
//! - Deutsch, C. A., et al. "Impacts of climate warming on terrestrial
//!   ectotherms across latitude" (2008)

use serde::{Deserialize, Serialize};

/// Physiological constraint parameters. Immutable once constructed; the
/// widths divide every logistic and its derivative, so zero widths are
/// rejected at the configuration boundary rather than guarded here.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintParams {
    pub b_critical: f64,
    pub delta_b: f64,
    pub ctmin_critical: f64,
    pub delta_ctmin: f64,
    pub ctmax_critical: f64,
    pub delta_ctmax: f64,
    /// Independent daily temperature draws per generation (no-recovery model).
    pub days_per_gen: u32,
}

impl Default for ConstraintParams {
    fn default() -> Self {
        Self {
            b_critical: 40.0,
            delta_b: 2.0,
            ctmin_critical: 0.0,
            delta_ctmin: 2.0,
            ctmax_critical: 40.0,
            delta_ctmax: 0.2,
            days_per_gen: 10,
        }
    }
}

/// Evolvable trait pair. CTmax is always derived as CTmin + B, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraitPoint {
    pub ctmin: f64,
    pub b: f64,
}

impl TraitPoint {
    pub fn new(ctmin: f64, b: f64) -> Self {
        Self { ctmin, b }
    }

    pub fn ctmax(&self) -> f64 {
        self.ctmin + self.b
    }

    pub fn topt(&self) -> f64 {
        self.ctmin + 2.0 / 3.0 * self.b
    }
}

/// Which arm of the piecewise response a temperature falls on. The same
/// classification drives the value (this module) and the partial
/// derivatives (`gradient`), keeping the case analysis in one place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThermalRegion {
    /// T <= Topt: Gaussian rise.
    Rising,
    /// Topt < T <= CTmax: parabolic fall.
    Falling,
    /// T > CTmax: performance floored at zero.
    Beyond,
}

pub fn classify(ctmin: f64, b: f64, t: f64) -> ThermalRegion {
    if t <= ctmin + 2.0 / 3.0 * b {
        ThermalRegion::Rising
    } else if t <= ctmin + b {
        ThermalRegion::Falling
    } else {
        ThermalRegion::Beyond
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl ConstraintParams {
    /// Penalty on curve breadth; crosses 0.5 exactly at `b_critical`.
    pub fn breadth_penalty(&self, b: f64) -> f64 {
        sigmoid(-(b - self.b_critical) / self.delta_b)
    }

    /// Penalty on cold tolerance, suppressing CTmin below its critical value.
    pub fn cold_penalty(&self, ctmin: f64) -> f64 {
        sigmoid(-(self.ctmin_critical - ctmin) / self.delta_ctmin)
    }

    /// Penalty on heat tolerance, suppressing CTmax above its critical value.
    pub fn heat_penalty(&self, ctmax: f64) -> f64 {
        sigmoid(-(ctmax - self.ctmax_critical) / self.delta_ctmax)
    }

    /// Instantaneous fitness at temperature `t`: the enzymatic response
    /// damped by all three physiological penalties. Always in [0, 1].
    pub fn instantaneous_fitness(&self, ctmin: f64, b: f64, t: f64) -> f64 {
        enzymatic_response(ctmin, b, t)
            * self.breadth_penalty(b)
            * self.cold_penalty(ctmin)
            * self.heat_penalty(ctmin + b)
    }
}

/// Unimodal enzymatic response: Gaussian rise up to Topt = CTmin + (2/3)B,
/// parabolic fall to zero at CTmax. The zero floor is applied after the
/// piecewise selection; the falling parabola crosses zero exactly at CTmax,
/// so the Beyond arm realizes the clamp.
pub fn enzymatic_response(ctmin: f64, b: f64, t: f64) -> f64 {
    let u = t - ctmin - 2.0 / 3.0 * b;
    match classify(ctmin, b, t) {
        ThermalRegion::Rising => (-(3.0 * u / b) * (3.0 * u / b)).exp(),
        ThermalRegion::Falling => {
            let v = 1.0 - (u / (b / 3.0)) * (u / (b / 3.0));
            v.max(0.0)
        }
        ThermalRegion::Beyond => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_boundaries() {
        // ctmin=0, b=30: Topt=20, CTmax=30
        assert_eq!(classify(0.0, 30.0, 19.9), ThermalRegion::Rising);
        assert_eq!(classify(0.0, 30.0, 20.0), ThermalRegion::Rising);
        assert_eq!(classify(0.0, 30.0, 20.1), ThermalRegion::Falling);
        assert_eq!(classify(0.0, 30.0, 30.0), ThermalRegion::Falling);
        assert_eq!(classify(0.0, 30.0, 30.1), ThermalRegion::Beyond);
    }

    #[test]
    fn test_peak_at_topt() {
        let p = TraitPoint::new(5.0, 24.0);
        assert!((enzymatic_response(p.ctmin, p.b, p.topt()) - 1.0).abs() < 1e-15);
        // Strictly below 1 off-peak
        assert!(enzymatic_response(p.ctmin, p.b, p.topt() - 1.0) < 1.0);
        assert!(enzymatic_response(p.ctmin, p.b, p.topt() + 1.0) < 1.0);
    }

    #[test]
    fn test_zero_at_and_beyond_ctmax() {
        let p = TraitPoint::new(5.0, 24.0);
        assert!(enzymatic_response(p.ctmin, p.b, p.ctmax()).abs() < 1e-12);
        assert_eq!(enzymatic_response(p.ctmin, p.b, p.ctmax() + 5.0), 0.0);
    }

    #[test]
    fn test_left_tail_positive() {
        // The Gaussian rise never reaches zero, even below CTmin
        let v = enzymatic_response(5.0, 24.0, 0.0);
        assert!(v > 0.0 && v < 0.05);
    }

    #[test]
    fn test_breadth_penalty_midpoint() {
        for delta in [0.1, 0.5, 2.0, 10.0] {
            let params = ConstraintParams { delta_b: delta, ..Default::default() };
            let w = params.breadth_penalty(params.b_critical);
            assert_eq!(w, 0.5, "midpoint must be exact for delta_b={delta}");
        }
    }

    #[test]
    fn test_penalties_monotone() {
        let params = ConstraintParams::default();
        assert!(params.breadth_penalty(10.0) > params.breadth_penalty(50.0));
        assert!(params.cold_penalty(5.0) > params.cold_penalty(-5.0));
        assert!(params.heat_penalty(30.0) > params.heat_penalty(45.0));
    }

    #[test]
    fn test_fitness_in_unit_interval() {
        let params = ConstraintParams::default();
        for ctmin in [-10.0, 0.0, 5.0, 20.0] {
            for b in [0.5, 10.0, 30.0, 45.0] {
                for t in [-20.0, 0.0, 10.0, 25.0, 39.0, 60.0] {
                    let w = params.instantaneous_fitness(ctmin, b, t);
                    assert!((0.0..=1.0).contains(&w), "w={w} at ({ctmin},{b},{t})");
                }
            }
        }
    }
}
