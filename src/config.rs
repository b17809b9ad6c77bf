use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::curve::ConstraintParams;
use crate::expectation::{linspace, RecoveryMode};
use crate::ivp::IvpConfig;
use crate::model;
use crate::optimize::OptimizeConfig;
use crate::quadrature::QuadTol;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Root {
    pub model: Model,
    pub temperature: Temperature,
    #[serde(default)]
    pub constraints: Constraints,
    pub grid: Option<Grid>,
    pub trajectory: Option<TrajectorySpec>,
    #[serde(default)]
    pub solver: Solver,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Model {
    /// "recovery" or "no-recovery"
    pub recovery: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Temperature {
    pub mu_t: f64,
    pub sigma_t: f64,
}

/// Physiological constraint parameters; defaults match the documented
/// model constructor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Constraints {
    #[serde(default = "default_b_critical")]
    pub b_critical: f64,
    #[serde(default = "default_width")]
    pub delta_b: f64,
    #[serde(default = "default_zero")]
    pub ctmin_critical: f64,
    #[serde(default = "default_width")]
    pub delta_ctmin: f64,
    #[serde(default = "default_ctmax_critical")]
    pub ctmax_critical: f64,
    #[serde(default = "default_delta_ctmax")]
    pub delta_ctmax: f64,
    #[serde(default = "default_days_per_gen")]
    pub days_per_gen: u32,
}

fn default_b_critical() -> f64 { 40.0 }
fn default_width() -> f64 { 2.0 }
fn default_zero() -> f64 { 0.0 }
fn default_ctmax_critical() -> f64 { 40.0 }
fn default_delta_ctmax() -> f64 { 0.2 }
fn default_days_per_gen() -> u32 { 10 }

impl Default for Constraints {
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

/// Landscape sweep extents; defaults reproduce the standard survey
/// (CTmin in [-5, 40] over 450 columns, B in [1e-3, 40] over 300 rows).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Grid {
    #[serde(default = "default_ctmin_min")]
    pub ctmin_min: f64,
    #[serde(default = "default_ctmin_max")]
    pub ctmin_max: f64,
    #[serde(default = "default_ctmin_n")]
    pub ctmin_n: usize,
    #[serde(default = "default_b_min")]
    pub b_min: f64,
    #[serde(default = "default_b_max")]
    pub b_max: f64,
    #[serde(default = "default_b_n")]
    pub b_n: usize,
}

fn default_ctmin_min() -> f64 { -5.0 }
fn default_ctmin_max() -> f64 { 40.0 }
fn default_ctmin_n() -> usize { 450 }
fn default_b_min() -> f64 { 1e-3 }
fn default_b_max() -> f64 { 40.0 }
fn default_b_n() -> usize { 300 }

impl Default for Grid {
    fn default() -> Self {
        Self {
            ctmin_min: -5.0,
            ctmin_max: 40.0,
            ctmin_n: 450,
            b_min: 1e-3,
            b_max: 40.0,
            b_n: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrajectorySpec {
    pub ctmin0: f64,
    pub b0: f64,
    #[serde(default = "default_t_end")]
    pub t_end: f64,
}

fn default_t_end() -> f64 { model::T_END_DEFAULT }

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Solver {
    #[serde(default = "default_quad_abs_tol")]
    pub quad_abs_tol: f64,
    #[serde(default = "default_quad_rel_tol")]
    pub quad_rel_tol: f64,
    #[serde(default = "default_opt_grad_tol")]
    pub opt_grad_tol: f64,
    #[serde(default = "default_opt_max_iter")]
    pub opt_max_iter: usize,
    #[serde(default = "default_ivp_rel_tol")]
    pub ivp_rel_tol: f64,
    #[serde(default = "default_ivp_abs_tol")]
    pub ivp_abs_tol: f64,
}

fn default_quad_abs_tol() -> f64 { 1e-10 }
fn default_quad_rel_tol() -> f64 { 1e-8 }
fn default_opt_grad_tol() -> f64 { 1e-6 }
fn default_opt_max_iter() -> usize { 200 }
fn default_ivp_rel_tol() -> f64 { 1e-6 }
fn default_ivp_abs_tol() -> f64 { 1e-9 }

impl Default for Solver {
    fn default() -> Self {
        Self {
            quad_abs_tol: 1e-10,
            quad_rel_tol: 1e-8,
            opt_grad_tol: 1e-6,
            opt_max_iter: 200,
            ivp_rel_tol: 1e-6,
            ivp_abs_tol: 1e-9,
        }
    }
}

impl Root {
    pub fn validate(&self) -> Result<()> {
        // The mode string must parse; unknown selectors are rejected here.
        self.recovery_mode()?;

        if self.constraints.delta_b == 0.0
            || self.constraints.delta_ctmin == 0.0
            || self.constraints.delta_ctmax == 0.0
        {
            bail!("constraint widths (delta_*) must be nonzero");
        }
        if self.constraints.days_per_gen < 1 {
            bail!("constraints.days_per_gen must be >= 1");
        }
        if !(self.temperature.sigma_t >= 0.0) || !self.temperature.sigma_t.is_finite() {
            bail!("temperature.sigma_t must be finite and >= 0");
        }
        if !self.temperature.mu_t.is_finite() {
            bail!("temperature.mu_t must be finite");
        }

        if let Some(ref grid) = self.grid {
            if grid.ctmin_n == 0 || grid.b_n == 0 {
                bail!("grid.ctmin_n and grid.b_n must be >= 1");
            }
            if grid.ctmin_min > grid.ctmin_max {
                bail!("grid.ctmin_min must be <= grid.ctmin_max");
            }
            if grid.b_min > grid.b_max {
                bail!("grid.b_min must be <= grid.b_max");
            }
        }

        if let Some(ref traj) = self.trajectory {
            if traj.b0 <= 0.0 {
                bail!("trajectory.b0 must be positive");
            }
            if !(traj.t_end > 0.0) {
                bail!("trajectory.t_end must be positive");
            }
        }

        if self.solver.quad_abs_tol <= 0.0 || self.solver.quad_rel_tol <= 0.0 {
            bail!("solver quadrature tolerances must be positive");
        }
        if self.solver.opt_grad_tol <= 0.0 {
            bail!("solver.opt_grad_tol must be positive");
        }
        if self.solver.opt_max_iter == 0 || self.solver.opt_max_iter > 100_000 {
            bail!("solver.opt_max_iter must be in [1, 100000]");
        }
        if self.solver.ivp_rel_tol <= 0.0 || self.solver.ivp_abs_tol <= 0.0 {
            bail!("solver IVP tolerances must be positive");
        }

        Ok(())
    }

    pub fn recovery_mode(&self) -> Result<RecoveryMode> {
        self.model.recovery.parse()
    }

    pub fn constraint_params(&self) -> ConstraintParams {
        ConstraintParams {
            b_critical: self.constraints.b_critical,
            delta_b: self.constraints.delta_b,
            ctmin_critical: self.constraints.ctmin_critical,
            delta_ctmin: self.constraints.delta_ctmin,
            ctmax_critical: self.constraints.ctmax_critical,
            delta_ctmax: self.constraints.delta_ctmax,
            days_per_gen: self.constraints.days_per_gen,
        }
    }

    pub fn quad_tol(&self) -> QuadTol {
        QuadTol { abs: self.solver.quad_abs_tol, rel: self.solver.quad_rel_tol }
    }

    pub fn optimize_config(&self) -> OptimizeConfig {
        OptimizeConfig {
            grad_tol: self.solver.opt_grad_tol,
            max_iter: self.solver.opt_max_iter,
            ..Default::default()
        }
    }

    pub fn ivp_config(&self) -> IvpConfig {
        IvpConfig {
            rel_tol: self.solver.ivp_rel_tol,
            abs_tol: self.solver.ivp_abs_tol,
            ..Default::default()
        }
    }

    /// Sweep axes from the `[grid]` section (or its defaults).
    pub fn axes(&self) -> (Vec<f64>, Vec<f64>) {
        let grid = self.grid.clone().unwrap_or_default();
        (
            linspace(grid.ctmin_min, grid.ctmin_max, grid.ctmin_n),
            linspace(grid.b_min, grid.b_max, grid.b_n),
        )
    }
}
