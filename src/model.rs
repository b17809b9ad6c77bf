//! Model facade
//!
//! `TpcModel` owns the immutable constraint parameters and the solver
//! tolerances, and exposes the three queries callers need: the expected-
//! fitness landscape, its bounded optimum, and the trait trajectory toward
//! it. All state is fixed at construction; every query is a pure function
//! of its arguments.

use crate::curve::{ConstraintParams, TraitPoint};
use crate::dist::TemperatureModel;
use crate::expectation::{expected_fitness, Landscape, RecoveryMode};
use crate::gradient::{
    expected_gradient_no_recovery, expected_gradient_recovery, fixed_gradient,
};
use crate::ivp::{self, IvpConfig, Trajectory};
use crate::optimize::{self, Optimum, OptimizeConfig};
use crate::quadrature::QuadTol;

pub const T_END_DEFAULT: f64 = 1e9;

#[derive(Clone, Copy, Debug, Default)]
pub struct TpcModel {
    params: ConstraintParams,
    quad_tol: QuadTol,
    opt_cfg: OptimizeConfig,
    ivp_cfg: IvpConfig,
}

impl TpcModel {
    pub fn new(params: ConstraintParams) -> Self {
        Self {
            params,
            quad_tol: QuadTol::default(),
            opt_cfg: OptimizeConfig::default(),
            ivp_cfg: IvpConfig::default(),
        }
    }

    pub fn with_tolerances(
        params: ConstraintParams,
        quad_tol: QuadTol,
        opt_cfg: OptimizeConfig,
        ivp_cfg: IvpConfig,
    ) -> Self {
        Self { params, quad_tol, opt_cfg, ivp_cfg }
    }

    pub fn params(&self) -> &ConstraintParams {
        &self.params
    }

    /// Expected fitness at a single trait point.
    pub fn expected_fitness_at(
        &self,
        mode: RecoveryMode,
        mu_t: f64,
        sigma_t: f64,
        point: TraitPoint,
    ) -> f64 {
        expected_fitness(&self.params, mode, mu_t, sigma_t, point, self.quad_tol)
    }

    /// Expected-fitness field over the given axes (columns CTmin, rows B).
    pub fn landscape(
        &self,
        mode: RecoveryMode,
        mu_t: f64,
        sigma_t: f64,
        ctmin_axis: Vec<f64>,
        b_axis: Vec<f64>,
    ) -> Landscape {
        Landscape::compute(&self.params, mode, mu_t, sigma_t, ctmin_axis, b_axis, self.quad_tol)
    }

    /// Gradient of expected fitness at a trait point, `[d/dCTmin, d/dB]`.
    pub fn expected_gradient(
        &self,
        mode: RecoveryMode,
        mu_t: f64,
        sigma_t: f64,
        point: TraitPoint,
    ) -> [f64; 2] {
        match mode {
            RecoveryMode::Recovery => {
                expected_gradient_recovery(&self.params, mu_t, sigma_t, point, self.quad_tol)
            }
            RecoveryMode::NoRecovery => {
                expected_gradient_no_recovery(&self.params, mu_t, sigma_t, point, self.quad_tol)
            }
        }
    }

    /// Bounded local maximization of expected fitness from `guess`
    /// (typically the landscape argmax). With degenerate temperature
    /// variance there is nothing to refine beyond the grid scan: the guess
    /// is returned as the optimum.
    pub fn optimize(
        &self,
        mode: RecoveryMode,
        mu_t: f64,
        sigma_t: f64,
        guess: TraitPoint,
    ) -> Optimum {
        if crate::dist::variance_is_degenerate(sigma_t) {
            return Optimum {
                ctmin: guess.ctmin,
                b: guess.b,
                value: self.params.instantaneous_fitness(guess.ctmin, guess.b, mu_t),
                converged: true,
                iterations: 0,
            };
        }
        optimize::maximize(
            |x| self.expected_fitness_at(mode, mu_t, sigma_t, TraitPoint::new(x[0], x[1])),
            |x| self.expected_gradient(mode, mu_t, sigma_t, TraitPoint::new(x[0], x[1])),
            [guess.ctmin, guess.b],
            self.opt_cfg,
        )
    }

    /// Trait trajectory from `start`: gradient ascent of expected fitness
    /// integrated as a stiff IVP to `t_end`. A fixed temperature (explicit
    /// or a Gaussian with numerically zero variance) switches the
    /// right-hand side to the single-point fitness gradient; the solver is
    /// the same either way.
    pub fn solve_trajectory(
        &self,
        mode: RecoveryMode,
        temperature: TemperatureModel,
        start: TraitPoint,
        t_end: f64,
    ) -> Trajectory {
        let y0 = [start.ctmin, start.b];
        if let Some(t_fixed) = temperature.fixed_value() {
            return ivp::solve(
                |_, y| fixed_gradient(&self.params, TraitPoint::new(y[0], y[1]), t_fixed),
                [0.0, t_end],
                y0,
                self.ivp_cfg,
            );
        }
        let TemperatureModel::Gaussian { mu_t, sigma_t } = temperature else {
            unreachable!("Fixed temperatures return above");
        };
        ivp::solve(
            |_, y| self.expected_gradient(mode, mu_t, sigma_t, TraitPoint::new(y[0], y[1])),
            [0.0, t_end],
            y0,
            self.ivp_cfg,
        )
    }
}
