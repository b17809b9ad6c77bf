//! Cross-module test suite
//!
//! Covers the observable properties of the fitness engine end to end:
//! bounds and symmetry of the curve components, degenerate-variance and
//! survival-weighting edge cases, analytic-vs-numerical gradient agreement,
//! and the optimizer/trajectory scenarios.

use crate::curve::{enzymatic_response, ConstraintParams, TraitPoint};
use crate::dist::TemperatureModel;
use crate::expectation::{linspace, RecoveryMode};
use crate::ivp::{IvpConfig, IvpStatus};
use crate::model::TpcModel;
use crate::optimize::OptimizeConfig;
use crate::quadrature::QuadTol;

/// The benchmark scenario: tighter breadth and cold-tolerance limits than
/// the defaults, moderate temperature noise.
fn scenario_params() -> ConstraintParams {
    ConstraintParams {
        b_critical: 31.0,
        ctmin_critical: 5.0,
        ..Default::default()
    }
}

const MU_T: f64 = 20.0;
const SIGMA_T: f64 = 3.0;

fn tight_model(params: ConstraintParams) -> TpcModel {
    TpcModel::with_tolerances(
        params,
        QuadTol { abs: 1e-12, rel: 1e-10 },
        OptimizeConfig::default(),
        IvpConfig::default(),
    )
}

// =============================================================================
// Curve Properties
// =============================================================================

#[test]
fn test_enzymatic_response_never_negative() {
    for ctmin in [-10.0, -2.0, 0.0, 5.0, 15.0, 30.0] {
        for b in [0.1, 1.0, 10.0, 25.0, 40.0] {
            let ctmax = ctmin + b;
            for k in 0..=60 {
                let t = ctmin - 10.0 + (ctmax + 20.0 - (ctmin - 10.0)) * (k as f64) / 60.0;
                let w = enzymatic_response(ctmin, b, t);
                assert!(w >= 0.0, "negative response at ({ctmin},{b},{t}): {w}");
            }
        }
    }
}

#[test]
fn test_instantaneous_fitness_unit_interval() {
    let params = scenario_params();
    for ctmin in [-8.0, 0.0, 5.0, 12.0, 28.0] {
        for b in [0.5, 8.0, 20.0, 31.0, 40.0] {
            for t in [-15.0, 0.0, 10.0, 20.0, 35.0, 55.0] {
                let w = params.instantaneous_fitness(ctmin, b, t);
                assert!(
                    (0.0..=1.0).contains(&w),
                    "fitness {w} out of range at ({ctmin},{b},{t})"
                );
            }
        }
    }
}

#[test]
fn test_breadth_transition_midpoint_and_width() {
    // Midpoint is pinned at b_critical regardless of the width parameter
    for delta in [0.2, 1.0, 2.0, 8.0] {
        let params = ConstraintParams { delta_b: delta, ..Default::default() };
        assert_eq!(params.breadth_penalty(params.b_critical), 0.5);
    }

    // A wider delta_b relaxes the penalty at a fixed overshoot
    let offset = 3.0;
    let mut previous = 0.0;
    for delta in [0.5, 1.0, 2.0, 4.0, 8.0] {
        let params = ConstraintParams { delta_b: delta, ..Default::default() };
        let w = params.breadth_penalty(params.b_critical + offset);
        assert!(w > previous, "transition must widen with delta_b={delta}");
        previous = w;
    }
}

// =============================================================================
// Expected Fitness
// =============================================================================

#[test]
fn test_degenerate_variance_matches_instantaneous() {
    let model = TpcModel::new(scenario_params());
    let point = TraitPoint::new(5.0, 25.0);
    let w = model.params().instantaneous_fitness(point.ctmin, point.b, MU_T);

    for mode in [RecoveryMode::Recovery, RecoveryMode::NoRecovery] {
        let e = model.expected_fitness_at(mode, MU_T, 0.0, point);
        assert_eq!(e, w, "sigma=0 must route to the fixed-temperature fitness");
    }
}

#[test]
fn test_small_variance_approaches_instantaneous() {
    let model = tight_model(scenario_params());
    let point = TraitPoint::new(5.0, 25.0);
    let w = model.params().instantaneous_fitness(point.ctmin, point.b, MU_T);
    let e = model.expected_fitness_at(RecoveryMode::Recovery, MU_T, 1e-3, point);
    assert!((e - w).abs() < 1e-4, "E={e} vs w={w}");
}

#[test]
fn test_no_lethal_risk_matches_recovery_model() {
    // CTmax five sigma above the mean: lethal days are vanishingly rare, so
    // the survival weighting is ~1 and the two models coincide
    let model = tight_model(ConstraintParams::default());
    let point = TraitPoint::new(5.0, 30.0);
    let rec = model.expected_fitness_at(RecoveryMode::Recovery, MU_T, SIGMA_T, point);
    let norec = model.expected_fitness_at(RecoveryMode::NoRecovery, MU_T, SIGMA_T, point);
    assert!(rec > 0.0);
    assert!(
        ((norec - rec) / rec).abs() < 1e-5,
        "recovery={rec} no-recovery={norec}"
    );
}

#[test]
fn test_lethal_exposure_discounts_fitness() {
    // CTmax at the mean: half the days are lethal and the no-recovery
    // model must pay for it
    let model = TpcModel::new(ConstraintParams::default());
    let point = TraitPoint::new(0.0, 20.0);
    let rec = model.expected_fitness_at(RecoveryMode::Recovery, MU_T, SIGMA_T, point);
    let norec = model.expected_fitness_at(RecoveryMode::NoRecovery, MU_T, SIGMA_T, point);
    assert!(norec < 0.5 * rec, "recovery={rec} no-recovery={norec}");
}

#[test]
fn test_landscape_deterministic() {
    let model = TpcModel::new(scenario_params());
    let axes = (linspace(0.0, 30.0, 12), linspace(5.0, 35.0, 9));
    let a = model.landscape(RecoveryMode::NoRecovery, MU_T, SIGMA_T, axes.0.clone(), axes.1.clone());
    let b = model.landscape(RecoveryMode::NoRecovery, MU_T, SIGMA_T, axes.0, axes.1);
    assert_eq!(a.values, b.values);
}

#[test]
fn test_landscape_values_bounded() {
    let model = TpcModel::new(scenario_params());
    let land = model.landscape(
        RecoveryMode::NoRecovery,
        MU_T,
        SIGMA_T,
        linspace(-5.0, 40.0, 20),
        linspace(1e-3, 40.0, 15),
    );
    for &v in &land.values {
        assert!((0.0..=1.0).contains(&v), "expected fitness {v} out of [0,1]");
    }
}

// =============================================================================
// Gradient Consistency
// =============================================================================

fn check_gradient(mode: RecoveryMode) {
    let model = tight_model(ConstraintParams::default());
    let point = TraitPoint::new(6.0, 26.0);
    let h = 1e-3;

    let [g_ctmin, g_b] = model.expected_gradient(mode, MU_T, SIGMA_T, point);

    let e = |ctmin: f64, b: f64| {
        model.expected_fitness_at(mode, MU_T, SIGMA_T, TraitPoint::new(ctmin, b))
    };
    let fd_ctmin = (e(point.ctmin + h, point.b) - e(point.ctmin - h, point.b)) / (2.0 * h);
    let fd_b = (e(point.ctmin, point.b + h) - e(point.ctmin, point.b - h)) / (2.0 * h);

    let rel = |analytic: f64, fd: f64| (analytic - fd).abs() / fd.abs().max(1e-12);
    assert!(
        rel(g_ctmin, fd_ctmin) < 1e-4,
        "{mode:?} d/dctmin: analytic={g_ctmin:.8e} fd={fd_ctmin:.8e}"
    );
    assert!(
        rel(g_b, fd_b) < 1e-4,
        "{mode:?} d/db: analytic={g_b:.8e} fd={fd_b:.8e}"
    );
}

#[test]
fn test_gradient_matches_finite_difference_recovery() {
    check_gradient(RecoveryMode::Recovery);
}

#[test]
fn test_gradient_matches_finite_difference_no_recovery() {
    check_gradient(RecoveryMode::NoRecovery);
}

// =============================================================================
// Optimizer Scenario
// =============================================================================

#[test]
fn test_optimum_dominates_grid_sweep() {
    let model = TpcModel::new(scenario_params());
    let land = model.landscape(
        RecoveryMode::NoRecovery,
        MU_T,
        SIGMA_T,
        linspace(-5.0, 40.0, 90),
        linspace(1e-3, 40.0, 60),
    );

    let seed = land.argmax();
    let opt = model.optimize(RecoveryMode::NoRecovery, MU_T, SIGMA_T, seed);

    assert!(opt.converged, "optimizer should converge from the grid argmax");
    assert!(opt.b > 0.0);
    let tol = 1e-9;
    for &cell in &land.values {
        assert!(
            opt.value + tol >= cell,
            "optimum {:.8e} beaten by grid cell {:.8e}",
            opt.value,
            cell
        );
    }
    // Refinement should not fall below its own seed
    let seed_value = model.expected_fitness_at(RecoveryMode::NoRecovery, MU_T, SIGMA_T, seed);
    assert!(opt.value + tol >= seed_value);
}

#[test]
fn test_degenerate_variance_optimize_keeps_seed() {
    let model = TpcModel::new(scenario_params());
    let seed = TraitPoint::new(12.0, 24.0);
    let opt = model.optimize(RecoveryMode::NoRecovery, MU_T, 0.0, seed);
    assert_eq!((opt.ctmin, opt.b), (seed.ctmin, seed.b));
    assert!(opt.converged);
    assert_eq!(opt.iterations, 0);
}

// =============================================================================
// Trajectory Scenarios
// =============================================================================

#[test]
fn test_trajectory_reaches_optimum() {
    let model = TpcModel::new(scenario_params());
    let mode = RecoveryMode::NoRecovery;

    let land = model.landscape(
        mode,
        MU_T,
        SIGMA_T,
        linspace(0.0, 30.0, 40),
        linspace(5.0, 35.0, 30),
    );
    let opt = model.optimize(mode, MU_T, SIGMA_T, land.argmax());
    assert!(opt.converged);

    let start = TraitPoint::new(2.0, 12.0);
    let temperature = TemperatureModel::Gaussian { mu_t: MU_T, sigma_t: SIGMA_T };
    let traj = model.solve_trajectory(mode, temperature, start, 1e9);

    assert_eq!(traj.status, IvpStatus::Completed);
    let end = traj.terminal();
    assert!(
        (end[0] - opt.ctmin).abs() < 1e-2,
        "terminal ctmin {} vs optimum {}",
        end[0],
        opt.ctmin
    );
    assert!(
        (end[1] - opt.b).abs() < 1e-2,
        "terminal b {} vs optimum {}",
        end[1],
        opt.b
    );
}

#[test]
fn test_fixed_temperature_trajectory_is_single_point_ode() {
    // sigma = 0 must select the unaveraged gradient field: the run is
    // identical, node for node, to an explicit fixed-temperature model
    let model = TpcModel::new(ConstraintParams::default());
    let start = TraitPoint::new(0.0, 10.0);
    let t_end = 1e6;

    let degenerate = TemperatureModel::Gaussian { mu_t: 5.0, sigma_t: 0.0 };
    let a = model.solve_trajectory(RecoveryMode::NoRecovery, degenerate, start, t_end);
    let b = model.solve_trajectory(RecoveryMode::NoRecovery, TemperatureModel::Fixed(5.0), start, t_end);

    assert_eq!(a.status, b.status);
    assert_eq!(a.ts, b.ts);
    assert_eq!(a.ys, b.ys);

    // And the dense query agrees wherever it is sampled
    for &t in &[0.0, 1.0, 250.0, 8e5, t_end] {
        assert_eq!(a.sample(t), b.sample(t));
    }
}

#[test]
fn test_trajectory_dense_query_interpolates_nodes() {
    let model = TpcModel::new(scenario_params());
    let temperature = TemperatureModel::Gaussian { mu_t: MU_T, sigma_t: SIGMA_T };
    let traj = model.solve_trajectory(
        RecoveryMode::Recovery,
        temperature,
        TraitPoint::new(8.0, 15.0),
        1e7,
    );
    assert!(traj.ts.len() > 2);
    // Exact at the stored nodes
    let mid = traj.ts.len() / 2;
    assert_eq!(traj.sample(traj.ts[mid]), traj.ys[mid]);
    // Monotone clamp outside the interval
    assert_eq!(traj.sample(-5.0), traj.ys[0]);
    assert_eq!(traj.sample(f64::INFINITY), traj.terminal());
}
