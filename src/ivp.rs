//! Stiff initial-value solver
//!
//! One-step TR-BDF2 integration (trapezoid stage + BDF2 stage, shared
//! Newton matrix) for the two-trait gradient-ascent system. The method is
//! L-stable, which the trait ODE needs: gradients flatten sharply once the
//! logistic penalties saturate, and the horizon is effectively "until
//! equilibrium" (t_end defaults to 1e9 upstream).
//!
//! Accepted steps are stored with their derivatives, so the solution is
//! densely queryable by cubic Hermite interpolation at arbitrary times.
//!
//! References:
//! - Bank, R. E., et al. "Transient simulation of silicon devices and
//!   circuits" (1985)
//! - Hosea, M. E., Shampine, L. F. "Analysis and implementation of
//!   TR-BDF2" (1996)

const NEWTON_MAX_ITER: usize = 12;
const MAX_GROWTH: f64 = 5.0;
const MIN_SHRINK: f64 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IvpStatus {
    Completed,
    /// Step control drove h below the resolvable spacing; the solution is
    /// truncated at the last accepted step.
    StepUnderflow,
    MaxStepsExceeded,
}

#[derive(Clone, Copy, Debug)]
pub struct IvpConfig {
    pub rel_tol: f64,
    pub abs_tol: f64,
    pub max_steps: usize,
}

impl Default for IvpConfig {
    fn default() -> Self {
        Self { rel_tol: 1e-6, abs_tol: 1e-9, max_steps: 100_000 }
    }
}

/// Dense trajectory: accepted step nodes plus their derivatives, queryable
/// at arbitrary times over the solved interval. Read-only after
/// construction.
#[derive(Clone, Debug)]
pub struct Trajectory {
    pub ts: Vec<f64>,
    pub ys: Vec<[f64; 2]>,
    pub fs: Vec<[f64; 2]>,
    pub status: IvpStatus,
}

impl Trajectory {
    pub fn t_start(&self) -> f64 {
        self.ts[0]
    }

    pub fn t_end(&self) -> f64 {
        *self.ts.last().expect("trajectory has at least the initial node")
    }

    pub fn terminal(&self) -> [f64; 2] {
        *self.ys.last().expect("trajectory has at least the initial node")
    }

    /// State at time `t`, clamped to the solved interval, by cubic Hermite
    /// interpolation between the bracketing step nodes.
    pub fn sample(&self, t: f64) -> [f64; 2] {
        if t <= self.t_start() {
            return self.ys[0];
        }
        if t >= self.t_end() {
            return self.terminal();
        }
        let hi = self.ts.partition_point(|&tk| tk <= t);
        let (i0, i1) = (hi - 1, hi);
        let h = self.ts[i1] - self.ts[i0];
        let s = (t - self.ts[i0]) / h;
        let (s2, s3) = (s * s, s * s * s);
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;
        let mut out = [0.0; 2];
        for k in 0..2 {
            out[k] = h00 * self.ys[i0][k]
                + h10 * h * self.fs[i0][k]
                + h01 * self.ys[i1][k]
                + h11 * h * self.fs[i1][k];
        }
        out
    }
}

fn wrms(v: [f64; 2], y: [f64; 2], cfg: &IvpConfig) -> f64 {
    let mut acc = 0.0;
    for k in 0..2 {
        let scale = cfg.abs_tol + cfg.rel_tol * y[k].abs();
        let r = v[k] / scale;
        acc += r * r;
    }
    (0.5 * acc).sqrt()
}

struct Mat2 {
    m: [[f64; 2]; 2],
    det: f64,
}

impl Mat2 {
    fn newton_matrix(jac: &[[f64; 2]; 2], dh: f64) -> Self {
        let m = [
            [1.0 - dh * jac[0][0], -dh * jac[0][1]],
            [-dh * jac[1][0], 1.0 - dh * jac[1][1]],
        ];
        let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
        Self { m, det }
    }

    fn solve(&self, rhs: [f64; 2]) -> [f64; 2] {
        [
            (self.m[1][1] * rhs[0] - self.m[0][1] * rhs[1]) / self.det,
            (self.m[0][0] * rhs[1] - self.m[1][0] * rhs[0]) / self.det,
        ]
    }
}

fn fd_jacobian<F>(f: &mut F, t: f64, y: [f64; 2], fy: [f64; 2]) -> [[f64; 2]; 2]
where
    F: FnMut(f64, [f64; 2]) -> [f64; 2],
{
    let mut jac = [[0.0; 2]; 2];
    for k in 0..2 {
        let delta = f64::EPSILON.sqrt() * y[k].abs().max(1.0);
        let mut yp = y;
        yp[k] += delta;
        let fp = f(t, yp);
        for i in 0..2 {
            jac[i][k] = (fp[i] - fy[i]) / delta;
        }
    }
    jac
}

/// Solve one implicit stage `y - d*h*f(t, y) = rhs` by Newton iteration
/// with a frozen iteration matrix. Convergence is judged in the same
/// weighted norm as step control (well below one local error unit), so a
/// right-hand side that is itself quadrature-backed cannot stall the
/// iteration. Returns None when the iteration fails to contract.
fn newton_stage<F>(
    f: &mut F,
    t: f64,
    rhs: [f64; 2],
    dh: f64,
    mat: &Mat2,
    guess: [f64; 2],
    cfg: &IvpConfig,
) -> Option<[f64; 2]>
where
    F: FnMut(f64, [f64; 2]) -> [f64; 2],
{
    let mut y = guess;
    let mut last_norm = f64::INFINITY;
    for _ in 0..NEWTON_MAX_ITER {
        let fy = f(t, y);
        let residual = [
            y[0] - rhs[0] - dh * fy[0],
            y[1] - rhs[1] - dh * fy[1],
        ];
        let step = mat.solve([-residual[0], -residual[1]]);
        y[0] += step[0];
        y[1] += step[1];
        let norm = wrms(step, y, cfg);
        if norm <= 0.03 {
            return Some(y);
        }
        if norm > 4.0 * last_norm {
            return None;
        }
        last_norm = norm;
    }
    None
}

/// Integrate `f` over `t_span` from `y0`. The right-hand side is called as
/// `f(t, y)`; failures of step control are reported on the returned
/// trajectory's status, and the partial solution stays usable.
pub fn solve<F>(mut f: F, t_span: [f64; 2], y0: [f64; 2], cfg: IvpConfig) -> Trajectory
where
    F: FnMut(f64, [f64; 2]) -> [f64; 2],
{
    let gamma = 2.0 - std::f64::consts::SQRT_2;
    let d = gamma / 2.0;
    let b1 = 1.0 / (2.0 * (2.0 - gamma));
    let b3 = d;
    // Companion third-order weights for the error estimate (b2 equals b1
    // in this tableau).
    let bh2 = 1.0 / (6.0 * gamma * (1.0 - gamma));
    let bh3 = 0.5 - bh2 * gamma;
    let bh1 = 1.0 - bh2 - bh3;
    let (e1, e2, e3) = (b1 - bh1, b1 - bh2, b3 - bh3);

    let (t0, t_end) = (t_span[0], t_span[1]);
    let span = t_end - t0;

    let mut t = t0;
    let mut y = y0;
    let mut fy = f(t, y);

    let mut ts = vec![t];
    let mut ys = vec![y];
    let mut fs = vec![fy];

    if !(span > 0.0) {
        return Trajectory { ts, ys, fs, status: IvpStatus::Completed };
    }

    // Initial step from the ratio of state and derivative scales.
    let d0 = wrms(y, y, &cfg);
    let d1 = wrms(fy, y, &cfg);
    let mut h = if d1 > 1e-12 { 0.01 * d0 / d1 } else { 1e-3 * span };
    h = h.min(span);

    let mut attempts = 0;
    let status = loop {
        if t >= t_end {
            break IvpStatus::Completed;
        }
        if attempts >= cfg.max_steps {
            break IvpStatus::MaxStepsExceeded;
        }
        attempts += 1;

        h = h.min(t_end - t);
        if h < f64::EPSILON * t.abs().max(1.0) {
            break IvpStatus::StepUnderflow;
        }

        let jac = fd_jacobian(&mut f, t, y, fy);
        let mat = Mat2::newton_matrix(&jac, d * h);
        if mat.det.abs() < 1e-300 {
            h *= 0.25;
            continue;
        }

        // Trapezoid stage to t + gamma*h.
        let rhs1 = [y[0] + d * h * fy[0], y[1] + d * h * fy[1]];
        let guess1 = [y[0] + gamma * h * fy[0], y[1] + gamma * h * fy[1]];
        let Some(y_mid) = newton_stage(&mut f, t + gamma * h, rhs1, d * h, &mat, guess1, &cfg)
        else {
            h *= 0.25;
            continue;
        };

        // BDF2 stage to t + h, built on y and the trapezoid stage.
        let c_mid = 1.0 / (gamma * (2.0 - gamma));
        let c_old = (1.0 - gamma) * (1.0 - gamma) / (gamma * (2.0 - gamma));
        let rhs2 = [
            c_mid * y_mid[0] - c_old * y[0],
            c_mid * y_mid[1] - c_old * y[1],
        ];
        let guess2 = [
            y[0] + (y_mid[0] - y[0]) / gamma,
            y[1] + (y_mid[1] - y[1]) / gamma,
        ];
        let Some(y_new) = newton_stage(&mut f, t + h, rhs2, d * h, &mat, guess2, &cfg) else {
            h *= 0.25;
            continue;
        };

        let f_mid = f(t + gamma * h, y_mid);
        let f_new = f(t + h, y_new);

        // Embedded error estimate, filtered through the Newton matrix so
        // stiff components do not dominate the norm.
        let raw = [
            h * (e1 * fy[0] + e2 * f_mid[0] + e3 * f_new[0]),
            h * (e1 * fy[1] + e2 * f_mid[1] + e3 * f_new[1]),
        ];
        let est = mat.solve(raw);
        let err = wrms(est, y_new, &cfg);

        if err <= 1.0 {
            t += h;
            y = y_new;
            fy = f_new;
            ts.push(t);
            ys.push(y);
            fs.push(fy);
            let fac = if err > 0.0 {
                (0.9 * err.powf(-1.0 / 3.0)).clamp(MIN_SHRINK, MAX_GROWTH)
            } else {
                MAX_GROWTH
            };
            h *= fac;
        } else {
            h *= (0.9 * err.powf(-1.0 / 3.0)).clamp(MIN_SHRINK, 0.5);
        }
    };

    Trajectory { ts, ys, fs, status }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_decay() {
        // y' = -y, y(0) = 1: exact e^{-t}
        let sol = solve(|_, y| [-y[0], -y[1]], [0.0, 5.0], [1.0, 2.0], IvpConfig::default());
        assert_eq!(sol.status, IvpStatus::Completed);
        let end = sol.terminal();
        assert!((end[0] - (-5.0f64).exp()).abs() < 1e-4, "got {}", end[0]);
        assert!((end[1] - 2.0 * (-5.0f64).exp()).abs() < 1e-4);
    }

    #[test]
    fn test_stiff_relaxation() {
        // Fast component relaxes to the slow one: classic stiffness
        let sol = solve(
            |_, y| [-1e4 * (y[0] - y[1]), -y[1]],
            [0.0, 10.0],
            [5.0, 1.0],
            IvpConfig::default(),
        );
        assert_eq!(sol.status, IvpStatus::Completed);
        let end = sol.terminal();
        let exact = (-10.0f64).exp();
        assert!((end[1] - exact).abs() < 1e-4);
        assert!((end[0] - end[1]).abs() < 1e-4, "fast mode should track slow");
        // Stiffness must not force explicit-scale steps
        assert!(sol.ts.len() < 2000, "took {} steps", sol.ts.len());
    }

    #[test]
    fn test_dense_sampling() {
        let sol = solve(|_, y| [-y[0], -y[1]], [0.0, 3.0], [1.0, 1.0], IvpConfig::default());
        for &t in &[0.0, 0.37, 1.0, 2.25, 3.0] {
            let s = sol.sample(t);
            assert!((s[0] - (-t).exp()).abs() < 1e-4, "t={t}: {}", s[0]);
        }
        // Clamped outside the solved interval
        assert_eq!(sol.sample(-1.0), sol.ys[0]);
        assert_eq!(sol.sample(99.0), sol.terminal());
    }

    #[test]
    fn test_equilibrium_start() {
        // Zero field: the solver should cross a huge horizon in few steps
        let sol = solve(|_, _| [0.0, 0.0], [0.0, 1e9], [3.0, 4.0], IvpConfig::default());
        assert_eq!(sol.status, IvpStatus::Completed);
        assert_eq!(sol.terminal(), [3.0, 4.0]);
        assert!(sol.ts.len() < 50, "took {} steps", sol.ts.len());
    }

    #[test]
    fn test_empty_span() {
        let sol = solve(|_, y| [y[1], -y[0]], [2.0, 2.0], [1.0, 0.0], IvpConfig::default());
        assert_eq!(sol.status, IvpStatus::Completed);
        assert_eq!(sol.ts.len(), 1);
    }
}
