use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use thermofit::config;
use thermofit::curve::TraitPoint;
use thermofit::dist::{variance_is_degenerate, TemperatureModel};
use thermofit::expectation::Landscape;
use thermofit::io::{LandscapeWriter, OptimumWriter, TrajectoryWriter};
use thermofit::ivp::IvpStatus;
use thermofit::model::TpcModel;
use thermofit::optimize::Optimum;

const VERSION: &str = "1.2.0";
const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Parser, Debug)]
#[command(name = "thermofit")]
#[command(version)]
#[command(about = "Analytical fitness-landscape and trait-trajectory solver for thermal performance curves")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output path (file, or prefix for multi-file commands)
    #[arg(short, long, global = true)]
    out: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Full pipeline: landscape, optimum, trajectory
    Predict {
        /// Generate a JSON result bundle alongside the CSV files
        #[arg(long)]
        json: bool,
    },
    /// Compute the expected-fitness landscape over the configured grid
    Landscape {
        #[arg(long)]
        json: bool,
    },
    /// Locate the optimal trait pair, seeded from the landscape argmax
    Optimize {
        #[arg(long)]
        json: bool,
    },
    /// Integrate the trait trajectory from the configured start
    Trajectory {
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file
    Validate,
}

// ============================================================================
// JSON Output Structures
// ============================================================================

#[derive(Serialize)]
struct Manifest {
    schema_version: String,
    solver_version: String,
    timestamp_utc: String,
    platform: String,
    config_hash: String,
    config_snapshot: config::Root,
}

#[derive(Serialize)]
struct OptimumSummary {
    ctmin: f64,
    b: f64,
    ctmax: f64,
    expected_fitness: f64,
    converged: bool,
    iterations: usize,
}

impl From<&Optimum> for OptimumSummary {
    fn from(opt: &Optimum) -> Self {
        Self {
            ctmin: opt.ctmin,
            b: opt.b,
            ctmax: opt.ctmin + opt.b,
            expected_fitness: opt.value,
            converged: opt.converged,
            iterations: opt.iterations,
        }
    }
}

#[derive(Serialize)]
struct TrajectorySummary {
    status: String,
    steps: usize,
    t_end: f64,
    terminal_ctmin: f64,
    terminal_b: f64,
    terminal_ctmax: f64,
}

#[derive(Serialize)]
struct LandscapeSummary {
    ctmin_n: usize,
    b_n: usize,
    max_fitness: f64,
    argmax_ctmin: f64,
    argmax_b: f64,
}

#[derive(Serialize)]
struct PredictBundle {
    manifest: Manifest,
    landscape: LandscapeSummary,
    optimum: OptimumSummary,
    trajectory: TrajectorySummary,
    wall_time_ms: f64,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn compute_hash(data: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let days_since_epoch = now / 86_400;
    let secs_today = now % 86_400;

    let is_leap = |y: u64| y % 4 == 0 && (y % 100 != 0 || y % 400 == 0);
    let mut year = 1970u64;
    let mut remaining = days_since_epoch;
    loop {
        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if remaining < days_in_year {
            break;
        }
        remaining -= days_in_year;
        year += 1;
    }
    let month_days = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut month = 1u64;
    for &days in &month_days {
        let d = if month == 2 && is_leap(year) { 29 } else { days };
        if remaining < d {
            break;
        }
        remaining -= d;
        month += 1;
    }

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        remaining + 1,
        secs_today / 3600,
        (secs_today % 3600) / 60,
        secs_today % 60
    )
}

fn create_manifest(cfg: &config::Root, cfg_text: &str) -> Manifest {
    Manifest {
        schema_version: SCHEMA_VERSION.to_string(),
        solver_version: VERSION.to_string(),
        timestamp_utc: get_timestamp(),
        platform: std::env::consts::OS.to_string(),
        config_hash: compute_hash(cfg_text),
        config_snapshot: cfg.clone(),
    }
}

fn trajectory_summary(traj: &thermofit::ivp::Trajectory) -> TrajectorySummary {
    let end = traj.terminal();
    TrajectorySummary {
        status: format!("{:?}", traj.status),
        steps: traj.ts.len() - 1,
        t_end: traj.t_end(),
        terminal_ctmin: end[0],
        terminal_b: end[1],
        terminal_ctmax: end[0] + end[1],
    }
}

fn build_model(cfg: &config::Root) -> TpcModel {
    TpcModel::with_tolerances(
        cfg.constraint_params(),
        cfg.quad_tol(),
        cfg.optimize_config(),
        cfg.ivp_config(),
    )
}

/// Landscape over the configured grid, with the degenerate-variance
/// short-circuit reported the way the long-running survey expects.
fn compute_landscape(model: &TpcModel, cfg: &config::Root) -> Result<Landscape> {
    let mode = cfg.recovery_mode()?;
    let (ctmin_axis, b_axis) = cfg.axes();
    if variance_is_degenerate(cfg.temperature.sigma_t) {
        eprintln!("[thermofit] temperature variance is numerically zero, skipping integration");
    }
    let start = Instant::now();
    let land = model.landscape(
        mode,
        cfg.temperature.mu_t,
        cfg.temperature.sigma_t,
        ctmin_axis,
        b_axis,
    );
    eprintln!(
        "[thermofit] landscape {}x{} cells in {:.1}ms",
        land.b_axis.len(),
        land.ctmin_axis.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(land)
}

fn refine_optimum(model: &TpcModel, cfg: &config::Root, land: &Landscape) -> Result<Optimum> {
    let mode = cfg.recovery_mode()?;
    let seed = land.argmax();
    if variance_is_degenerate(cfg.temperature.sigma_t) {
        eprintln!("[thermofit] variance too small, keeping the grid argmax as the optimum");
    }
    let opt = model.optimize(mode, cfg.temperature.mu_t, cfg.temperature.sigma_t, seed);
    eprintln!(
        "[thermofit] optimum ctmin={:.4} b={:.4} fitness={:.6e} ({} iterations)",
        opt.ctmin, opt.b, opt.value, opt.iterations
    );
    if !opt.converged {
        eprintln!("[thermofit] WARNING: optimizer did not converge");
    }
    Ok(opt)
}

fn integrate_trajectory(
    model: &TpcModel,
    cfg: &config::Root,
) -> Result<thermofit::ivp::Trajectory> {
    let mode = cfg.recovery_mode()?;
    let plan = cfg
        .trajectory
        .as_ref()
        .context("[trajectory] section required for trajectory integration")?;
    let temperature = TemperatureModel::Gaussian {
        mu_t: cfg.temperature.mu_t,
        sigma_t: cfg.temperature.sigma_t,
    };
    if temperature.fixed_value().is_some() {
        eprintln!("[thermofit] variance too small, using the fixed-temperature gradient field");
    }
    let start = Instant::now();
    let traj = model.solve_trajectory(
        mode,
        temperature,
        TraitPoint::new(plan.ctmin0, plan.b0),
        plan.t_end,
    );
    let end = traj.terminal();
    eprintln!(
        "[thermofit] trajectory {} steps to t={:.3e} in {:.1}ms, terminal ctmin={:.4} b={:.4}",
        traj.ts.len() - 1,
        traj.t_end(),
        start.elapsed().as_secs_f64() * 1000.0,
        end[0],
        end[1]
    );
    if traj.status != IvpStatus::Completed {
        eprintln!("[thermofit] WARNING: IVP solver stopped early ({:?})", traj.status);
    }
    Ok(traj)
}

// ============================================================================
// Run Modes
// ============================================================================

fn run_landscape(cfg: &config::Root, cfg_text: &str, out_path: &str, json: bool) -> Result<()> {
    let model = build_model(cfg);
    let land = compute_landscape(&model, cfg)?;

    let mut w = LandscapeWriter::create(out_path)?;
    w.write_header()?;
    w.write_field(&land)?;
    w.flush()?;
    eprintln!("[thermofit] landscape written to {}", out_path);

    if json {
        let json_path = out_path.replace(".csv", ".json");
        let argmax = land.argmax();
        #[derive(Serialize)]
        struct LandscapeBundle {
            manifest: Manifest,
            landscape: LandscapeSummary,
        }
        let bundle = LandscapeBundle {
            manifest: create_manifest(cfg, cfg_text),
            landscape: LandscapeSummary {
                ctmin_n: land.ctmin_axis.len(),
                b_n: land.b_axis.len(),
                max_fitness: land.max_value(),
                argmax_ctmin: argmax.ctmin,
                argmax_b: argmax.b,
            },
        };
        fs::write(&json_path, serde_json::to_string_pretty(&bundle)?)?;
        eprintln!("[thermofit] JSON summary: {}", json_path);
    }
    Ok(())
}

fn run_optimize(cfg: &config::Root, cfg_text: &str, out_path: &str, json: bool) -> Result<()> {
    let model = build_model(cfg);
    let land = compute_landscape(&model, cfg)?;
    let opt = refine_optimum(&model, cfg, &land)?;

    let mut w = OptimumWriter::create(out_path)?;
    w.write(&opt)?;
    w.flush()?;
    eprintln!("[thermofit] optimum written to {}", out_path);

    if json {
        let json_path = out_path.replace(".csv", ".json");
        #[derive(Serialize)]
        struct OptimumBundle {
            manifest: Manifest,
            optimum: OptimumSummary,
        }
        let bundle = OptimumBundle {
            manifest: create_manifest(cfg, cfg_text),
            optimum: OptimumSummary::from(&opt),
        };
        fs::write(&json_path, serde_json::to_string_pretty(&bundle)?)?;
        eprintln!("[thermofit] JSON optimum: {}", json_path);
    }
    Ok(())
}

fn run_trajectory(cfg: &config::Root, cfg_text: &str, out_path: &str, json: bool) -> Result<()> {
    let model = build_model(cfg);
    let traj = integrate_trajectory(&model, cfg)?;

    let mut w = TrajectoryWriter::create(out_path)?;
    w.write_header()?;
    w.write_nodes(&traj)?;
    w.flush()?;
    eprintln!("[thermofit] trajectory written to {}", out_path);

    if json {
        let json_path = out_path.replace(".csv", ".json");
        #[derive(Serialize)]
        struct TrajectoryBundle {
            manifest: Manifest,
            trajectory: TrajectorySummary,
        }
        let bundle = TrajectoryBundle {
            manifest: create_manifest(cfg, cfg_text),
            trajectory: trajectory_summary(&traj),
        };
        fs::write(&json_path, serde_json::to_string_pretty(&bundle)?)?;
        eprintln!("[thermofit] JSON trajectory: {}", json_path);
    }
    Ok(())
}

fn run_predict(cfg: &config::Root, cfg_text: &str, out_prefix: &str, json: bool) -> Result<()> {
    let model = build_model(cfg);
    let start = Instant::now();

    let land = compute_landscape(&model, cfg)?;
    let opt = refine_optimum(&model, cfg, &land)?;
    let traj = integrate_trajectory(&model, cfg)?;

    let land_path = format!("{}_landscape.csv", out_prefix);
    let mut w = LandscapeWriter::create(&land_path)?;
    w.write_header()?;
    w.write_field(&land)?;
    w.flush()?;

    let opt_path = format!("{}_optimum.csv", out_prefix);
    let mut w = OptimumWriter::create(&opt_path)?;
    w.write(&opt)?;
    w.flush()?;

    let traj_path = format!("{}_trajectory.csv", out_prefix);
    let mut w = TrajectoryWriter::create(&traj_path)?;
    w.write_header()?;
    w.write_nodes(&traj)?;
    w.flush()?;

    let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;
    eprintln!(
        "[thermofit] prediction complete in {:.1}ms: {}, {}, {}",
        wall_time_ms, land_path, opt_path, traj_path
    );

    if json {
        let json_path = format!("{}_summary.json", out_prefix);
        let argmax = land.argmax();
        let bundle = PredictBundle {
            manifest: create_manifest(cfg, cfg_text),
            landscape: LandscapeSummary {
                ctmin_n: land.ctmin_axis.len(),
                b_n: land.b_axis.len(),
                max_fitness: land.max_value(),
                argmax_ctmin: argmax.ctmin,
                argmax_b: argmax.b,
            },
            optimum: OptimumSummary::from(&opt),
            trajectory: trajectory_summary(&traj),
            wall_time_ms,
        };
        fs::write(&json_path, serde_json::to_string_pretty(&bundle)?)?;
        eprintln!("[thermofit] JSON bundle: {}", json_path);
    }
    Ok(())
}

fn validate_config(cfg_path: &str) -> Result<()> {
    let cfg_text = fs::read_to_string(cfg_path)
        .with_context(|| format!("failed to read config: {}", cfg_path))?;

    let cfg: config::Root = toml::from_str(&cfg_text)
        .with_context(|| format!("failed to parse config: {}", cfg_path))?;

    cfg.validate()?;

    eprintln!("[thermofit] config valid: {}", cfg_path);
    eprintln!("  model: recovery={}", cfg.model.recovery);
    eprintln!(
        "  temperature: mu_t={}, sigma_t={}",
        cfg.temperature.mu_t, cfg.temperature.sigma_t
    );
    eprintln!(
        "  constraints: b_critical={}, ctmin_critical={}, ctmax_critical={}, days_per_gen={}",
        cfg.constraints.b_critical,
        cfg.constraints.ctmin_critical,
        cfg.constraints.ctmax_critical,
        cfg.constraints.days_per_gen
    );
    if let Some(ref grid) = cfg.grid {
        eprintln!(
            "  grid: ctmin=[{},{}]x{}, b=[{},{}]x{}",
            grid.ctmin_min, grid.ctmin_max, grid.ctmin_n, grid.b_min, grid.b_max, grid.b_n
        );
    }
    if let Some(ref traj) = cfg.trajectory {
        eprintln!(
            "  trajectory: ctmin0={}, b0={}, t_end={:.1e}",
            traj.ctmin0, traj.b0, traj.t_end
        );
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn load_config(cfg_path: Option<&str>) -> Result<(config::Root, String)> {
    let cfg_path = cfg_path.context("--config required")?;
    let cfg_text = fs::read_to_string(cfg_path)
        .with_context(|| format!("failed to read config: {}", cfg_path))?;
    let cfg: config::Root = toml::from_str(&cfg_text)
        .with_context(|| format!("failed to parse config: {}", cfg_path))?;
    cfg.validate()?;
    Ok((cfg, cfg_text))
}

fn main() -> Result<()> {
    let Args { command, config, out } = Args::parse();

    match command {
        Commands::Validate => {
            let cfg_path = config.as_deref().context("--config required for validate")?;
            validate_config(cfg_path)
        }
        Commands::Predict { json } => {
            let (cfg, cfg_text) = load_config(config.as_deref())?;
            let out = out.unwrap_or_else(|| "results/predict".to_string());
            eprintln!("[thermofit] v{} predict ({})", VERSION, cfg.model.recovery);
            run_predict(&cfg, &cfg_text, &out, json)
        }
        Commands::Landscape { json } => {
            let (cfg, cfg_text) = load_config(config.as_deref())?;
            let out = out.unwrap_or_else(|| "results/landscape.csv".to_string());
            eprintln!("[thermofit] v{} landscape ({})", VERSION, cfg.model.recovery);
            run_landscape(&cfg, &cfg_text, &out, json)
        }
        Commands::Optimize { json } => {
            let (cfg, cfg_text) = load_config(config.as_deref())?;
            let out = out.unwrap_or_else(|| "results/optimum.csv".to_string());
            eprintln!("[thermofit] v{} optimize ({})", VERSION, cfg.model.recovery);
            run_optimize(&cfg, &cfg_text, &out, json)
        }
        Commands::Trajectory { json } => {
            let (cfg, cfg_text) = load_config(config.as_deref())?;
            let out = out.unwrap_or_else(|| "results/trajectory.csv".to_string());
            eprintln!("[thermofit] v{} trajectory ({})", VERSION, cfg.model.recovery);
            run_trajectory(&cfg, &cfg_text, &out, json)
        }
    }
}
