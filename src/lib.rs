//! Analytical thermal-performance-curve engine
//!
//! Computes the expected reproductive fitness of a (CTmin, B) trait pair
//! under stochastic temperature, locates the fitness optimum, and
//! integrates the gradient-ascent trajectory the trait pair follows toward
//! it. The crate is a pure computation library; the companion binary wires
//! it to TOML configuration and CSV/JSON outputs.

pub mod config;
pub mod curve;
pub mod dist;
pub mod expectation;
pub mod gradient;
pub mod io;
pub mod ivp;
pub mod model;
pub mod optimize;
pub mod quadrature;

pub use curve::{ConstraintParams, TraitPoint};
pub use dist::TemperatureModel;
pub use expectation::{Landscape, RecoveryMode};
pub use ivp::{IvpStatus, Trajectory};
pub use model::TpcModel;
pub use optimize::Optimum;

#[cfg(test)]
mod tests;
