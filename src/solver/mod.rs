//! Solver interface for robust-cvar.
//!
//! This module provides:
//! - The `SolverBackend` seam and backend selection
//! - Matrix stuffing to convert named models to conic form
//! - Clarabel (LP + SOCP) and microlp (LP) backends

pub mod clarabel;
pub mod microlp;
pub mod stuffing;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CvarError, Result};
use crate::model::Model;

pub use self::clarabel::ClarabelBackend;
pub use self::microlp::MicrolpBackend;
pub use stuffing::{stuff_model, ConeDims, StuffedProblem};

/// Solution status from the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Optimal solution found.
    Optimal,
    /// Problem is infeasible.
    Infeasible,
    /// Problem is unbounded.
    Unbounded,
    /// Maximum iterations or time reached.
    MaxIterations,
    /// Numerical difficulties.
    NumericalError,
    /// Unknown status.
    Unknown,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::MaxIterations => "max iterations",
            SolveStatus::NumericalError => "numerical error",
            SolveStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Solver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Print solver output.
    pub verbose: bool,
    /// Maximum iterations.
    pub max_iter: u32,
    /// Time limit in seconds.
    pub time_limit: f64,
    /// Absolute tolerance.
    pub tol_gap_abs: f64,
    /// Relative tolerance.
    pub tol_gap_rel: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            verbose: false,
            max_iter: 200,
            time_limit: f64::INFINITY,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
        }
    }
}

/// Solution from a backend.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution status.
    pub status: SolveStatus,
    /// Optimal objective value (if solved).
    pub value: Option<f64>,
    /// Primal values in model column order (if solved).
    pub primal: Option<Vec<f64>>,
    /// Solve time in seconds.
    pub solve_time: f64,
    /// Number of iterations, when the backend reports them.
    pub iterations: u32,
}

impl Solution {
    /// A solution carrying only a non-optimal status.
    pub fn unsolved(status: SolveStatus, solve_time: f64, iterations: u32) -> Self {
        Solution {
            status,
            value: None,
            primal: None,
            solve_time,
            iterations,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    /// Value of a named variable.
    pub fn value_of(&self, model: &Model, name: &str) -> Option<f64> {
        let col = model.column(name)?;
        self.primal.as_ref().and_then(|x| x.get(col).copied())
    }
}

/// An external solver that can solve a [`Model`].
pub trait SolverBackend {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Solve the model. Infeasibility is a status, not an error.
    fn solve(&self, model: &Model) -> Result<Solution>;
}

/// Which backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Interior-point conic solver; handles cone rows.
    #[default]
    Clarabel,
    /// Pure-Rust simplex through good_lp; linear rows only.
    Microlp,
}

impl FromStr for BackendKind {
    type Err = CvarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "clarabel" => Ok(BackendKind::Clarabel),
            "microlp" => Ok(BackendKind::Microlp),
            other => Err(CvarError::InvalidParameter(format!(
                "unknown solver backend '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Clarabel => f.write_str("clarabel"),
            BackendKind::Microlp => f.write_str("microlp"),
        }
    }
}

/// Instantiate the configured backend.
pub fn backend(kind: BackendKind, settings: &Settings) -> Box<dyn SolverBackend> {
    match kind {
        BackendKind::Clarabel => Box::new(ClarabelBackend::new(settings.clone())),
        BackendKind::Microlp => Box::new(MicrolpBackend::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(!settings.verbose);
        assert_eq!(settings.max_iter, 200);
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("Clarabel".parse::<BackendKind>().unwrap(), BackendKind::Clarabel);
        assert_eq!("microlp".parse::<BackendKind>().unwrap(), BackendKind::Microlp);
        assert!("cplex".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_backend_names() {
        let settings = Settings::default();
        assert_eq!(backend(BackendKind::Clarabel, &settings).name(), "clarabel");
        assert_eq!(backend(BackendKind::Microlp, &settings).name(), "microlp");
    }
}
