//! Clarabel solver integration.
//!
//! Interior-point backend for LP and SOCP models.

use std::time::Instant;

use clarabel::algebra::CscMatrix as ClarabelCsc;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};

use super::stuffing::{stuff_model, ConeDims};
use super::{Settings, Solution, SolveStatus, SolverBackend};
use crate::error::{CvarError, Result};
use crate::model::Model;

impl From<SolverStatus> for SolveStatus {
    fn from(status: SolverStatus) -> Self {
        match status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => SolveStatus::Optimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                SolveStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                SolveStatus::Unbounded
            }
            SolverStatus::MaxIterations | SolverStatus::MaxTime => SolveStatus::MaxIterations,
            SolverStatus::NumericalError | SolverStatus::InsufficientProgress => {
                SolveStatus::NumericalError
            }
            _ => SolveStatus::Unknown,
        }
    }
}

/// Conic backend built on Clarabel.
#[derive(Debug, Clone, Default)]
pub struct ClarabelBackend {
    settings: Settings,
}

impl ClarabelBackend {
    pub fn new(settings: Settings) -> Self {
        ClarabelBackend { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl SolverBackend for ClarabelBackend {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn solve(&self, model: &Model) -> Result<Solution> {
        let started = Instant::now();
        let problem = stuff_model(model);

        // Convert to Clarabel format
        let p = to_clarabel_csc(&problem.p);
        let a = to_clarabel_csc(&problem.a);
        let cones = to_clarabel_cones(&problem.cone_dims);

        let clarabel_settings = DefaultSettingsBuilder::default()
            .verbose(self.settings.verbose)
            .max_iter(self.settings.max_iter)
            .time_limit(self.settings.time_limit)
            .tol_gap_abs(self.settings.tol_gap_abs)
            .tol_gap_rel(self.settings.tol_gap_rel)
            .build()
            .map_err(|e| CvarError::SolverError(format!("invalid Clarabel settings: {}", e)))?;

        let mut solver = DefaultSolver::new(&p, &problem.q, &a, &problem.b, &cones, clarabel_settings);
        solver.solve();

        let status: SolveStatus = solver.solution.status.into();
        let iterations = solver.info.iterations;
        let solve_time = started.elapsed().as_secs_f64();

        if status != SolveStatus::Optimal {
            return Ok(Solution::unsolved(status, solve_time, iterations));
        }

        let x = solver.solution.x.clone();
        Ok(Solution {
            status,
            value: Some(model.objective_value(&x)),
            primal: Some(x),
            solve_time,
            iterations,
        })
    }
}

/// Convert nalgebra CSC to Clarabel CSC.
fn to_clarabel_csc(m: &nalgebra_sparse::CscMatrix<f64>) -> ClarabelCsc<f64> {
    ClarabelCsc::new(
        m.nrows(),
        m.ncols(),
        m.col_offsets().to_vec(),
        m.row_indices().to_vec(),
        m.values().to_vec(),
    )
}

/// Convert cone dimensions to Clarabel cones.
fn to_clarabel_cones(dims: &ConeDims) -> Vec<SupportedConeT<f64>> {
    let mut cones = Vec::new();

    if dims.zero > 0 {
        cones.push(SupportedConeT::ZeroConeT(dims.zero));
    }

    if dims.nonneg > 0 {
        cones.push(SupportedConeT::NonnegativeConeT(dims.nonneg));
    }

    for &soc_dim in &dims.soc {
        cones.push(SupportedConeT::SecondOrderConeT(soc_dim));
    }

    cones
}
