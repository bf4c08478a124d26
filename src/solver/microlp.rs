//! Simplex backend through good_lp's pure-Rust microlp solver.

use std::time::Instant;

use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError,
    Solution as _, SolverModel, Variable,
};

use super::{Solution, SolveStatus, SolverBackend};
use crate::error::{CvarError, Result};
use crate::model::{Model, ObjectiveSense, Sense};

/// LP-only backend. Models with cone rows are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrolpBackend;

impl MicrolpBackend {
    pub fn new() -> Self {
        MicrolpBackend
    }
}

impl SolverBackend for MicrolpBackend {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(&self, model: &Model) -> Result<Solution> {
        if model.has_cones() {
            return Err(CvarError::Unsupported {
                backend: self.name(),
                feature: format!("{} second-order cone constraint(s)", model.cones().len()),
            });
        }
        let started = Instant::now();

        let mut vars = ProblemVariables::new();
        let cols: Vec<Variable> = model
            .variables()
            .iter()
            .map(|v| {
                let mut def = variable().name(v.name.clone());
                if v.lower.is_finite() {
                    def = def.min(v.lower);
                }
                if v.upper.is_finite() {
                    def = def.max(v.upper);
                }
                vars.add(def)
            })
            .collect();

        let objective: Expression = model
            .variables()
            .iter()
            .zip(&cols)
            .map(|(v, &x)| v.obj * x)
            .sum();

        let mut problem = match model.sense() {
            ObjectiveSense::Minimize => vars.minimise(objective),
            ObjectiveSense::Maximize => vars.maximise(objective),
        }
        .using(default_solver);

        for row in model.constraints() {
            let mut lhs = Expression::from(0.0);
            for (name, coeff) in &row.terms {
                let col = model.column(name).ok_or_else(|| CvarError::UnknownVariable {
                    constraint: row.name.clone(),
                    variable: name.clone(),
                })?;
                lhs.add_mul(*coeff, cols[col]);
            }
            let c = match row.sense {
                Sense::Le => constraint::leq(lhs, row.rhs),
                Sense::Ge => constraint::geq(lhs, row.rhs),
                Sense::Eq => constraint::eq(lhs, row.rhs),
            };
            problem = problem.with(c);
        }

        let status = match problem.solve() {
            Ok(solution) => {
                let x: Vec<f64> = cols.iter().map(|&c| solution.value(c)).collect();
                return Ok(Solution {
                    status: SolveStatus::Optimal,
                    value: Some(model.objective_value(&x)),
                    primal: Some(x),
                    solve_time: started.elapsed().as_secs_f64(),
                    iterations: 0,
                });
            }
            Err(ResolutionError::Infeasible) => SolveStatus::Infeasible,
            Err(ResolutionError::Unbounded) => SolveStatus::Unbounded,
            Err(e) => return Err(CvarError::SolverError(e.to_string())),
        };

        Ok(Solution::unsolved(status, started.elapsed().as_secs_f64(), 0))
    }
}
