//! Efficient frontier of worst-case CVaR against the return target.

use serde::Serialize;

use crate::builder::Mode;
use crate::error::{CvarError, Result};
use crate::portfolio::{Outcome, PortfolioProblem};
use crate::solver::SolverBackend;

/// One point of the frontier.
#[derive(Debug, Clone, Serialize)]
pub struct FrontierPoint {
    /// Expected terminal wealth floor imposed in every tree.
    pub target: f64,
    /// Minimal worst-case CVaR at this target, NaN if not solved.
    pub wcvar: f64,
    /// First-stage weights, NaN if not solved.
    pub weights: Vec<f64>,
}

/// Frontier together with the return range it spans.
#[derive(Debug, Clone, Serialize)]
pub struct Frontier {
    pub instruments: Vec<String>,
    /// Worst-case expected wealth of the minimum-CVaR portfolio.
    pub min_return: f64,
    /// Best achievable worst-case expected wealth.
    pub max_return: f64,
    pub points: Vec<FrontierPoint>,
}

impl Frontier {
    /// Points whose model solved.
    pub fn solved(&self) -> impl Iterator<Item = &FrontierPoint> {
        self.points.iter().filter(|p| !p.wcvar.is_nan())
    }
}

/// `n` evenly spaced values in `[lo, hi]`.
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { hi } else { lo + step * i as f64 })
                .collect()
        }
    }
}

/// Trace the frontier between the minimum-CVaR and maximum-return portfolios.
///
/// The objective mode in `problem.params` is ignored; each step sets its own.
pub fn efficient_frontier(
    problem: &PortfolioProblem<'_>,
    backend: &dyn SolverBackend,
    points: usize,
) -> Result<Frontier> {
    if points == 0 {
        return Err(CvarError::InvalidParameter(
            "frontier needs at least one point".into(),
        ));
    }

    let min_risk = problem
        .with_mode(Mode::MinimiseCvar {
            return_target: None,
        })
        .solve(backend)?;
    let min_return = match &min_risk {
        Outcome::Solved(a) => a.worst_expected_wealth(),
        Outcome::NotSolved { status } => {
            return Err(CvarError::SolverError(format!(
                "minimum CVaR portfolio not solved ({})",
                status
            )))
        }
    };

    let max_ret = problem.with_mode(Mode::MaximiseReturn).solve(backend)?;
    let max_return = match &max_ret {
        Outcome::Solved(a) => a.objective,
        Outcome::NotSolved { status } => {
            return Err(CvarError::SolverError(format!(
                "maximum return portfolio not solved ({})",
                status
            )))
        }
    };
    // both ends come from separate solves; keep the range ordered
    let max_return = max_return.max(min_return);

    tracing::info!(min_return, max_return, points, "tracing efficient frontier");

    let n = problem.scenarios.instruments().len();
    let mut frontier = Vec::with_capacity(points);
    for target in linspace(min_return, max_return, points) {
        let outcome = problem
            .with_mode(Mode::MinimiseCvar {
                return_target: Some(target),
            })
            .solve(backend)?;
        tracing::debug!(
            return_target = target,
            wcvar = outcome.wcvar(),
            status = %outcome.status(),
            "frontier point"
        );
        frontier.push(FrontierPoint {
            target,
            wcvar: outcome.wcvar(),
            weights: outcome.weights(n),
        });
    }

    Ok(Frontier {
        instruments: problem.scenarios.instruments().to_vec(),
        min_return,
        max_return,
        points: frontier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
        let xs = linspace(1.0, 2.0, 5);
        assert_eq!(xs.len(), 5);
        assert_eq!(xs[0], 1.0);
        assert_eq!(xs[4], 2.0);
        assert!((xs[2] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_solved_skips_nan() {
        let frontier = Frontier {
            instruments: vec!["A".into()],
            min_return: 1.0,
            max_return: 1.1,
            points: vec![
                FrontierPoint {
                    target: 1.0,
                    wcvar: 0.02,
                    weights: vec![1.0],
                },
                FrontierPoint {
                    target: 1.1,
                    wcvar: f64::NAN,
                    weights: vec![f64::NAN],
                },
            ],
        };
        assert_eq!(frontier.solved().count(), 1);
    }
}
