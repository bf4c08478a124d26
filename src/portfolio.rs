//! Build, solve and read back a robust portfolio.
//!
//! The single-pass flow is: scenario set and parameters, then [`Model`],
//! then a [`SolverBackend`], then an [`Outcome`]. A solve that does not
//! reach optimality is reported as [`Outcome::NotSolved`] rather than an
//! error, so sweeps such as the efficient frontier can keep going.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::builder::{
    expected_wealth_terms, holding_name, FirstStageRobustness, Mode, ModelParams,
    PortfolioModelBuilder,
};
use crate::error::{CvarError, Result};
use crate::model::{decision_name, Model, VarCategory};
use crate::scenario::{NodePath, ScenarioSet, TreeId};
use crate::solver::{Solution, SolveStatus, SolverBackend};

/// Optimal first-stage decision and risk figures.
#[derive(Debug, Clone, Serialize)]
pub struct Allocation {
    pub instruments: Vec<String>,
    /// Optimal objective value.
    pub objective: f64,
    /// Holdings after the t = 0 rebalancing.
    pub weights: Vec<f64>,
    pub buys: Vec<f64>,
    pub sells: Vec<f64>,
    /// Worst-case CVaR across trees, evaluated at the optimal holdings.
    pub wcvar: f64,
    /// Realised VaR of each tree's terminal loss.
    pub value_at_risk: BTreeMap<TreeId, f64>,
    /// Realised CVaR of each tree's terminal loss.
    pub cvar: BTreeMap<TreeId, f64>,
    /// Expected terminal wealth per tree.
    pub expected_wealth: BTreeMap<TreeId, f64>,
    pub solve_time: f64,
}

impl Allocation {
    /// Weight of a named instrument.
    pub fn weight(&self, instrument: &str) -> Option<f64> {
        self.instruments
            .iter()
            .position(|i| i == instrument)
            .map(|idx| self.weights[idx])
    }

    /// Lowest expected terminal wealth across trees.
    pub fn worst_expected_wealth(&self) -> f64 {
        self.expected_wealth
            .values()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }
}

/// Result of one portfolio solve.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Solved(Allocation),
    /// The solver stopped without an optimal point (e.g. infeasible target).
    NotSolved { status: SolveStatus },
}

impl Outcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, Outcome::Solved(_))
    }

    pub fn status(&self) -> SolveStatus {
        match self {
            Outcome::Solved(_) => SolveStatus::Optimal,
            Outcome::NotSolved { status } => *status,
        }
    }

    pub fn allocation(&self) -> Option<&Allocation> {
        match self {
            Outcome::Solved(a) => Some(a),
            Outcome::NotSolved { .. } => None,
        }
    }

    /// Objective value, or NaN when not solved.
    pub fn objective(&self) -> f64 {
        self.allocation().map_or(f64::NAN, |a| a.objective)
    }

    /// Worst-case CVaR, or NaN when not solved.
    pub fn wcvar(&self) -> f64 {
        self.allocation().map_or(f64::NAN, |a| a.wcvar)
    }

    /// First-stage weights, or NaN for each instrument when not solved.
    pub fn weights(&self, num_instruments: usize) -> Vec<f64> {
        match self {
            Outcome::Solved(a) => a.weights.clone(),
            Outcome::NotSolved { .. } => vec![f64::NAN; num_instruments],
        }
    }
}

/// Everything needed to assemble one portfolio model.
#[derive(Debug, Clone)]
pub struct PortfolioProblem<'a> {
    pub scenarios: &'a ScenarioSet,
    pub params: ModelParams,
    pub robustness: Option<FirstStageRobustness>,
}

impl<'a> PortfolioProblem<'a> {
    pub fn new(scenarios: &'a ScenarioSet, params: ModelParams) -> Self {
        PortfolioProblem {
            scenarios,
            params,
            robustness: None,
        }
    }

    pub fn with_robustness(mut self, robustness: FirstStageRobustness) -> Self {
        self.robustness = Some(robustness);
        self
    }

    /// Same problem with a different objective mode.
    pub fn with_mode(&self, mode: Mode) -> Self {
        PortfolioProblem {
            params: self.params.clone().with_mode(mode),
            ..self.clone()
        }
    }

    /// Assemble the model without solving it.
    pub fn build_model(&self) -> Result<Model> {
        let builder = PortfolioModelBuilder::new(self.scenarios, &self.params);
        match &self.robustness {
            Some(r) => builder.with_robustness(r).build(),
            None => builder.build(),
        }
    }

    /// Build, solve and extract the first-stage allocation.
    pub fn solve(&self, backend: &dyn SolverBackend) -> Result<Outcome> {
        let model = self.build_model()?;
        let solution = backend.solve(&model)?;

        if !solution.is_optimal() {
            tracing::warn!(
                backend = backend.name(),
                status = %solution.status,
                mode = ?self.params.mode,
                "portfolio model not solved"
            );
            return Ok(Outcome::NotSolved {
                status: solution.status,
            });
        }

        let allocation = self.extract(&model, &solution)?;
        tracing::info!(
            backend = backend.name(),
            objective = allocation.objective,
            wcvar = allocation.wcvar,
            solve_time = allocation.solve_time,
            "portfolio model solved"
        );
        Ok(Outcome::Solved(allocation))
    }

    fn extract(&self, model: &Model, solution: &Solution) -> Result<Allocation> {
        let value = |name: &str| {
            solution.value_of(model, name).ok_or_else(|| {
                CvarError::SolverError(format!("solution has no value for {}", name))
            })
        };

        let root = NodePath::root();
        let instruments = self.scenarios.instruments().to_vec();
        let mut weights = Vec::with_capacity(instruments.len());
        let mut buys = Vec::with_capacity(instruments.len());
        let mut sells = Vec::with_capacity(instruments.len());
        for instrument in &instruments {
            weights.push(value(&holding_name("", &root, instrument))?);
            buys.push(value(&decision_name(
                VarCategory::Buy,
                None,
                Some(&root),
                Some(instrument),
            ))?);
            sells.push(value(&decision_name(
                VarCategory::Sell,
                None,
                Some(&root),
                Some(instrument),
            ))?);
        }

        let mut value_at_risk = BTreeMap::new();
        let mut cvar = BTreeMap::new();
        let mut expected_wealth = BTreeMap::new();
        for tree in self.scenarios.trees() {
            let mut losses = Vec::new();
            for leaf in tree.final_nodes() {
                let parent = leaf.path.parent().unwrap_or_default();
                let mut wealth = 0.0;
                for (i, instrument) in instruments.iter().enumerate() {
                    wealth += leaf.returns[i] * value(&holding_name(tree.id(), &parent, instrument))?;
                }
                losses.push((self.params.initial_wealth - wealth, leaf.cumulative_probability));
            }
            let (var, tail) = tail_risk(&mut losses, self.params.beta);
            value_at_risk.insert(tree.id().to_string(), var);
            cvar.insert(tree.id().to_string(), tail);

            let mut wealth = 0.0;
            for (name, coeff) in expected_wealth_terms(self.scenarios, tree) {
                wealth += coeff * value(&name)?;
            }
            expected_wealth.insert(tree.id().to_string(), wealth);
        }

        // The model variable is only tight when minimised, so report the realised value.
        let wcvar = cvar.values().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(Allocation {
            instruments,
            objective: solution.value.unwrap_or(f64::NAN),
            weights,
            buys,
            sells,
            wcvar,
            value_at_risk,
            cvar,
            expected_wealth,
            solve_time: solution.solve_time,
        })
    }
}

/// VaR and CVaR at level `beta` of a discrete loss distribution.
///
/// `losses` holds `(loss, probability)` pairs and is sorted in place. VaR is
/// the smallest loss whose cumulative probability reaches `beta`; CVaR is
/// `VaR + E[(L - VaR)+] / (1 - beta)`.
pub fn tail_risk(losses: &mut [(f64, f64)], beta: f64) -> (f64, f64) {
    if losses.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    losses.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut cumulative = 0.0;
    let mut var = losses[losses.len() - 1].0;
    for &(loss, p) in losses.iter() {
        cumulative += p;
        if cumulative >= beta - 1e-12 {
            var = loss;
            break;
        }
    }
    let excess: f64 = losses.iter().map(|&(l, p)| p * (l - var).max(0.0)).sum();
    (var, var + excess / (1.0 - beta))
}
