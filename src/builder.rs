//! Portfolio model builder.
//!
//! Translates rival scenario trees into a [`Model`]:
//!
//! ```text
//! minimize    wcvar
//! subject to  w(n) = r(n) w(parent) + (1 - cb) b(n) - (1 + cs) s(n)     (transactions)
//!             sum b(n) - sum s(n) = 0         (W0 - sum x0 at the root)  (balance)
//!             z(l) + sum r(l) w(parent) + var(k) >= W0                   (shortfall)
//!             wcvar - var(k) - 1/(1 - beta) sum p(l) z(l) >= 0           (per tree)
//!             sum p(l) r(l) w(parent) >= target                          (per tree)
//! ```
//!
//! Decisions at t = 0 are shared by every tree, so the trees only differ
//! from the first rebalancing onward.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{CvarError, Result};
use crate::model::{
    decision_name, ConeConstraint, Constraint, Model, ObjectiveSense, Sense, VarCategory, VarKey,
    VariableBuilder,
};
use crate::scenario::{NodePath, ScenarioSet, ScenarioTree};

/// Name of the worst-case CVaR variable.
pub const WCVAR: &str = "wcvar";
/// Name of the worst-case expected wealth variable (return maximisation).
pub const WRET: &str = "wret";
/// Name of the ellipsoid radius auxiliary.
pub const ROBUST_T: &str = "rob_t";

/// Inclusive bounds of a variable family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Bounds { lower, upper }
    }
}

impl From<[f64; 2]> for Bounds {
    fn from([lower, upper]: [f64; 2]) -> Self {
        Bounds { lower, upper }
    }
}

impl From<Bounds> for [f64; 2] {
    fn from(b: Bounds) -> Self {
        [b.lower, b.upper]
    }
}

/// What the model optimises.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    /// Minimise worst-case CVaR, optionally subject to an expected terminal
    /// wealth floor in every tree.
    MinimiseCvar { return_target: Option<f64> },
    /// Maximise the worst expected terminal wealth across trees.
    MaximiseReturn,
}

/// Cost, bound and risk parameters of the model.
#[derive(Debug, Clone)]
pub struct ModelParams {
    /// CVaR confidence level.
    pub beta: f64,
    /// Proportional cost on purchases.
    pub cost_to_buy: f64,
    /// Proportional cost on sales.
    pub cost_to_sell: f64,
    pub initial_wealth: f64,
    /// Holdings before the first rebalancing, one per instrument.
    pub initial_portfolio: Vec<f64>,
    pub weight_bounds: Bounds,
    pub buy_bounds: Bounds,
    pub sell_bounds: Bounds,
    /// Upper bound on worst-case CVaR.
    pub cvar_cap: Option<f64>,
    pub mode: Mode,
}

impl ModelParams {
    /// Parameters with an equally weighted initial portfolio.
    pub fn equal_weighted(num_instruments: usize) -> Self {
        let n = num_instruments.max(1) as f64;
        ModelParams {
            beta: 0.99,
            cost_to_buy: 0.01,
            cost_to_sell: 0.01,
            initial_wealth: 1.0,
            initial_portfolio: vec![1.0 / n; num_instruments],
            weight_bounds: Bounds::new(0.0, 1.0),
            buy_bounds: Bounds::new(0.0, 0.2),
            sell_bounds: Bounds::new(0.0, 0.2),
            cvar_cap: None,
            mode: Mode::MinimiseCvar {
                return_target: Some(1.01),
            },
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Check parameters against the number of instruments.
    pub fn validate(&self, num_instruments: usize) -> Result<()> {
        if !(self.beta > 0.0 && self.beta < 1.0) {
            return Err(CvarError::InvalidParameter(format!(
                "beta must be in (0, 1), got {}",
                self.beta
            )));
        }
        for (label, cost) in [("cost_to_buy", self.cost_to_buy), ("cost_to_sell", self.cost_to_sell)] {
            if !(0.0..1.0).contains(&cost) {
                return Err(CvarError::InvalidParameter(format!(
                    "{} must be in [0, 1), got {}",
                    label, cost
                )));
            }
        }
        if !(self.initial_wealth.is_finite() && self.initial_wealth > 0.0) {
            return Err(CvarError::InvalidParameter(format!(
                "initial_wealth must be positive, got {}",
                self.initial_wealth
            )));
        }
        if self.initial_portfolio.len() != num_instruments {
            return Err(CvarError::InvalidParameter(format!(
                "initial portfolio has {} entries, expected {}",
                self.initial_portfolio.len(),
                num_instruments
            )));
        }
        if self
            .initial_portfolio
            .iter()
            .any(|x| !x.is_finite() || *x < 0.0)
        {
            return Err(CvarError::InvalidParameter(
                "initial portfolio holdings must be finite and non-negative".into(),
            ));
        }
        for (label, b) in [
            ("weight", self.weight_bounds),
            ("buy", self.buy_bounds),
            ("sell", self.sell_bounds),
        ] {
            if b.lower.is_nan() || b.upper.is_nan() || b.lower > b.upper {
                return Err(CvarError::InvalidParameter(format!(
                    "{} bounds [{}, {}] are inverted",
                    label, b.lower, b.upper
                )));
            }
        }
        if let Some(cap) = self.cvar_cap {
            if !cap.is_finite() {
                return Err(CvarError::InvalidParameter("cvar_cap must be finite".into()));
            }
        }
        if let Mode::MinimiseCvar {
            return_target: Some(target),
        } = self.mode
        {
            if !target.is_finite() {
                return Err(CvarError::InvalidParameter(
                    "return_target must be finite".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Ellipsoidal uncertainty on first-period expected returns.
///
/// The worst case of `mu'w` over `{mu + kappa L u : ||u|| <= 1}` is
/// `mu'w - kappa ||L'w||`, with `Sigma = L L'`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirstStageRobustness {
    /// Nominal expected gross return per instrument.
    pub mean: Vec<f64>,
    /// Covariance of the estimate, row-major.
    pub covariance: Vec<Vec<f64>>,
    /// Radius of the ellipsoid.
    pub kappa: f64,
    /// Floor on the worst-case first-period wealth.
    pub min_return: f64,
}

impl FirstStageRobustness {
    /// Lower Cholesky factor of the covariance.
    pub fn cholesky_factor(&self, num_instruments: usize) -> Result<DMatrix<f64>> {
        let n = num_instruments;
        if self.mean.len() != n {
            return Err(CvarError::InvalidParameter(format!(
                "robust mean has {} entries, expected {}",
                self.mean.len(),
                n
            )));
        }
        if self.covariance.len() != n || self.covariance.iter().any(|row| row.len() != n) {
            return Err(CvarError::InvalidParameter(format!(
                "robust covariance must be {}x{}",
                n, n
            )));
        }
        if !(self.kappa.is_finite() && self.kappa >= 0.0) || !self.min_return.is_finite() {
            return Err(CvarError::InvalidParameter(
                "kappa must be non-negative and min_return finite".into(),
            ));
        }
        let sigma = DMatrix::from_fn(n, n, |i, j| self.covariance[i][j]);
        sigma
            .cholesky()
            .map(|c| c.l())
            .ok_or_else(|| {
                CvarError::InvalidParameter("robust covariance is not positive definite".into())
            })
    }
}

/// Name of the holding variable of an instrument at a node.
pub fn holding_name(tree: &str, path: &NodePath, instrument: &str) -> String {
    node_decision_name(VarCategory::Weight, tree, path, instrument)
}

/// Root decisions are shared, so their names omit the tree.
fn node_decision_name(category: VarCategory, tree: &str, path: &NodePath, instrument: &str) -> String {
    let tree = if path.is_root() { None } else { Some(tree) };
    decision_name(category, tree, Some(path), Some(instrument))
}

/// Expected terminal wealth of one tree as terms over parent holdings.
pub fn expected_wealth_terms(scenarios: &ScenarioSet, tree: &ScenarioTree) -> Vec<(String, f64)> {
    let instruments = scenarios.instruments();
    let mut coeffs: BTreeMap<(NodePath, usize), f64> = BTreeMap::new();
    for leaf in tree.final_nodes() {
        let parent = leaf.path.parent().unwrap_or_default();
        for (i, r) in leaf.returns.iter().enumerate() {
            *coeffs.entry((parent.clone(), i)).or_insert(0.0) += leaf.cumulative_probability * r;
        }
    }
    coeffs
        .into_iter()
        .map(|((parent, i), c)| (holding_name(tree.id(), &parent, &instruments[i]), c))
        .collect()
}

/// Builds the robust multi-stage CVaR model.
#[derive(Debug, Clone)]
pub struct PortfolioModelBuilder<'a> {
    scenarios: &'a ScenarioSet,
    params: &'a ModelParams,
    robustness: Option<&'a FirstStageRobustness>,
}

impl<'a> PortfolioModelBuilder<'a> {
    pub fn new(scenarios: &'a ScenarioSet, params: &'a ModelParams) -> Self {
        PortfolioModelBuilder {
            scenarios,
            params,
            robustness: None,
        }
    }

    /// Add the ellipsoidal first-stage constraint (second-order cone).
    pub fn with_robustness(mut self, robustness: &'a FirstStageRobustness) -> Self {
        self.robustness = Some(robustness);
        self
    }

    /// Assemble the model.
    pub fn build(&self) -> Result<Model> {
        let n = self.scenarios.instruments().len();
        self.params.validate(n)?;

        let sense = match self.params.mode {
            Mode::MinimiseCvar { .. } => ObjectiveSense::Minimize,
            Mode::MaximiseReturn => ObjectiveSense::Maximize,
        };
        let mut model = Model::new("robust_cvar", sense);

        let root = NodePath::root();
        self.declare_node(&mut model, "", &root)?;
        for tree in self.scenarios.trees() {
            for node in tree.internal_nodes() {
                self.declare_node(&mut model, tree.id(), &node.path)?;
            }
        }
        if self.has_risk_block() {
            self.declare_risk_variables(&mut model)?;
        }
        if self.params.mode == Mode::MaximiseReturn {
            let wret = VariableBuilder::new(WRET, VarCategory::WorstCaseReturn)
                .free()
                .obj(1.0)
                .build();
            model.add_variable(wret)?;
        }

        self.add_root_rows(&mut model)?;
        for tree in self.scenarios.trees() {
            self.add_tree_rows(&mut model, tree)?;
        }

        if let Some(robustness) = self.robustness {
            self.add_robust_rows(&mut model, robustness)?;
        }

        tracing::debug!(
            variables = model.num_variables(),
            constraints = model.num_constraints(),
            cones = model.cones().len(),
            trees = self.scenarios.num_trees(),
            "assembled portfolio model"
        );

        Ok(model)
    }

    /// Return maximisation only needs the CVaR rows when a cap binds them;
    /// without one the auxiliaries would be free of cost and unbounded.
    fn has_risk_block(&self) -> bool {
        matches!(self.params.mode, Mode::MinimiseCvar { .. }) || self.params.cvar_cap.is_some()
    }

    fn declare_node(&self, model: &mut Model, tree: &str, path: &NodePath) -> Result<()> {
        let families = [
            (VarCategory::Weight, self.params.weight_bounds),
            (VarCategory::Buy, self.params.buy_bounds),
            (VarCategory::Sell, self.params.sell_bounds),
        ];
        for (i, instrument) in self.scenarios.instruments().iter().enumerate() {
            for (category, bounds) in families {
                let key = VarKey {
                    tree: (!path.is_root()).then(|| tree.to_string()),
                    node: Some(path.clone()),
                    instrument: Some(i),
                };
                let var = VariableBuilder::new(
                    node_decision_name(category, tree, path, instrument),
                    category,
                )
                .bounds(bounds.lower, bounds.upper)
                .key(key)
                .build();
                model.add_variable(var)?;
            }
        }
        Ok(())
    }

    fn declare_risk_variables(&self, model: &mut Model) -> Result<()> {
        for tree in self.scenarios.trees() {
            for leaf in tree.final_nodes() {
                let var = VariableBuilder::new(
                    decision_name(VarCategory::Shortfall, Some(tree.id()), Some(&leaf.path), None),
                    VarCategory::Shortfall,
                )
                .key(VarKey {
                    tree: Some(tree.id().to_string()),
                    node: Some(leaf.path.clone()),
                    instrument: None,
                })
                .build();
                model.add_variable(var)?;
            }
            let var = VariableBuilder::new(
                decision_name(VarCategory::ValueAtRisk, Some(tree.id()), None, None),
                VarCategory::ValueAtRisk,
            )
            .free()
            .key(VarKey {
                tree: Some(tree.id().to_string()),
                node: None,
                instrument: None,
            })
            .build();
            model.add_variable(var)?;
        }

        let minimise_cvar = matches!(self.params.mode, Mode::MinimiseCvar { .. });
        let wcvar = VariableBuilder::new(WCVAR, VarCategory::WorstCaseCvar)
            .free()
            .upper(self.params.cvar_cap.unwrap_or(f64::INFINITY))
            .obj(if minimise_cvar { 1.0 } else { 0.0 })
            .build();
        model.add_variable(wcvar)?;
        Ok(())
    }

    /// Rows at t = 0: the parent holding is the initial portfolio.
    fn add_root_rows(&self, model: &mut Model) -> Result<()> {
        let root = NodePath::root();
        let p = self.params;
        for (i, instrument) in self.scenarios.instruments().iter().enumerate() {
            let row = Constraint::new(format!("trans_0_{}", instrument), Sense::Eq, p.initial_portfolio[i])
                .term(holding_name("", &root, instrument), 1.0)
                .term(node_decision_name(VarCategory::Buy, "", &root, instrument), -(1.0 - p.cost_to_buy))
                .term(node_decision_name(VarCategory::Sell, "", &root, instrument), 1.0 + p.cost_to_sell);
            model.add_constraint(row)?;
        }

        let invested: f64 = p.initial_portfolio.iter().sum();
        let balance = self.balance_row("balance_0".into(), "", &root, p.initial_wealth - invested);
        model.add_constraint(balance)
    }

    fn balance_row(&self, name: String, tree: &str, path: &NodePath, rhs: f64) -> Constraint {
        let mut row = Constraint::new(name, Sense::Eq, rhs);
        for instrument in self.scenarios.instruments() {
            row = row
                .term(node_decision_name(VarCategory::Buy, tree, path, instrument), 1.0)
                .term(node_decision_name(VarCategory::Sell, tree, path, instrument), -1.0);
        }
        row
    }

    fn add_tree_rows(&self, model: &mut Model, tree: &ScenarioTree) -> Result<()> {
        let p = self.params;
        let k = tree.id();
        let instruments = self.scenarios.instruments();

        for node in tree.internal_nodes() {
            let parent = node.path.parent().unwrap_or_default();
            for (i, instrument) in instruments.iter().enumerate() {
                let row = Constraint::new(
                    format!("trans_k{}_n{}_{}", k, node.path, instrument),
                    Sense::Eq,
                    0.0,
                )
                .term(holding_name(k, &node.path, instrument), 1.0)
                .term(holding_name(k, &parent, instrument), -node.returns[i])
                .term(node_decision_name(VarCategory::Buy, k, &node.path, instrument), -(1.0 - p.cost_to_buy))
                .term(node_decision_name(VarCategory::Sell, k, &node.path, instrument), 1.0 + p.cost_to_sell);
                model.add_constraint(row)?;
            }
            let balance = self.balance_row(format!("balance_k{}_n{}", k, node.path), k, &node.path, 0.0);
            model.add_constraint(balance)?;
        }

        if self.has_risk_block() {
            self.add_cvar_rows(model, tree)?;
        }

        let wealth = expected_wealth_terms(self.scenarios, tree);
        let name = format!("return_k{}", k);
        match p.mode {
            Mode::MinimiseCvar {
                return_target: Some(target),
            } => model.add_constraint(Constraint::geq(name, wealth, target))?,
            Mode::MinimiseCvar { return_target: None } => {}
            Mode::MaximiseReturn => {
                model.add_constraint(Constraint::geq(name, wealth, 0.0).term(WRET, -1.0))?
            }
        }
        Ok(())
    }

    /// Shortfall rows per leaf and the tree's CVaR bound on `wcvar`.
    fn add_cvar_rows(&self, model: &mut Model, tree: &ScenarioTree) -> Result<()> {
        let p = self.params;
        let k = tree.id();
        let instruments = self.scenarios.instruments();
        let var_name = decision_name(VarCategory::ValueAtRisk, Some(k), None, None);
        let tail_weight = 1.0 / (1.0 - p.beta);
        let mut wcvar_row = Constraint::new(format!("wcvar_k{}", k), Sense::Ge, 0.0)
            .term(WCVAR, 1.0)
            .term(var_name.as_str(), -1.0);

        for leaf in tree.final_nodes() {
            let parent = leaf.path.parent().unwrap_or_default();
            let z = decision_name(VarCategory::Shortfall, Some(k), Some(&leaf.path), None);
            let mut row = Constraint::new(format!("cvar_k{}_n{}", k, leaf.path), Sense::Ge, p.initial_wealth)
                .term(z.as_str(), 1.0)
                .term(var_name.as_str(), 1.0);
            for (i, instrument) in instruments.iter().enumerate() {
                row = row.term(holding_name(k, &parent, instrument), leaf.returns[i]);
            }
            model.add_constraint(row)?;

            wcvar_row = wcvar_row.term(z, -tail_weight * leaf.cumulative_probability);
        }
        model.add_constraint(wcvar_row)
    }

    fn add_robust_rows(&self, model: &mut Model, robustness: &FirstStageRobustness) -> Result<()> {
        let instruments = self.scenarios.instruments();
        let l = robustness.cholesky_factor(instruments.len())?;
        let root = NodePath::root();

        model.add_variable(VariableBuilder::new(ROBUST_T, VarCategory::Robust).build())?;

        let mut cone_args = Vec::with_capacity(instruments.len());
        for j in 0..instruments.len() {
            let u = format!("rob_u_{}", j);
            model.add_variable(VariableBuilder::new(u.as_str(), VarCategory::Robust).free().build())?;

            // u_j = (L' w)_j
            let mut row = Constraint::new(format!("robust_u_{}", j), Sense::Eq, 0.0).term(u.as_str(), 1.0);
            for (i, instrument) in instruments.iter().enumerate() {
                if l[(i, j)] != 0.0 {
                    row = row.term(holding_name("", &root, instrument), -l[(i, j)]);
                }
            }
            model.add_constraint(row)?;
            cone_args.push(u);
        }

        let mut row = Constraint::new("robust_return", Sense::Ge, robustness.min_return)
            .term(ROBUST_T, -robustness.kappa);
        for (i, instrument) in instruments.iter().enumerate() {
            row = row.term(holding_name("", &root, instrument), robustness.mean[i]);
        }
        model.add_constraint(row)?;

        model.add_cone(ConeConstraint::soc("robust_cone", ROBUST_T, cone_args))
    }
}
