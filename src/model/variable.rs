//! Decision variables with builder pattern.

use serde::Serialize;

use crate::scenario::{NodePath, TreeId};

/// Role a decision variable plays in the portfolio model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VarCategory {
    /// Holding of an instrument after rebalancing.
    Weight,
    /// Cash spent buying an instrument.
    Buy,
    /// Cash raised selling an instrument.
    Sell,
    /// CVaR shortfall auxiliary for a final node.
    Shortfall,
    /// Value at risk of one tree.
    ValueAtRisk,
    /// Worst-case CVaR across trees.
    WorstCaseCvar,
    /// Worst-case expected terminal wealth across trees.
    WorstCaseReturn,
    /// Auxiliary of the first-stage ellipsoidal uncertainty set.
    Robust,
}

impl VarCategory {
    /// Prefix used in variable names.
    pub fn prefix(&self) -> &'static str {
        match self {
            VarCategory::Weight => "w",
            VarCategory::Buy => "b",
            VarCategory::Sell => "s",
            VarCategory::Shortfall => "z",
            VarCategory::ValueAtRisk => "var",
            VarCategory::WorstCaseCvar => "wcvar",
            VarCategory::WorstCaseReturn => "wret",
            VarCategory::Robust => "rob",
        }
    }
}

/// Position of a variable in the scenario structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarKey {
    /// Owning tree; `None` for variables shared by all trees.
    pub tree: Option<TreeId>,
    /// Node; `None` for per-tree or global scalars.
    pub node: Option<NodePath>,
    /// Instrument index.
    pub instrument: Option<usize>,
}

/// A named scalar decision variable.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionVariable {
    pub name: String,
    pub category: VarCategory,
    pub lower: f64,
    pub upper: f64,
    /// Objective coefficient.
    pub obj: f64,
    pub key: Option<VarKey>,
}

/// Builder for creating decision variables.
#[derive(Debug, Clone)]
pub struct VariableBuilder {
    name: String,
    category: VarCategory,
    lower: f64,
    upper: f64,
    obj: f64,
    key: Option<VarKey>,
}

impl VariableBuilder {
    /// Start a non-negative variable with zero objective coefficient.
    pub fn new(name: impl Into<String>, category: VarCategory) -> Self {
        Self {
            name: name.into(),
            category,
            lower: 0.0,
            upper: f64::INFINITY,
            obj: 0.0,
            key: None,
        }
    }

    /// Set both bounds.
    pub fn bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    /// Remove both bounds.
    pub fn free(mut self) -> Self {
        self.lower = f64::NEG_INFINITY;
        self.upper = f64::INFINITY;
        self
    }

    pub fn upper(mut self, upper: f64) -> Self {
        self.upper = upper;
        self
    }

    /// Set the objective coefficient.
    pub fn obj(mut self, obj: f64) -> Self {
        self.obj = obj;
        self
    }

    pub fn key(mut self, key: VarKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn build(self) -> DecisionVariable {
        DecisionVariable {
            name: self.name,
            category: self.category,
            lower: self.lower,
            upper: self.upper,
            obj: self.obj,
            key: self.key,
        }
    }
}

/// Compose a variable name from its category and position.
///
/// ```
/// use robust_cvar::model::{decision_name, VarCategory};
/// use robust_cvar::scenario::NodePath;
///
/// let root = NodePath::root();
/// assert_eq!(decision_name(VarCategory::Weight, None, Some(&root), Some("KO")), "w_0_KO");
///
/// let node: NodePath = "0.1".parse().unwrap();
/// assert_eq!(
///     decision_name(VarCategory::Buy, Some("1"), Some(&node), Some("KO")),
///     "b_k1_n0.1_KO"
/// );
/// assert_eq!(decision_name(VarCategory::ValueAtRisk, Some("1"), None, None), "var_k1");
/// ```
pub fn decision_name(
    category: VarCategory,
    tree: Option<&str>,
    node: Option<&NodePath>,
    instrument: Option<&str>,
) -> String {
    let mut name = category.prefix().to_string();
    match (tree, node) {
        (_, Some(node)) if node.is_root() => name.push_str("_0"),
        (Some(tree), Some(node)) => name.push_str(&format!("_k{}_n{}", tree, node)),
        (Some(tree), None) => name.push_str(&format!("_k{}", tree)),
        (None, Some(node)) => name.push_str(&format!("_n{}", node)),
        (None, None) => {}
    }
    if let Some(instrument) = instrument {
        name.push('_');
        name.push_str(instrument);
    }
    name
}
