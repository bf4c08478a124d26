//! # robust-cvar
//!
//! Multi-stage portfolio optimisation that minimises the worst-case
//! Conditional Value-at-Risk across several rival scenario trees.
//!
//! The crate turns validated scenario trees into a linear model (with an
//! optional second-order cone for first-stage robustness) and hands it to a
//! pluggable solver backend.
//!
//! ## Quick Start
//!
//! ```ignore
//! use robust_cvar::prelude::*;
//!
//! let scenarios = ScenarioSet::from_file("scenarios.json")?;
//! let params = ModelParams::equal_weighted(scenarios.instruments().len());
//!
//! let outcome = PortfolioProblem::new(&scenarios, params).solve(&ClarabelBackend::default())?;
//! if let Some(allocation) = outcome.allocation() {
//!     println!("wcvar = {}", allocation.wcvar);
//! }
//! ```
//!
//! ## Model
//!
//! - **Transactions** link holdings at a node to the parent's holdings
//!   grown by the node's gross returns, net of proportional costs
//! - **Balance** rows keep rebalancing self-financing
//! - **CVaR** auxiliaries per leaf and a VaR per tree, Rockafellar-Uryasev style
//! - **wcvar** bounds every tree's CVaR from above and is minimised
//!
//! ## Backends
//!
//! - **Clarabel** interior point, LP and SOCP
//! - **microlp** simplex through good_lp, LP only
//! - LP text export for external solvers

pub mod builder;
pub mod config;
pub mod error;
pub mod frontier;
pub mod lp_format;
pub mod model;
pub mod portfolio;
pub mod scenario;
pub mod solver;
pub mod sparse;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use robust_cvar::prelude::*;
/// ```
pub mod prelude {
    // Scenarios
    pub use crate::scenario::{NodePath, ScenarioDocument, ScenarioSet, ScenarioTree};

    // Model
    pub use crate::builder::{Bounds, FirstStageRobustness, Mode, ModelParams, PortfolioModelBuilder};
    pub use crate::model::{Constraint, Model, ObjectiveSense, Sense, VarCategory};

    // Solving
    pub use crate::frontier::{efficient_frontier, Frontier, FrontierPoint};
    pub use crate::portfolio::{Allocation, Outcome, PortfolioProblem};
    pub use crate::solver::{
        BackendKind, ClarabelBackend, MicrolpBackend, Settings, Solution, SolveStatus,
        SolverBackend,
    };

    // Config and errors
    pub use crate::config::RunConfig;
    pub use crate::error::{CvarError, Result};
}

// Re-export main types at crate root
pub use error::{CvarError, Result};
pub use portfolio::{Outcome, PortfolioProblem};
pub use solver::{Solution, SolveStatus};
