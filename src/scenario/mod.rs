//! Scenario trees produced by the external generator.
//!
//! This module provides:
//! - Node paths over branching levels
//! - Validated rival trees with cumulative path probabilities

pub mod path;
pub mod tree;

pub use path::NodePath;
pub use tree::{
    NodeRecord, ScenarioDocument, ScenarioNode, ScenarioSet, ScenarioTree, TreeId, PROBABILITY_TOL,
};
