//! Scenario trees and the rival-tree set consumed by the model builder.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::path::NodePath;
use crate::error::{CvarError, Result};

/// Tolerance for probabilities that must sum to one.
pub const PROBABILITY_TOL: f64 = 1e-6;

/// Identifier of a rival scenario tree.
pub type TreeId = String;

/// One node of a scenario tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioNode {
    /// Position of the node.
    pub path: NodePath,
    /// Gross return of each instrument over the period ending at this node.
    pub returns: Vec<f64>,
    /// Probability of reaching this node from its parent.
    pub probability: f64,
    /// Probability of the whole path from the root.
    pub cumulative_probability: f64,
}

/// A node as it appears in a scenario document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub path: String,
    /// Conditional branch probability.
    pub probability: f64,
    pub returns: Vec<f64>,
}

/// Scenario document written by the external tree generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDocument {
    pub instruments: Vec<String>,
    pub branching: Vec<usize>,
    pub trees: BTreeMap<TreeId, Vec<NodeRecord>>,
}

/// A single scenario tree.
#[derive(Debug, Clone)]
pub struct ScenarioTree {
    id: TreeId,
    stages: usize,
    nodes: BTreeMap<NodePath, ScenarioNode>,
}

impl ScenarioTree {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of branching levels.
    pub fn stages(&self) -> usize {
        self.stages
    }

    /// Look up a node by path.
    pub fn node(&self, path: &NodePath) -> Option<&ScenarioNode> {
        self.nodes.get(path)
    }

    /// All non-root nodes, parents before children.
    pub fn nodes(&self) -> impl Iterator<Item = &ScenarioNode> {
        self.nodes.values()
    }

    /// Interior nodes where the portfolio is rebalanced.
    pub fn internal_nodes(&self) -> impl Iterator<Item = &ScenarioNode> {
        let stages = self.stages;
        self.nodes.values().filter(move |n| n.path.depth() < stages)
    }

    /// Leaves carrying the terminal path probability.
    pub fn final_nodes(&self) -> impl Iterator<Item = &ScenarioNode> {
        let stages = self.stages;
        self.nodes.values().filter(move |n| n.path.depth() == stages)
    }
}

/// Rival scenario trees sharing instruments and branching.
#[derive(Debug, Clone)]
pub struct ScenarioSet {
    instruments: Vec<String>,
    branching: Vec<usize>,
    trees: BTreeMap<TreeId, ScenarioTree>,
}

impl ScenarioSet {
    /// Validate a scenario document and derive cumulative probabilities.
    pub fn from_document(doc: ScenarioDocument) -> Result<Self> {
        validate_instruments(&doc.instruments)?;

        if doc.branching.is_empty() || doc.branching.contains(&0) {
            return Err(CvarError::InvalidScenario(format!(
                "branching must be non-empty and positive, got {:?}",
                doc.branching
            )));
        }
        if doc.trees.is_empty() {
            return Err(CvarError::InvalidScenario("no scenario trees".into()));
        }

        let mut trees = BTreeMap::new();
        for (id, records) in doc.trees {
            validate_name("tree id", &id)?;
            let tree = build_tree(&id, records, &doc.branching, doc.instruments.len())?;
            trees.insert(id, tree);
        }

        tracing::debug!(
            instruments = doc.instruments.len(),
            stages = doc.branching.len(),
            trees = trees.len(),
            "loaded scenario set"
        );

        Ok(ScenarioSet {
            instruments: doc.instruments,
            branching: doc.branching,
            trees,
        })
    }

    /// Parse a JSON scenario document.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: ScenarioDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    /// Read a JSON scenario document from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn branching(&self) -> &[usize] {
        &self.branching
    }

    /// Number of branching levels.
    pub fn stages(&self) -> usize {
        self.branching.len()
    }

    pub fn trees(&self) -> impl Iterator<Item = &ScenarioTree> {
        self.trees.values()
    }

    pub fn tree(&self, id: &str) -> Option<&ScenarioTree> {
        self.trees.get(id)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

fn validate_instruments(instruments: &[String]) -> Result<()> {
    if instruments.is_empty() {
        return Err(CvarError::InvalidScenario("no instruments".into()));
    }
    let mut seen = HashSet::new();
    for name in instruments {
        validate_name("instrument", name)?;
        if !seen.insert(name.as_str()) {
            return Err(CvarError::InvalidScenario(format!(
                "duplicate instrument '{}'",
                name
            )));
        }
    }
    Ok(())
}

/// Names end up inside LP variable names, so keep to a safe alphabet.
fn validate_name(kind: &str, name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(CvarError::InvalidScenario(format!(
            "{} name '{}' must be ASCII alphanumeric, '_' or '.'",
            kind, name
        )))
    }
}

fn build_tree(
    id: &str,
    records: Vec<NodeRecord>,
    branching: &[usize],
    num_instruments: usize,
) -> Result<ScenarioTree> {
    let stages = branching.len();
    let mut conditional: BTreeMap<NodePath, NodeRecord> = BTreeMap::new();

    for record in records {
        let path: NodePath = record.path.parse()?;
        let depth = path.depth();
        if depth > stages {
            return Err(CvarError::InvalidScenario(format!(
                "tree {}: node {} is deeper than {} stages",
                id, path, stages
            )));
        }
        for (level, &branch) in path.indices().iter().enumerate() {
            if branch >= branching[level] {
                return Err(CvarError::InvalidScenario(format!(
                    "tree {}: node {} uses branch {} at level {} (branching {})",
                    id,
                    path,
                    branch,
                    level + 1,
                    branching[level]
                )));
            }
        }
        if record.returns.len() != num_instruments {
            return Err(CvarError::InvalidScenario(format!(
                "tree {}: node {} has {} returns, expected {}",
                id,
                path,
                record.returns.len(),
                num_instruments
            )));
        }
        if record.returns.iter().any(|r| !r.is_finite()) {
            return Err(CvarError::InvalidScenario(format!(
                "tree {}: node {} has a non-finite return",
                id, path
            )));
        }
        if !(0.0..=1.0).contains(&record.probability) {
            return Err(CvarError::InvalidScenario(format!(
                "tree {}: node {} has probability {} outside [0, 1]",
                id, path, record.probability
            )));
        }
        if conditional.insert(path.clone(), record).is_some() {
            return Err(CvarError::InvalidScenario(format!(
                "tree {}: duplicate node {}",
                id, path
            )));
        }
    }

    // With valid, unique indices a full level count means no node is missing.
    let mut expected = 1usize;
    for (level, &width) in branching.iter().enumerate() {
        expected *= width;
        let depth = level + 1;
        let found = conditional.keys().filter(|p| p.depth() == depth).count();
        if found != expected {
            return Err(CvarError::InvalidScenario(format!(
                "tree {}: level {} has {} nodes, expected {}",
                id, depth, found, expected
            )));
        }
    }

    let mut sibling_mass: BTreeMap<NodePath, f64> = BTreeMap::new();
    for (path, record) in &conditional {
        let parent = path.parent().unwrap_or_default();
        *sibling_mass.entry(parent).or_insert(0.0) += record.probability;
    }
    for (parent, mass) in &sibling_mass {
        if (mass - 1.0).abs() > PROBABILITY_TOL {
            return Err(CvarError::InvalidScenario(format!(
                "tree {}: branch probabilities below node '{}' sum to {}",
                id, parent, mass
            )));
        }
    }

    // Parents precede children in path order.
    let mut nodes: BTreeMap<NodePath, ScenarioNode> = BTreeMap::new();
    for (path, record) in conditional {
        let parent_cumulative = match path.parent() {
            Some(parent) if !parent.is_root() => nodes
                .get(&parent)
                .map(|n| n.cumulative_probability)
                .unwrap_or(0.0),
            _ => 1.0,
        };
        let node = ScenarioNode {
            path: path.clone(),
            returns: record.returns,
            probability: record.probability,
            cumulative_probability: parent_cumulative * record.probability,
        };
        nodes.insert(path, node);
    }

    Ok(ScenarioTree {
        id: id.to_string(),
        stages,
        nodes,
    })
}
