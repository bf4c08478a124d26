//! Solver-neutral problem description.
//!
//! A `Model` is what the backends and the LP writer consume:
//! - Named variables with bounds and objective coefficients
//! - Linear constraint rows
//! - Second-order cone rows
//!
//! Well-formedness is checked as rows are added, so a `Model` that exists is
//! always consistent:
//! ```ignore
//! let mut model = Model::new("demo", ObjectiveSense::Minimize);
//! model.add_variable(VariableBuilder::new("x", VarCategory::Weight).obj(1.0).build())?;
//! model.add_constraint(Constraint::geq("floor", vec![("x".into(), 1.0)], 2.0))?;
//! ```

use std::collections::HashMap;

use super::constraint::{ConeConstraint, Constraint};
use super::variable::{DecisionVariable, VarCategory};
use crate::error::{CvarError, Result};

/// Direction of optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveSense {
    Minimize,
    Maximize,
}

impl ObjectiveSense {
    /// Check if this is a minimization.
    pub fn is_minimize(&self) -> bool {
        matches!(self, ObjectiveSense::Minimize)
    }
}

/// Parallel column arrays, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Columns {
    pub names: Vec<String>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub obj: Vec<f64>,
}

/// A linear / second-order cone program over named scalar variables.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    sense: ObjectiveSense,
    variables: Vec<DecisionVariable>,
    index: HashMap<String, usize>,
    constraints: Vec<Constraint>,
    cones: Vec<ConeConstraint>,
}

impl Model {
    pub fn new(name: impl Into<String>, sense: ObjectiveSense) -> Self {
        Model {
            name: name.into(),
            sense,
            variables: Vec::new(),
            index: HashMap::new(),
            constraints: Vec::new(),
            cones: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sense(&self) -> ObjectiveSense {
        self.sense
    }

    /// Declare a variable. Returns its column index.
    pub fn add_variable(&mut self, var: DecisionVariable) -> Result<usize> {
        if self.index.contains_key(&var.name) {
            return Err(CvarError::DuplicateVariable(var.name));
        }
        if var.lower.is_nan() || var.upper.is_nan() || var.lower > var.upper {
            return Err(CvarError::InvalidBounds {
                name: var.name,
                lower: var.lower,
                upper: var.upper,
            });
        }
        if !var.obj.is_finite() {
            return Err(CvarError::NonFinite(format!(
                "objective coefficient of {}",
                var.name
            )));
        }
        let col = self.variables.len();
        self.index.insert(var.name.clone(), col);
        self.variables.push(var);
        Ok(col)
    }

    /// Add a linear row. Every referenced variable must already be declared.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        for (var, coeff) in &constraint.terms {
            self.check_declared(&constraint.name, var)?;
            if !coeff.is_finite() {
                return Err(CvarError::NonFinite(format!(
                    "coefficient of {} in {}",
                    var, constraint.name
                )));
            }
        }
        if !constraint.rhs.is_finite() {
            return Err(CvarError::NonFinite(format!(
                "right-hand side of {}",
                constraint.name
            )));
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// Add a second-order cone row.
    pub fn add_cone(&mut self, cone: ConeConstraint) -> Result<()> {
        for var in cone.variables() {
            self.check_declared(&cone.name, var)?;
        }
        self.cones.push(cone);
        Ok(())
    }

    /// Replace the objective coefficient of a declared variable.
    pub fn set_objective(&mut self, var: &str, coeff: f64) -> Result<()> {
        if !coeff.is_finite() {
            return Err(CvarError::NonFinite(format!("objective coefficient of {}", var)));
        }
        let col = self.check_declared("objective", var)?;
        self.variables[col].obj = coeff;
        Ok(())
    }

    fn check_declared(&self, owner: &str, var: &str) -> Result<usize> {
        self.index
            .get(var)
            .copied()
            .ok_or_else(|| CvarError::UnknownVariable {
                constraint: owner.to_string(),
                variable: var.to_string(),
            })
    }

    pub fn variables(&self) -> &[DecisionVariable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&DecisionVariable> {
        self.index.get(name).map(|&col| &self.variables[col])
    }

    /// Column index of a variable.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Variables of one category, in declaration order.
    pub fn variables_of(&self, category: VarCategory) -> impl Iterator<Item = &DecisionVariable> {
        self.variables.iter().filter(move |v| v.category == category)
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn cones(&self) -> &[ConeConstraint] {
        &self.cones
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Check if the model has any cone rows.
    pub fn has_cones(&self) -> bool {
        !self.cones.is_empty()
    }

    /// Column data as parallel arrays, the layout solver APIs take.
    pub fn columns(&self) -> Columns {
        let mut cols = Columns::default();
        for v in &self.variables {
            cols.names.push(v.name.clone());
            cols.lower.push(v.lower);
            cols.upper.push(v.upper);
            cols.obj.push(v.obj);
        }
        cols
    }

    /// Objective value at a primal point given in column order.
    pub fn objective_value(&self, x: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(x)
            .map(|(v, xi)| v.obj * xi)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Sense, VariableBuilder};

    fn var(name: &str) -> DecisionVariable {
        VariableBuilder::new(name, VarCategory::Weight).build()
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        let mut model = Model::new("m", ObjectiveSense::Minimize);
        model.add_variable(var("x")).unwrap();
        let err = model.add_variable(var("x")).unwrap_err();
        assert!(matches!(err, CvarError::DuplicateVariable(name) if name == "x"));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut model = Model::new("m", ObjectiveSense::Minimize);
        let v = VariableBuilder::new("x", VarCategory::Buy)
            .bounds(1.0, 0.0)
            .build();
        assert!(matches!(
            model.add_variable(v),
            Err(CvarError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let mut model = Model::new("m", ObjectiveSense::Minimize);
        model.add_variable(var("x")).unwrap();
        let c = Constraint::new("row", Sense::Le, 1.0)
            .term("x", 1.0)
            .term("y", 1.0);
        let err = model.add_constraint(c).unwrap_err();
        assert!(err.to_string().contains("unknown variable y"));
        assert_eq!(model.num_constraints(), 0);
    }

    #[test]
    fn test_non_finite_rhs_rejected() {
        let mut model = Model::new("m", ObjectiveSense::Minimize);
        model.add_variable(var("x")).unwrap();
        let c = Constraint::leq("row", vec![("x".into(), 1.0)], f64::NAN);
        assert!(matches!(model.add_constraint(c), Err(CvarError::NonFinite(_))));
    }

    #[test]
    fn test_columns_are_parallel() {
        let mut model = Model::new("m", ObjectiveSense::Minimize);
        model.add_variable(var("x")).unwrap();
        model
            .add_variable(
                VariableBuilder::new("y", VarCategory::WorstCaseCvar)
                    .free()
                    .obj(1.0)
                    .build(),
            )
            .unwrap();
        let cols = model.columns();
        assert_eq!(cols.names.len(), 2);
        assert_eq!(cols.lower.len(), cols.names.len());
        assert_eq!(cols.upper.len(), cols.names.len());
        assert_eq!(cols.obj, vec![0.0, 1.0]);
        assert_eq!(model.column("y"), Some(1));
    }

    #[test]
    fn test_objective_value() {
        let mut model = Model::new("m", ObjectiveSense::Minimize);
        model.add_variable(var("x")).unwrap();
        model.add_variable(var("y")).unwrap();
        model.set_objective("x", 2.0).unwrap();
        model.set_objective("y", -1.0).unwrap();
        assert_eq!(model.objective_value(&[3.0, 1.0]), 5.0);
        assert!(model.set_objective("nope", 1.0).is_err());
    }
}
