//! Named-variable model description shared by every backend.

pub mod constraint;
pub mod problem;
pub mod variable;

pub use constraint::{ConeConstraint, Constraint, Sense};
pub use problem::{Columns, Model, ObjectiveSense};
pub use variable::{decision_name, DecisionVariable, VarCategory, VarKey, VariableBuilder};
