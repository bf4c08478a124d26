//! Constraint rows for the portfolio model.
//!
//! Constraints map to cone constraints in the conic backend:
//! - Eq: a'x = rhs (zero cone)
//! - Le / Ge: a'x <= rhs, a'x >= rhs (nonnegative orthant)
//! - Cone: ||x||_2 <= t (second-order cone)

use std::fmt;

/// Sense of a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// a'x <= rhs
    Le,
    /// a'x >= rhs
    Ge,
    /// a'x = rhs
    Eq,
}

impl Sense {
    /// Operator as written in LP files.
    pub fn symbol(&self) -> &'static str {
        match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "=",
        }
    }
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A sparse linear constraint over named variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    /// (variable name, coefficient) pairs.
    pub terms: Vec<(String, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    /// Create an empty row; add terms with [`Constraint::term`].
    pub fn new(name: impl Into<String>, sense: Sense, rhs: f64) -> Self {
        Constraint {
            name: name.into(),
            terms: Vec::new(),
            sense,
            rhs,
        }
    }

    /// Create an equality constraint: terms == rhs.
    pub fn eq(name: impl Into<String>, terms: Vec<(String, f64)>, rhs: f64) -> Self {
        Constraint {
            terms,
            ..Constraint::new(name, Sense::Eq, rhs)
        }
    }

    /// Create an inequality constraint: terms <= rhs.
    pub fn leq(name: impl Into<String>, terms: Vec<(String, f64)>, rhs: f64) -> Self {
        Constraint {
            terms,
            ..Constraint::new(name, Sense::Le, rhs)
        }
    }

    /// Create an inequality constraint: terms >= rhs.
    pub fn geq(name: impl Into<String>, terms: Vec<(String, f64)>, rhs: f64) -> Self {
        Constraint {
            terms,
            ..Constraint::new(name, Sense::Ge, rhs)
        }
    }

    /// Append a term.
    pub fn term(mut self, var: impl Into<String>, coeff: f64) -> Self {
        self.terms.push((var.into(), coeff));
        self
    }

    /// Total coefficient of a variable in this row (duplicates are summed).
    pub fn coefficient(&self, var: &str) -> Option<f64> {
        let mut found = None;
        for (name, coeff) in &self.terms {
            if name == var {
                *found.get_or_insert(0.0) += coeff;
            }
        }
        found
    }

    /// Names of the variables in this row.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(name, _)| name.as_str())
    }
}

/// Second-order cone constraint: ||x||_2 <= t.
#[derive(Debug, Clone, PartialEq)]
pub struct ConeConstraint {
    pub name: String,
    /// The scalar upper bound.
    pub t: String,
    /// The vector argument.
    pub x: Vec<String>,
}

impl ConeConstraint {
    pub fn soc(name: impl Into<String>, t: impl Into<String>, x: Vec<String>) -> Self {
        ConeConstraint {
            name: name.into(),
            t: t.into(),
            x,
        }
    }

    /// Number of rows this cone occupies.
    pub fn dim(&self) -> usize {
        1 + self.x.len()
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.t.as_str()).chain(self.x.iter().map(|s| s.as_str()))
    }
}
