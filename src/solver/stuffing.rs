//! Matrix stuffing: converts a named model to conic solver format.
//!
//! Builds the matrices (P, q, A, b) and cone specifications of
//! `min (1/2) x'Px + q'x  s.t.  Ax + s = b, s in K`.

use nalgebra_sparse::CscMatrix;

use crate::model::{Model, ObjectiveSense, Sense};
use crate::sparse::csc_from_triplets;

/// Cone dimensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConeDims {
    /// Number of zero cone (equality) rows.
    pub zero: usize,
    /// Number of nonnegative cone rows.
    pub nonneg: usize,
    /// Second-order cone dimensions (each entry is the cone dimension).
    pub soc: Vec<usize>,
}

impl ConeDims {
    /// Total number of constraint rows.
    pub fn total(&self) -> usize {
        self.zero + self.nonneg + self.soc.iter().sum::<usize>()
    }
}

/// Stuffed problem ready for a conic solver.
#[derive(Debug)]
pub struct StuffedProblem {
    /// Quadratic cost matrix P (n x n); empty for these models.
    pub p: CscMatrix<f64>,
    /// Linear cost vector q (n), negated for maximisation.
    pub q: Vec<f64>,
    /// Constraint matrix A (m x n).
    pub a: CscMatrix<f64>,
    /// Constraint vector b (m).
    pub b: Vec<f64>,
    /// Cone dimensions.
    pub cone_dims: ConeDims,
}

/// Triplet accumulator for A and b.
#[derive(Default)]
struct Rows {
    a_rows: Vec<usize>,
    a_cols: Vec<usize>,
    a_vals: Vec<f64>,
    b: Vec<f64>,
}

impl Rows {
    /// Append the row `sign * (a'x) + s = sign * rhs`.
    fn push(&mut self, terms: impl IntoIterator<Item = (usize, f64)>, rhs: f64, sign: f64) {
        let row = self.b.len();
        for (col, val) in terms {
            self.a_rows.push(row);
            self.a_cols.push(col);
            self.a_vals.push(val * sign);
        }
        self.b.push(rhs * sign);
    }
}

/// Build the stuffed problem from a model.
///
/// Row order follows the cone order Clarabel expects: equalities, then
/// inequalities and finite variable bounds, then each second-order cone.
pub fn stuff_model(model: &Model) -> StuffedProblem {
    let n = model.num_variables();
    // Model rows only reference declared variables.
    let cols = |terms: &[(String, f64)]| -> Vec<(usize, f64)> {
        terms
            .iter()
            .filter_map(|(v, a)| model.column(v).map(|j| (j, *a)))
            .collect()
    };

    let mut q: Vec<f64> = model.variables().iter().map(|v| v.obj).collect();
    if model.sense() == ObjectiveSense::Maximize {
        q.iter_mut().for_each(|c| *c = -*c);
    }

    let mut rows = Rows::default();

    // Zero cone: a'x = rhs
    for c in model.constraints().iter().filter(|c| c.sense == Sense::Eq) {
        rows.push(cols(&c.terms), c.rhs, 1.0);
    }
    let zero = rows.b.len();

    // Nonnegative cone: s = rhs - a'x >= 0 for <=, negated for >=
    for c in model.constraints().iter().filter(|c| c.sense != Sense::Eq) {
        let sign = if c.sense == Sense::Le { 1.0 } else { -1.0 };
        rows.push(cols(&c.terms), c.rhs, sign);
    }
    for (j, v) in model.variables().iter().enumerate() {
        if v.lower.is_finite() {
            rows.push([(j, 1.0)], v.lower, -1.0);
        }
        if v.upper.is_finite() {
            rows.push([(j, 1.0)], v.upper, 1.0);
        }
    }
    let nonneg = rows.b.len() - zero;

    // SOC: s = [t; x] in K_soc, i.e. -[t; x] + s = 0
    let mut soc = Vec::with_capacity(model.cones().len());
    for cone in model.cones() {
        for j in cone.variables().filter_map(|var| model.column(var)) {
            rows.push([(j, 1.0)], 0.0, -1.0);
        }
        soc.push(cone.dim());
    }

    let cone_dims = ConeDims { zero, nonneg, soc };
    let m = rows.b.len();
    let a = csc_from_triplets(m, n, rows.a_rows, rows.a_cols, rows.a_vals);
    let p = csc_from_triplets(n, n, Vec::new(), Vec::new(), Vec::new());

    StuffedProblem {
        p,
        q,
        a,
        b: rows.b,
        cone_dims,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::csc_row;
    use crate::model::{ConeConstraint, Constraint, VarCategory, VariableBuilder};

    fn small_model(sense: ObjectiveSense) -> Model {
        let mut model = Model::new("m", sense);
        model
            .add_variable(
                VariableBuilder::new("x", VarCategory::Weight)
                    .bounds(0.0, 1.0)
                    .obj(2.0)
                    .build(),
            )
            .unwrap();
        model
            .add_variable(VariableBuilder::new("y", VarCategory::Robust).free().build())
            .unwrap();
        model
            .add_constraint(Constraint::geq("g", vec![("x".into(), 1.0), ("y".into(), 3.0)], 1.0))
            .unwrap();
        model
            .add_constraint(Constraint::eq("e", vec![("y".into(), 1.0)], 0.5))
            .unwrap();
        model
    }

    #[test]
    fn test_cone_dims() {
        let dims = ConeDims {
            zero: 2,
            nonneg: 3,
            soc: vec![4, 5],
        };
        assert_eq!(dims.total(), 14);
    }

    #[test]
    fn test_row_layout() {
        let stuffed = stuff_model(&small_model(ObjectiveSense::Minimize));
        // one equality; one inequality plus two bounds on x
        assert_eq!(stuffed.cone_dims.zero, 1);
        assert_eq!(stuffed.cone_dims.nonneg, 3);
        assert_eq!(stuffed.b, vec![0.5, -1.0, 0.0, 1.0]);
        assert_eq!(stuffed.a.nrows(), stuffed.cone_dims.total());
        assert_eq!(stuffed.q, vec![2.0, 0.0]);
    }

    #[test]
    fn test_geq_row_is_negated() {
        let stuffed = stuff_model(&small_model(ObjectiveSense::Minimize));
        assert_eq!(csc_row(&stuffed.a, 1), vec![-1.0, -3.0]);
    }

    #[test]
    fn test_maximize_negates_cost() {
        let stuffed = stuff_model(&small_model(ObjectiveSense::Maximize));
        assert_eq!(stuffed.q, vec![-2.0, 0.0]);
    }

    #[test]
    fn test_soc_rows() {
        let mut model = small_model(ObjectiveSense::Minimize);
        model
            .add_cone(ConeConstraint::soc("c", "x", vec!["y".into()]))
            .unwrap();
        let stuffed = stuff_model(&model);
        assert_eq!(stuffed.cone_dims.soc, vec![2]);
        assert_eq!(stuffed.b.len(), 6);
        assert_eq!(&stuffed.b[4..], &[0.0, 0.0]);
    }
}
