//! CPLEX LP text export.
//!
//! Lets a model be handed to any solver that reads the LP format. Cone rows
//! are written as quadratic constraints `[ x1 ^ 2 + ... - t ^ 2 ] <= 0`.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::model::{DecisionVariable, Model};

/// Terms per line; LP readers limit line length.
const TERMS_PER_LINE: usize = 6;

/// Render a model as LP text.
pub fn to_lp_string(model: &Model) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\\* Problem: {} *\\", model.name());
    out.push_str(if model.sense().is_minimize() {
        "Minimize\n"
    } else {
        "Maximize\n"
    });

    let objective: Vec<(&str, f64)> = model
        .variables()
        .iter()
        .filter(|v| v.obj != 0.0)
        .map(|v| (v.name.as_str(), v.obj))
        .collect();
    out.push_str(" obj:");
    if objective.is_empty() {
        if let Some(first) = model.variables().first() {
            let _ = write!(out, " 0 {}", first.name);
        }
    } else {
        write_terms(&mut out, objective.into_iter());
    }
    out.push('\n');

    out.push_str("Subject To\n");
    for c in model.constraints() {
        let _ = write!(out, " {}:", c.name);
        if c.terms.is_empty() {
            let _ = write!(out, " 0 {}", model.variables().first().map_or("x", |v| v.name.as_str()));
        }
        write_terms(&mut out, c.terms.iter().map(|(v, a)| (v.as_str(), *a)));
        let _ = writeln!(out, " {} {}", c.sense.symbol(), c.rhs);
    }
    for cone in model.cones() {
        let _ = write!(out, " {}: [", cone.name);
        for x in &cone.x {
            let _ = write!(out, " + {} ^ 2", x);
        }
        let _ = writeln!(out, " - {} ^ 2 ] <= 0", cone.t);
    }

    out.push_str("Bounds\n");
    for v in model.variables() {
        if let Some(line) = bound_line(v) {
            let _ = writeln!(out, " {}", line);
        }
    }

    out.push_str("End\n");
    out
}

/// Write a model in LP format.
pub fn write_lp<W: Write>(model: &Model, writer: &mut W) -> Result<()> {
    writer.write_all(to_lp_string(model).as_bytes())?;
    Ok(())
}

/// Write a model to an LP file.
pub fn write_lp_file(model: &Model, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_lp(model, &mut writer)?;
    writer.flush()?;
    tracing::info!(path = %path.display(), variables = model.num_variables(), "wrote LP file");
    Ok(())
}

fn write_terms<'a>(out: &mut String, terms: impl Iterator<Item = (&'a str, f64)>) {
    for (i, (name, coeff)) in terms.enumerate() {
        if i > 0 && i % TERMS_PER_LINE == 0 {
            out.push_str("\n   ");
        }
        let sign = if coeff < 0.0 { '-' } else { '+' };
        let _ = write!(out, " {} {} {}", sign, coeff.abs(), name);
    }
}

/// Bounds line, or `None` for the default `0 <= x < inf`.
fn bound_line(v: &DecisionVariable) -> Option<String> {
    let lower_free = v.lower == f64::NEG_INFINITY;
    let upper_free = v.upper == f64::INFINITY;
    match (lower_free, upper_free) {
        (true, true) => Some(format!("{} free", v.name)),
        (true, false) => Some(format!("-infinity <= {} <= {}", v.name, v.upper)),
        (false, true) if v.lower == 0.0 => None,
        (false, true) => Some(format!("{} >= {}", v.name, v.lower)),
        (false, false) if v.lower == v.upper => Some(format!("{} = {}", v.name, v.lower)),
        (false, false) => Some(format!("{} <= {} <= {}", v.lower, v.name, v.upper)),
    }
}
