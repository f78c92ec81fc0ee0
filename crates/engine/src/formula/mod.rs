//! Formula support: parsing, canonical reprinting, evaluation, and
//! referenced-cell extraction.
//!
//! The sheet consumes exactly four operations (`parse`, `evaluate`,
//! `expression`, `referenced_cells`); the grammar and expression tree stay
//! private to this module tree.

pub mod eval;
pub mod parser;

pub use eval::CellLookup;

use crate::error::{FormulaError, ParseError};
use crate::position::Position;

/// A parsed formula: the expression tree plus its pre-extracted references.
#[derive(Debug, Clone)]
pub struct Formula {
    expr: parser::Expr,
    refs: Vec<Position>,
}

impl Formula {
    /// Parse formula text (without the leading `=`).
    pub fn parse(input: &str) -> Result<Formula, ParseError> {
        let expr = parser::parse(input)?;
        let mut refs = Vec::new();
        collect_refs(&expr, &mut refs);
        refs.sort_unstable();
        refs.dedup();
        Ok(Formula { expr, refs })
    }

    /// Evaluate against a cell-value source.
    pub fn evaluate<L: CellLookup>(&self, lookup: &L) -> Result<f64, FormulaError> {
        eval::evaluate(&self.expr, lookup)
    }

    /// Canonical reprinting: whitespace stripped, parentheses minimised.
    pub fn expression(&self) -> String {
        self.expr.to_string()
    }

    /// Cells the formula reads, sorted and deduplicated.
    pub fn referenced_cells(&self) -> &[Position] {
        &self.refs
    }
}

fn collect_refs(expr: &parser::Expr, out: &mut Vec<Position>) {
    match expr {
        parser::Expr::Number(_) => {}
        parser::Expr::CellRef(pos) => out.push(*pos),
        parser::Expr::Unary { operand, .. } => collect_refs(operand, out),
        parser::Expr::Binary { left, right, .. } => {
            collect_refs(left, out);
            collect_refs(right, out);
        }
    }
}
